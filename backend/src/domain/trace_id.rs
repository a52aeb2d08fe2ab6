//! Request-scoped correlation identifier.
//!
//! The identifier lives in tokio task-local storage so errors and log lines
//! raised anywhere below a handler can pick it up without threading it
//! through every call. Task locals do not cross `tokio::spawn`; wrap spawned
//! work in [`TraceId::scope`] to carry it along.

use std::fmt;
use std::future::Future;

use tokio::task_local;
use uuid::Uuid;

task_local! {
    static TRACE_ID: TraceId;
}

/// Response header echoing the request's trace identifier.
pub const TRACE_ID_HEADER: &str = "trace-id";

/// Per-request trace identifier.
///
/// # Examples
/// ```
/// use banksystem::domain::TraceId;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let id: TraceId = "00000000-0000-0000-0000-000000000000".parse().expect("uuid");
/// let seen = TraceId::scope(id, async { TraceId::current() }).await;
/// assert_eq!(seen, Some(id));
/// # });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identifier in scope for the current task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        TRACE_ID.try_with(|id| *id).ok()
    }

    /// Inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Run `fut` with `trace_id` in scope.
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }
}

impl From<Uuid> for TraceId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_in_scope_by_default() {
        assert!(TraceId::current().is_none());
    }

    #[tokio::test]
    async fn scope_exposes_identifier_to_nested_futures() {
        let id = TraceId::generate();
        let nested = TraceId::scope(id, async { async { TraceId::current() }.await }).await;
        assert_eq!(nested, Some(id));
    }

    #[tokio::test]
    async fn spawned_tasks_need_an_explicit_scope() {
        let id = TraceId::generate();
        let (bare, scoped) = TraceId::scope(id, async {
            let bare = tokio::spawn(async { TraceId::current() })
                .await
                .expect("task joins");
            let scoped = tokio::spawn(TraceId::scope(id, async { TraceId::current() }))
                .await
                .expect("task joins");
            (bare, scoped)
        })
        .await;
        assert_eq!(bare, None);
        assert_eq!(scoped, Some(id));
    }

    #[test]
    fn parses_and_displays_hyphenated_uuid() {
        let raw = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let id: TraceId = raw.parse().expect("valid uuid");
        assert_eq!(id.to_string(), raw);
        assert_eq!(id.as_uuid(), &Uuid::parse_str(raw).expect("uuid"));
    }
}
