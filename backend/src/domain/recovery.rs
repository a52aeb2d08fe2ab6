//! Resolution of transfers left `Pending` by crashes or cancelled requests.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::Error;
use crate::domain::ports::LedgerStore;
use crate::domain::settlement::{Settled, map_ledger_error, settle};

/// Counts produced by one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records that reached `Committed`.
    pub committed: usize,
    /// Records that reached `Failed`.
    pub failed: usize,
    /// Records left `Pending` because the store was unavailable.
    pub skipped: usize,
}

/// Re-drives stale pending transfers through reserve and commit.
pub struct PendingTransferResolver<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> PendingTransferResolver<S>
where
    S: LedgerStore + ?Sized,
{
    /// Build a resolver over the ledger store.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Settle every `Pending` record older than `grace`.
    ///
    /// Records younger than `grace` are left for the request that created
    /// them. A failure on one record is logged and counted as skipped; the
    /// pass continues with the next record.
    pub async fn resolve_pending(&self, grace: Duration) -> Result<RecoveryReport, Error> {
        let grace = chrono::Duration::from_std(grace)
            .map_err(|err| Error::internal(format!("invalid recovery grace period: {err}")))?;
        let now = self.clock.utc();
        let cutoff = now
            .checked_sub_signed(grace)
            .ok_or_else(|| Error::internal("recovery grace period out of range"))?;
        let pending = self
            .store
            .list_pending(cutoff)
            .await
            .map_err(map_ledger_error)?;

        let mut report = RecoveryReport::default();
        for record in pending {
            match settle(self.store.as_ref(), &record.id, now).await {
                Ok(Settled::Committed(_)) => report.committed += 1,
                Ok(Settled::Failed(_)) => report.failed += 1,
                Err(err) => {
                    warn!(
                        transaction_id = %record.id,
                        error = %err,
                        "pending transfer left unresolved"
                    );
                    report.skipped += 1;
                }
            }
        }

        if report == RecoveryReport::default() {
            debug!("no stale pending transfers");
        } else {
            info!(
                committed = report.committed,
                failed = report.failed,
                skipped = report.skipped,
                "pending transfers resolved"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
