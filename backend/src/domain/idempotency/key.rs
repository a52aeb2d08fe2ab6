//! Client-supplied idempotency keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on key length.
pub const IDEMPOTENCY_KEY_MAX: usize = 255;

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    #[error("idempotency key must not be empty")]
    EmptyKey,
    /// The key exceeded [`IDEMPOTENCY_KEY_MAX`] characters.
    #[error("idempotency key must be at most {max} characters")]
    TooLong {
        /// Upper bound that was exceeded.
        max: usize,
    },
    /// The key contained whitespace, control or non-ASCII characters.
    #[error("idempotency key must contain only visible ASCII characters")]
    InvalidCharacters,
}

/// Opaque token identifying one logical transfer request.
///
/// Keys are scoped to the initiating principal: two principals may use the
/// same key independently.
///
/// # Examples
/// ```
/// use banksystem::domain::IdempotencyKey;
///
/// let key = IdempotencyKey::new("k1").expect("valid key");
/// assert_eq!(key.as_ref(), "k1");
/// assert!(IdempotencyKey::new(" k1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate and construct a key.
    ///
    /// # Errors
    ///
    /// Rejects empty or overlong input and anything outside the visible
    /// ASCII range (`!` through `~`).
    pub fn new(key: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.len() > IDEMPOTENCY_KEY_MAX {
            return Err(IdempotencyKeyValidationError::TooLong {
                max: IDEMPOTENCY_KEY_MAX,
            });
        }
        if !key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(IdempotencyKeyValidationError::InvalidCharacters);
        }
        Ok(Self(key))
    }

    /// Generate a random UUID-shaped key. Primarily useful for tests.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
