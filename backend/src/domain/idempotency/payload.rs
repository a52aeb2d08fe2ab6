//! Canonical payload hashing.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Errors raised while building a [`PayloadHash`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadHashError {
    /// Stored bytes had the wrong length.
    #[error("payload hash must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },
    /// The canonical payload could not be serialised.
    #[error("failed to serialise canonical payload: {message}")]
    Serialization {
        /// Serializer message.
        message: String,
    },
}

/// SHA-256 digest of a canonicalised request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadHash([u8; 32]);

impl PayloadHash {
    /// Rebuild a hash from stored bytes.
    ///
    /// # Examples
    /// ```
    /// use banksystem::domain::PayloadHash;
    ///
    /// assert!(PayloadHash::try_from_bytes(&[0u8; 32]).is_ok());
    /// assert!(PayloadHash::try_from_bytes(&[0u8; 4]).is_err());
    /// ```
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, PayloadHashError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PayloadHashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Wrap a 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonicalise a JSON value and hash it with SHA-256.
///
/// Object keys are sorted recursively, arrays keep their order, and the result
/// is encoded as compact JSON before hashing.
///
/// # Examples
/// ```
/// use banksystem::domain::canonicalize_and_hash;
/// use serde_json::json;
///
/// let a = canonicalize_and_hash(&json!({"b": 2, "a": 1})).expect("hash a");
/// let b = canonicalize_and_hash(&json!({"a": 1, "b": 2})).expect("hash b");
/// assert_eq!(a, b);
/// ```
pub fn canonicalize_and_hash(value: &Value) -> Result<PayloadHash, PayloadHashError> {
    let bytes = serde_json::to_vec(&canonicalize(value)).map_err(|err| {
        PayloadHashError::Serialization {
            message: err.to_string(),
        }
    })?;
    Ok(PayloadHash::from_bytes(Sha256::digest(&bytes).into()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by_key(|(key, _)| key.as_str());
            Value::Object(
                fields
                    .into_iter()
                    .map(|(key, nested)| (key.clone(), canonicalize(nested)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
