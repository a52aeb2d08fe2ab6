//! Identifier newtypes for accounts, transactions and principals.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Account identifier.
    ///
    /// Ordering is used to acquire account locks in a global order.
    AccountId
}

uuid_id! {
    /// Transfer transaction identifier.
    TransactionId
}

uuid_id! {
    /// Ledger entry identifier.
    EntryId
}

/// Maximum accepted length of a principal subject.
pub const SUBJECT_MAX: usize = 255;

/// Validation errors for [`SubjectId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectIdValidationError {
    /// Subject was blank.
    #[error("subject must not be empty")]
    Empty,
    /// Subject exceeded [`SUBJECT_MAX`] characters.
    #[error("subject must be at most {max} characters")]
    TooLong {
        /// Upper bound that was exceeded.
        max: usize,
    },
}

/// Opaque identity of an authenticated principal (the token `sub` claim).
///
/// # Examples
/// ```
/// use banksystem::domain::SubjectId;
///
/// let subject = SubjectId::new("alice").expect("valid subject");
/// assert_eq!(subject.as_ref(), "alice");
/// assert!(SubjectId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Validate and construct a subject.
    pub fn new(subject: impl Into<String>) -> Result<Self, SubjectIdValidationError> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(SubjectIdValidationError::Empty);
        }
        if subject.chars().count() > SUBJECT_MAX {
            return Err(SubjectIdValidationError::TooLong { max: SUBJECT_MAX });
        }
        Ok(Self(subject))
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl TryFrom<String> for SubjectId {
    type Error = SubjectIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
