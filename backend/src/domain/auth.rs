//! Authenticated principals and the access rules applied to them.
//!
//! Token parsing lives in outbound adapters; the domain only sees a verified
//! [`Principal`].

use std::collections::BTreeSet;

use super::{Account, SubjectId, TransactionRecord};

/// Role granted elevated access when no other role is configured.
pub const DEFAULT_ELEVATED_ROLE: &str = "bank-admin";

/// Verified identity attached to an authenticated request.
///
/// # Examples
/// ```
/// use banksystem::domain::{Principal, SubjectId};
///
/// let principal = Principal::new(SubjectId::new("ops").expect("subject"), ["bank-admin"]);
/// assert!(principal.is_elevated("bank-admin"));
/// assert!(!principal.is_elevated("auditor"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: SubjectId,
    roles: BTreeSet<String>,
}

impl Principal {
    /// Build a principal from a subject and its granted roles.
    pub fn new<I, R>(subject: SubjectId, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            subject,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The authenticated subject.
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Granted roles in sorted order.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// True when the principal holds `elevated_role`.
    pub fn is_elevated(&self, elevated_role: &str) -> bool {
        self.roles.contains(elevated_role)
    }
}

/// Ownership-based access decisions shared by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    elevated_role: String,
}

impl AccessPolicy {
    /// Policy treating `elevated_role` as the administrative role.
    pub fn new(elevated_role: impl Into<String>) -> Self {
        Self {
            elevated_role: elevated_role.into(),
        }
    }

    /// Name of the administrative role.
    pub fn elevated_role(&self) -> &str {
        &self.elevated_role
    }

    /// True when the principal holds the administrative role.
    pub fn is_elevated(&self, principal: &Principal) -> bool {
        principal.is_elevated(&self.elevated_role)
    }

    /// Owners and elevated principals may act on an account.
    pub fn can_access_account(&self, principal: &Principal, account: &Account) -> bool {
        account.owner == *principal.subject() || self.is_elevated(principal)
    }

    /// Initiators, owners of either side, and elevated principals may read a
    /// transfer. Ownership is resolved by the caller.
    pub fn can_view_transfer(
        &self,
        principal: &Principal,
        record: &TransactionRecord,
        owners: &[&SubjectId],
    ) -> bool {
        record.initiator == *principal.subject()
            || owners.iter().any(|owner| *owner == principal.subject())
            || self.is_elevated(principal)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ELEVATED_ROLE)
    }
}
