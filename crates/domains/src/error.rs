//! Error taxonomy for the domain verification core.
//!
//! Validation and not-found conditions are explicit variants so callers can
//! map them to user-facing outcomes. Per-record DNS failures never appear
//! here - they are carried inside the verification report instead.

use crate::models::DomainStatus;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Domain name fails label or length validation.
    #[error("invalid domain name: {0}")]
    InvalidDomainName(String),

    /// Domain name is already registered (case-insensitive).
    #[error("domain already exists: {0}")]
    DuplicateDomain(String),

    /// A DNS record specification is malformed (e.g. TTL out of range).
    #[error("invalid DNS record: {0}")]
    InvalidRecord(String),

    /// No domain with the given id, or not visible to the caller.
    #[error("domain not found")]
    DomainNotFound,

    /// No matching unused verification token. Covers unknown values and
    /// tokens that were already consumed.
    #[error("verification token not found or already used")]
    TokenNotFound,

    /// The token matched but its expiry window has passed.
    #[error("verification token expired")]
    TokenExpired,

    /// The acting owner does not own the domain.
    #[error("permission denied")]
    PermissionDenied,

    /// Manual activation requested from a state that has not passed
    /// verification.
    #[error("domain is {0} and cannot be activated or deactivated")]
    InvalidTransition(DomainStatus),

    /// Registry read/write failure. The system is broken, not the tenant's
    /// DNS configuration.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert_from_anyhow() {
        let err: DomainError = anyhow::anyhow!("connection refused").into();
        assert!(matches!(err, DomainError::Storage(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn invalid_transition_names_the_state() {
        let err = DomainError::InvalidTransition(DomainStatus::Pending);
        assert_eq!(
            err.to_string(),
            "domain is pending and cannot be activated or deactivated"
        );
    }
}
