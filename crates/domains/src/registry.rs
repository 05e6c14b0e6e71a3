//! Persistence for domains, DNS records, and verification tokens.
//!
//! The registry is abstracted behind a trait to enable mocking in tests and
//! to keep the core storage-agnostic. Two implementations ship:
//!
//! - **postgres** - production backend over sqlx
//! - **memory** - mutex-guarded maps for tests and embedding
//!
//! Registry methods return `anyhow::Result`; the service layer converts
//! failures into `DomainError::Storage` at the public boundary. All
//! invariant enforcement that spans rows (verification outcomes plus the
//! aggregate status, token check-then-consume) happens inside a single
//! registry call so each backend can make it atomic.

mod memory;
mod postgres;

pub use memory::InMemoryDomainRegistry;
pub use postgres::PgDomainRegistry;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    DnsRecord, Domain, DomainSettings, DomainStatus, DomainType, RecordOutcome, RecordSpec,
    TokenOutcome, UsageEvent, VerificationMethod, VerificationToken,
};

/// Parameters for creating a domain. Status starts at `pending`; caps and
/// toggles take their defaults.
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub name: String,
    pub domain_type: DomainType,
    pub created_by: Uuid,
}

/// Parameters for storing a freshly issued verification token.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub domain_id: Uuid,
    pub token: String,
    pub method: VerificationMethod,
    pub expires_at: DateTime<Utc>,
}

/// Storage operations for the domain aggregate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainRegistry: Send + Sync {
    /// Insert a new domain in `pending`. Fails if the name is taken.
    async fn insert_domain(&self, new: NewDomain) -> Result<Domain>;

    /// Find a domain by id.
    async fn find_domain(&self, id: Uuid) -> Result<Option<Domain>>;

    /// Find a domain by name, case-insensitively.
    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>>;

    /// List an owner's domains, newest first.
    async fn list_domains_by_owner(&self, owner: Uuid) -> Result<Vec<Domain>>;

    /// Delete a domain, cascading its records and tokens. Returns whether
    /// a row was removed.
    async fn delete_domain(&self, id: Uuid) -> Result<bool>;

    /// Materialize generated record specs for a domain.
    async fn insert_records(
        &self,
        domain_id: Uuid,
        specs: &[RecordSpec],
    ) -> Result<Vec<DnsRecord>>;

    /// List a domain's expected records in creation order.
    async fn list_records(&self, domain_id: Uuid) -> Result<Vec<DnsRecord>>;

    /// Persist one verification pass: every record outcome (verified flag,
    /// error message, check timestamp, attempt increment) together with the
    /// aggregate status change, as one atomic unit. `verified_at` is set
    /// when `Some` and left untouched when `None`.
    async fn apply_verification(
        &self,
        domain_id: Uuid,
        outcomes: &[RecordOutcome],
        status: DomainStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Explicit administrative status change, outside verification.
    async fn set_domain_status(&self, domain_id: Uuid, status: DomainStatus) -> Result<()>;

    /// Apply owner-adjustable settings; `None` fields are left untouched.
    async fn update_settings(&self, domain_id: Uuid, settings: &DomainSettings) -> Result<()>;

    /// Bump a usage counter; sends also stamp `last_used`.
    async fn record_usage(
        &self,
        domain_id: Uuid,
        event: UsageEvent,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Store a freshly issued token.
    async fn insert_token(&self, token: NewToken) -> Result<VerificationToken>;

    /// Atomically consume a token: the unused check and the used flag are
    /// one step, so a token is accepted at most once under concurrency.
    async fn consume_token(
        &self,
        value: &str,
        method: VerificationMethod,
        now: DateTime<Utc>,
    ) -> Result<TokenOutcome>;
}
