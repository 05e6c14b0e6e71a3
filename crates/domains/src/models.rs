//! Domain, DNS record, and verification token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a sending domain is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "domain_type", rename_all = "lowercase")]
pub enum DomainType {
    Primary,
    Spoofing,
    Tracking,
    Redirect,
}

/// Domain lifecycle status.
///
/// `pending -> {verified | failed}` is decided only by a verification pass;
/// `active`/`inactive` are manual transitions available once verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "domain_status", rename_all = "lowercase")]
pub enum DomainStatus {
    Pending,
    Verified,
    Failed,
    Active,
    Inactive,
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DomainStatus::Pending => "pending",
            DomainStatus::Verified => "verified",
            DomainStatus::Failed => "failed",
            DomainStatus::Active => "active",
            DomainStatus::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// DNS record type a domain is expected to publish.
///
/// SPF, DKIM, and DMARC are TXT records by convention; they keep their own
/// variants so operators see them named in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "dns_record_type", rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Spf,
    Dkim,
    Dmarc,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Spf => "SPF",
            RecordType::Dkim => "DKIM",
            RecordType::Dmarc => "DMARC",
        };
        f.write_str(s)
    }
}

/// Channel through which domain ownership is proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "verification_method", rename_all = "lowercase")]
pub enum VerificationMethod {
    Dns,
    File,
    Email,
}

/// A sending domain owned by one tenant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    /// Case-folded, globally unique domain name.
    pub name: String,
    pub domain_type: DomainType,
    pub status: DomainStatus,
    pub click_tracking_enabled: bool,
    pub open_tracking_enabled: bool,
    pub emails_sent: i64,
    pub emails_opened: i64,
    pub links_clicked: i64,
    pub max_emails_per_day: i32,
    pub rate_limit_per_hour: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only on transition into `verified`; survives later failures.
    pub verified_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Domain {
    /// Fraction of sent emails that were opened, as a percentage.
    pub fn open_rate(&self) -> f64 {
        if self.emails_sent == 0 {
            return 0.0;
        }
        self.emails_opened as f64 / self.emails_sent as f64 * 100.0
    }

    /// Fraction of opened emails whose links were clicked, as a percentage.
    pub fn click_rate(&self) -> f64 {
        if self.emails_opened == 0 {
            return 0.0;
        }
        self.links_clicked as f64 / self.emails_opened as f64 * 100.0
    }
}

/// One expected DNS record belonging to a domain.
///
/// `(domain_id, record_type, name)` is unique. Mutated only by the
/// verification engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub record_type: RecordType,
    /// Record name relative to the domain; `"@"` means the apex.
    pub name: String,
    pub value: String,
    pub ttl: i32,
    /// MX only.
    pub priority: Option<i32>,
    pub is_verified: bool,
    pub verification_attempts: i32,
    pub last_verification: Option<DateTime<Utc>>,
    pub verification_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record the generator wants published, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSpec {
    pub record_type: RecordType,
    pub name: String,
    pub value: String,
    pub ttl: u32,
    pub priority: Option<u16>,
}

impl RecordSpec {
    pub const TTL_MIN: u32 = 300;
    pub const TTL_MAX: u32 = 86_400;

    /// Rejects specs whose TTL is outside the accepted range.
    pub fn validate(&self) -> Result<(), crate::error::DomainError> {
        if self.ttl < Self::TTL_MIN || self.ttl > Self::TTL_MAX {
            return Err(crate::error::DomainError::InvalidRecord(format!(
                "TTL {} outside [{}, {}]",
                self.ttl,
                Self::TTL_MIN,
                Self::TTL_MAX
            )));
        }
        Ok(())
    }
}

/// One-time credential proving domain ownership out of band.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub token: String,
    #[sqlx(rename = "verification_type")]
    #[serde(rename = "verification_type")]
    pub method: VerificationMethod,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Result of an atomic token consumption attempt.
#[derive(Debug)]
pub enum TokenOutcome {
    Consumed(VerificationToken),
    /// Unknown value, wrong method, or already used.
    NotFound,
    /// Matched an unused token whose expiry window has passed.
    Expired,
}

/// Per-record result computed by one verification pass, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub record_id: Uuid,
    pub verified: bool,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// What one verification pass found, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub domain_id: Uuid,
    /// AND over every record's verified flag for this pass.
    pub verified: bool,
    pub records: Vec<RecordReport>,
}

/// One record's line in the verification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub record_type: RecordType,
    pub name: String,
    pub verified: bool,
    pub error: Option<String>,
}

/// Owner-adjustable domain settings. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainSettings {
    pub max_emails_per_day: Option<i32>,
    pub rate_limit_per_hour: Option<i32>,
    pub click_tracking_enabled: Option<bool>,
    pub open_tracking_enabled: Option<bool>,
}

/// Usage counter events reported by the sending pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEvent {
    Sent,
    Opened,
    Clicked,
}

/// Usage snapshot with derived rates.
#[derive(Debug, Clone, Serialize)]
pub struct DomainAnalytics {
    pub domain_id: Uuid,
    pub name: String,
    pub status: DomainStatus,
    pub emails_sent: i64,
    pub emails_opened: i64,
    pub links_clicked: i64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Everything a caller gets back from registering a new domain.
#[derive(Debug, Clone, Serialize)]
pub struct AddedDomain {
    pub domain: Domain,
    pub records: Vec<DnsRecord>,
    pub token: VerificationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_with_counters(sent: i64, opened: i64, clicked: i64) -> Domain {
        Domain {
            id: Uuid::new_v4(),
            name: "example.com".to_string(),
            domain_type: DomainType::Spoofing,
            status: DomainStatus::Pending,
            click_tracking_enabled: true,
            open_tracking_enabled: true,
            emails_sent: sent,
            emails_opened: opened,
            links_clicked: clicked,
            max_emails_per_day: 1000,
            rate_limit_per_hour: 100,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            verified_at: None,
            last_used: None,
        }
    }

    #[test]
    fn rates_are_zero_without_traffic() {
        let domain = domain_with_counters(0, 0, 0);
        assert_eq!(domain.open_rate(), 0.0);
        assert_eq!(domain.click_rate(), 0.0);
    }

    #[test]
    fn rates_derive_from_counters() {
        let domain = domain_with_counters(200, 50, 10);
        assert_eq!(domain.open_rate(), 25.0);
        assert_eq!(domain.click_rate(), 20.0);
    }

    #[test]
    fn record_spec_rejects_out_of_range_ttl() {
        let mut spec = RecordSpec {
            record_type: RecordType::Txt,
            name: "@".to_string(),
            value: "v=spf1 ~all".to_string(),
            ttl: 3600,
            priority: None,
        };
        assert!(spec.validate().is_ok());

        spec.ttl = 299;
        assert!(spec.validate().is_err());

        spec.ttl = 86_401;
        assert!(spec.validate().is_err());
    }
}
