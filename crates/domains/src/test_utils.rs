//! Shared test fixtures.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{DnsRecord, Domain, DomainStatus, DomainType, RecordType};

/// Creates a pending spoofing domain with default caps and zero counters.
pub fn mock_domain(name: &str) -> Domain {
    let now = Utc::now();
    Domain {
        id: Uuid::new_v4(),
        name: name.to_string(),
        domain_type: DomainType::Spoofing,
        status: DomainStatus::Pending,
        click_tracking_enabled: true,
        open_tracking_enabled: true,
        emails_sent: 0,
        emails_opened: 0,
        links_clicked: 0,
        max_emails_per_day: 1000,
        rate_limit_per_hour: 100,
        created_by: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        verified_at: None,
        last_used: None,
    }
}

/// Creates an unverified expected record for the given domain.
pub fn mock_record(domain_id: Uuid, record_type: RecordType, name: &str, value: &str) -> DnsRecord {
    let now = Utc::now();
    DnsRecord {
        id: Uuid::new_v4(),
        domain_id,
        record_type,
        name: name.to_string(),
        value: value.to_string(),
        ttl: 3600,
        priority: if record_type == RecordType::Mx {
            Some(10)
        } else {
            None
        },
        is_verified: false,
        verification_attempts: 0,
        last_verification: None,
        verification_error: None,
        created_at: now,
        updated_at: now,
    }
}
