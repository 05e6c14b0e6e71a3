//! Canonical DNS record set a sending domain must publish.
//!
//! Pure functions of the domain name and provider configuration - no I/O,
//! no state. The registry persists what the generator produces; the
//! verification engine checks it against live DNS.

use crate::config::ProviderConfig;
use crate::error::DomainError;
use crate::models::{RecordSpec, RecordType};

/// Longest domain name accepted, per RFC 1035.
const MAX_NAME_LEN: usize = 253;
/// Longest single label accepted.
const MAX_LABEL_LEN: usize = 63;

/// Validates a domain name against RFC 1035 label rules.
///
/// Labels are 1-63 characters of ASCII alphanumerics and hyphens, with no
/// leading or trailing hyphen; the whole name is at most 253 characters and
/// must contain at least two labels.
pub fn validate_domain_name(name: &str) -> Result<(), DomainError> {
    let invalid = || DomainError::InvalidDomainName(name.to_string());

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid());
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }

    for label in labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid());
        }
    }

    Ok(())
}

/// Produces the required record set for a domain.
pub struct RecordTemplates {
    provider: ProviderConfig,
}

impl RecordTemplates {
    pub fn new(provider: ProviderConfig) -> Self {
        Self { provider }
    }

    /// The ordered list of records `domain` must publish to send mail:
    /// MX routing, SPF, the provider routing CNAME, and DMARC policy.
    ///
    /// `domain` must already be validated and case-folded.
    pub fn required_records(&self, domain: &str) -> Vec<RecordSpec> {
        let ttl = self.provider.record_ttl;

        vec![
            RecordSpec {
                record_type: RecordType::Mx,
                name: "@".to_string(),
                value: self.provider.mx_host.clone(),
                ttl,
                priority: Some(self.provider.mx_priority),
            },
            RecordSpec {
                record_type: RecordType::Txt,
                name: "@".to_string(),
                value: format!("v=spf1 include:{} ~all", self.provider.spf_include),
                ttl,
                priority: None,
            },
            RecordSpec {
                record_type: RecordType::Cname,
                name: "email".to_string(),
                value: self.provider.routing_target.clone(),
                ttl,
                priority: None,
            },
            RecordSpec {
                record_type: RecordType::Txt,
                name: "_dmarc".to_string(),
                value: format!("v=DMARC1; p=quarantine; rua=mailto:dmarc@{domain}"),
                ttl,
                priority: None,
            },
        ]
    }
}
