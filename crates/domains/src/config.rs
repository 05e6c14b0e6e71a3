//! Typed configuration for the record generator and verification engine.

use std::time::Duration;

use serde::Deserialize;

/// Provider hostnames baked into the generated DNS record set.
///
/// Defaults match a SendGrid-style transactional provider; deployments
/// override these with their own mail-routing hosts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// MX exchange host the domain must route mail through.
    pub mx_host: String,
    /// MX priority published alongside the exchange host.
    pub mx_priority: u16,
    /// Host named by the SPF include mechanism.
    pub spf_include: String,
    /// Target of the `email` routing CNAME.
    pub routing_target: String,
    /// TTL applied to every generated record, in seconds.
    pub record_ttl: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            mx_host: "mail.sendgrid.net".to_string(),
            mx_priority: 10,
            spf_include: "sendgrid.net".to_string(),
            routing_target: "sendgrid.net".to_string(),
            record_ttl: 3600,
        }
    }
}

/// Timeouts governing a verification pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Bound on each individual DNS query. A hung resolver must not stall
    /// the other queries in the pass.
    #[serde(with = "secs")]
    pub query_timeout: Duration,
    /// Bound on one whole verification pass. Queries still pending at the
    /// deadline are recorded as resolver errors for that pass.
    #[serde(with = "secs")]
    pub pass_timeout: Duration,
    /// Lifetime of an issued verification token.
    #[serde(with = "secs")]
    pub token_ttl: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            pass_timeout: Duration::from_secs(30),
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Serde adapter: durations as whole seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
