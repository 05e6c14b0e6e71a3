//! Verification engine: one pass over a domain's expected DNS records.
//!
//! A pass resolves every record concurrently, never short-circuiting, so the
//! operator gets a complete diagnostic in one report. The aggregate status
//! is decided strictly after all per-record results are in, and persisted
//! atomically with them. Passes for the same domain are serialized behind a
//! per-domain lock; unrelated domains verify fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::VerifierConfig;
use crate::error::DomainError;
use crate::models::{
    DnsRecord, DomainStatus, RecordOutcome, RecordReport, RecordType, VerificationReport,
};
use crate::registry::DomainRegistry;
use crate::resolver::{DnsResolver, QueryType, Resolution};

/// Error message recorded when an answer is missing or does not match.
const NOT_FOUND_OR_INCORRECT: &str = "DNS record not found or incorrect";
/// Error message recorded for queries still pending at the pass deadline.
const PASS_DEADLINE_EXCEEDED: &str = "DNS query still pending at verification deadline";

/// Result of checking one record against live DNS, before persistence.
#[derive(Debug, Clone)]
struct RecordCheck {
    verified: bool,
    error: Option<String>,
}

/// Runs verification passes against the registry and a DNS resolver.
pub struct VerificationEngine {
    registry: Arc<dyn DomainRegistry>,
    resolver: Arc<dyn DnsResolver>,
    config: VerifierConfig,
    /// Per-domain pass serialization.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl VerificationEngine {
    pub fn new(
        registry: Arc<dyn DomainRegistry>,
        resolver: Arc<dyn DnsResolver>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one verification pass for a domain.
    ///
    /// Resolver failures are captured per record in the report; only a
    /// missing domain or a registry failure surfaces as an error.
    pub async fn verify(&self, domain_id: Uuid) -> Result<VerificationReport, DomainError> {
        let lock = self.domain_lock(domain_id).await;
        let _pass = lock.lock().await;

        let domain = self
            .registry
            .find_domain(domain_id)
            .await?
            .ok_or(DomainError::DomainNotFound)?;
        let records = self.registry.list_records(domain_id).await?;

        let checks = self.run_checks(&domain.name, &records).await;

        let now = Utc::now();
        let mut all_verified = true;
        let mut outcomes = Vec::with_capacity(records.len());
        let mut reports = Vec::with_capacity(records.len());

        for (record, check) in records.iter().zip(checks) {
            let check = check.unwrap_or_else(|| {
                tracing::warn!(
                    "DNS query {} {}.{} missed the pass deadline",
                    record.record_type,
                    record.name,
                    domain.name
                );
                RecordCheck {
                    verified: false,
                    error: Some(PASS_DEADLINE_EXCEEDED.to_string()),
                }
            });

            all_verified &= check.verified;
            outcomes.push(RecordOutcome {
                record_id: record.id,
                verified: check.verified,
                error: check.error.clone(),
                checked_at: now,
            });
            reports.push(RecordReport {
                record_type: record.record_type,
                name: record.name.clone(),
                verified: check.verified,
                error: check.error,
            });
        }

        let (status, verified_at) = if all_verified {
            (DomainStatus::Verified, Some(now))
        } else {
            (DomainStatus::Failed, None)
        };

        self.registry
            .apply_verification(domain_id, &outcomes, status, verified_at)
            .await?;

        tracing::info!(
            "Domain {} verification pass complete: {} ({}/{} records verified)",
            domain.name,
            status,
            reports.iter().filter(|r| r.verified).count(),
            reports.len()
        );

        Ok(VerificationReport {
            domain_id,
            verified: all_verified,
            records: reports,
        })
    }

    /// Resolve and compare every record concurrently, bounded by the pass
    /// deadline. Slots left `None` belong to queries that were still
    /// pending when the deadline hit.
    async fn run_checks(&self, domain_name: &str, records: &[DnsRecord]) -> Vec<Option<RecordCheck>> {
        let deadline = tokio::time::Instant::now() + self.config.pass_timeout;
        let resolver = self.resolver.as_ref();

        let mut pending: FuturesUnordered<_> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| async move {
                (idx, check_record(resolver, domain_name, record).await)
            })
            .collect();

        let mut checks: Vec<Option<RecordCheck>> = vec![None; records.len()];
        while let Ok(Some((idx, check))) = tokio::time::timeout_at(deadline, pending.next()).await {
            checks[idx] = Some(check);
        }
        checks
    }

    async fn domain_lock(&self, domain_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(domain_id).or_default())
    }
}

/// Check one record: build the query name, resolve, compare.
async fn check_record(
    resolver: &dyn DnsResolver,
    domain_name: &str,
    record: &DnsRecord,
) -> RecordCheck {
    let query_name = if record.name == "@" {
        domain_name.to_string()
    } else {
        format!("{}.{}", record.name, domain_name)
    };
    let query_type = query_type_for(record.record_type);

    match resolver.resolve(&query_name, query_type).await {
        Resolution::Found(answers) => {
            if matches_expected(record, &answers) {
                RecordCheck {
                    verified: true,
                    error: None,
                }
            } else {
                tracing::debug!(
                    "{} {} answers {:?} do not match expected '{}'",
                    query_type,
                    query_name,
                    answers,
                    record.value
                );
                RecordCheck {
                    verified: false,
                    error: Some(NOT_FOUND_OR_INCORRECT.to_string()),
                }
            }
        }
        Resolution::NotFound => RecordCheck {
            verified: false,
            error: Some(NOT_FOUND_OR_INCORRECT.to_string()),
        },
        Resolution::Error(reason) => {
            tracing::warn!("DNS query {} {} failed: {}", query_type, query_name, reason);
            RecordCheck {
                verified: false,
                error: Some(reason),
            }
        }
    }
}

/// SPF, DKIM, and DMARC expectations are published as TXT records.
fn query_type_for(record_type: RecordType) -> QueryType {
    match record_type {
        RecordType::A => QueryType::A,
        RecordType::Aaaa => QueryType::Aaaa,
        RecordType::Cname => QueryType::Cname,
        RecordType::Mx => QueryType::Mx,
        RecordType::Txt | RecordType::Spf | RecordType::Dkim | RecordType::Dmarc => QueryType::Txt,
    }
}

/// MX and TXT compare by substring so providers can prepend or append extra
/// directives without failing verification; CNAME and addresses compare as
/// canonical values.
fn matches_expected(record: &DnsRecord, answers: &[String]) -> bool {
    match record.record_type {
        RecordType::Mx
        | RecordType::Txt
        | RecordType::Spf
        | RecordType::Dkim
        | RecordType::Dmarc => answers.iter().any(|answer| answer.contains(&record.value)),
        RecordType::Cname | RecordType::A | RecordType::Aaaa => {
            let expected = record.value.trim_end_matches('.');
            answers
                .iter()
                .any(|answer| answer.trim_end_matches('.').eq_ignore_ascii_case(expected))
        }
    }
}
