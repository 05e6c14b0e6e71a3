//! In-memory domain registry.
//!
//! Mutex-guarded maps with the same semantics as the PostgreSQL backend.
//! Used by the test suite; also embeddable by callers that do not want a
//! database (demos, single-process tools).

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    DnsRecord, Domain, DomainSettings, DomainStatus, RecordOutcome, RecordSpec, TokenOutcome,
    UsageEvent, VerificationMethod, VerificationToken,
};
use crate::registry::{DomainRegistry, NewDomain, NewToken};

#[derive(Default)]
struct Inner {
    domains: HashMap<Uuid, Domain>,
    /// Records per domain, in creation order.
    records: HashMap<Uuid, Vec<DnsRecord>>,
    tokens: Vec<VerificationToken>,
}

/// In-memory implementation of [`DomainRegistry`].
#[derive(Default)]
pub struct InMemoryDomainRegistry {
    inner: Mutex<Inner>,
}

impl InMemoryDomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DomainRegistry for InMemoryDomainRegistry {
    async fn insert_domain(&self, new: NewDomain) -> Result<Domain> {
        let mut inner = self.inner.lock().await;

        if inner
            .domains
            .values()
            .any(|d| d.name.eq_ignore_ascii_case(&new.name))
        {
            bail!("domain name already exists: {}", new.name);
        }

        let now = Utc::now();
        let domain = Domain {
            id: Uuid::new_v4(),
            name: new.name,
            domain_type: new.domain_type,
            status: DomainStatus::Pending,
            click_tracking_enabled: true,
            open_tracking_enabled: true,
            emails_sent: 0,
            emails_opened: 0,
            links_clicked: 0,
            max_emails_per_day: 1000,
            rate_limit_per_hour: 100,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            verified_at: None,
            last_used: None,
        };
        inner.domains.insert(domain.id, domain.clone());
        inner.records.insert(domain.id, Vec::new());
        Ok(domain)
    }

    async fn find_domain(&self, id: Uuid) -> Result<Option<Domain>> {
        let inner = self.inner.lock().await;
        Ok(inner.domains.get(&id).cloned())
    }

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .domains
            .values()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list_domains_by_owner(&self, owner: Uuid) -> Result<Vec<Domain>> {
        let inner = self.inner.lock().await;
        let mut domains: Vec<Domain> = inner
            .domains
            .values()
            .filter(|d| d.created_by == owner)
            .cloned()
            .collect();
        domains.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(domains)
    }

    async fn delete_domain(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let removed = inner.domains.remove(&id).is_some();
        inner.records.remove(&id);
        inner.tokens.retain(|t| t.domain_id != id);
        Ok(removed)
    }

    async fn insert_records(
        &self,
        domain_id: Uuid,
        specs: &[RecordSpec],
    ) -> Result<Vec<DnsRecord>> {
        let mut inner = self.inner.lock().await;
        if !inner.domains.contains_key(&domain_id) {
            bail!("no such domain: {domain_id}");
        }

        let now = Utc::now();
        let records: Vec<DnsRecord> = specs
            .iter()
            .map(|spec| DnsRecord {
                id: Uuid::new_v4(),
                domain_id,
                record_type: spec.record_type,
                name: spec.name.clone(),
                value: spec.value.clone(),
                ttl: spec.ttl as i32,
                priority: spec.priority.map(i32::from),
                is_verified: false,
                verification_attempts: 0,
                last_verification: None,
                verification_error: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        inner
            .records
            .entry(domain_id)
            .or_default()
            .extend(records.iter().cloned());
        Ok(records)
    }

    async fn list_records(&self, domain_id: Uuid) -> Result<Vec<DnsRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.records.get(&domain_id).cloned().unwrap_or_default())
    }

    async fn apply_verification(
        &self,
        domain_id: Uuid,
        outcomes: &[RecordOutcome],
        status: DomainStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        // Single lock hold makes the record updates and the aggregate
        // status change one atomic unit, like the SQL transaction.
        let mut inner = self.inner.lock().await;

        if let Some(records) = inner.records.get_mut(&domain_id) {
            for outcome in outcomes {
                if let Some(record) = records.iter_mut().find(|r| r.id == outcome.record_id) {
                    record.is_verified = outcome.verified;
                    record.verification_error = outcome.error.clone();
                    record.last_verification = Some(outcome.checked_at);
                    record.verification_attempts += 1;
                    record.updated_at = outcome.checked_at;
                }
            }
        }

        if let Some(domain) = inner.domains.get_mut(&domain_id) {
            domain.status = status;
            if let Some(at) = verified_at {
                domain.verified_at = Some(at);
            }
            domain.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn set_domain_status(&self, domain_id: Uuid, status: DomainStatus) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(domain) = inner.domains.get_mut(&domain_id) {
            domain.status = status;
            domain.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_settings(&self, domain_id: Uuid, settings: &DomainSettings) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(domain) = inner.domains.get_mut(&domain_id) {
            if let Some(cap) = settings.max_emails_per_day {
                domain.max_emails_per_day = cap;
            }
            if let Some(rate) = settings.rate_limit_per_hour {
                domain.rate_limit_per_hour = rate;
            }
            if let Some(clicks) = settings.click_tracking_enabled {
                domain.click_tracking_enabled = clicks;
            }
            if let Some(opens) = settings.open_tracking_enabled {
                domain.open_tracking_enabled = opens;
            }
            domain.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_usage(
        &self,
        domain_id: Uuid,
        event: UsageEvent,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(domain) = inner.domains.get_mut(&domain_id) {
            match event {
                UsageEvent::Sent => {
                    domain.emails_sent += 1;
                    domain.last_used = Some(at);
                }
                UsageEvent::Opened => domain.emails_opened += 1,
                UsageEvent::Clicked => domain.links_clicked += 1,
            }
            domain.updated_at = at;
        }
        Ok(())
    }

    async fn insert_token(&self, token: NewToken) -> Result<VerificationToken> {
        let mut inner = self.inner.lock().await;
        let stored = VerificationToken {
            id: Uuid::new_v4(),
            domain_id: token.domain_id,
            token: token.token,
            method: token.method,
            is_used: false,
            expires_at: token.expires_at,
            created_at: Utc::now(),
        };
        inner.tokens.push(stored.clone());
        Ok(stored)
    }

    async fn consume_token(
        &self,
        value: &str,
        method: VerificationMethod,
        now: DateTime<Utc>,
    ) -> Result<TokenOutcome> {
        // The whole check-then-set runs under one lock hold.
        let mut inner = self.inner.lock().await;

        let Some(token) = inner
            .tokens
            .iter_mut()
            .find(|t| t.token == value && t.method == method && !t.is_used)
        else {
            return Ok(TokenOutcome::NotFound);
        };

        if token.expires_at <= now {
            return Ok(TokenOutcome::Expired);
        }

        token.is_used = true;
        Ok(TokenOutcome::Consumed(token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DomainType;
    use chrono::Duration;

    fn new_domain(name: &str) -> NewDomain {
        NewDomain {
            name: name.to_string(),
            domain_type: DomainType::Spoofing,
            created_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_names_case_insensitively() {
        let registry = InMemoryDomainRegistry::new();
        registry.insert_domain(new_domain("example.com")).await.unwrap();

        let err = registry.insert_domain(new_domain("EXAMPLE.com")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn delete_cascades_records_and_tokens() {
        let registry = InMemoryDomainRegistry::new();
        let domain = registry.insert_domain(new_domain("example.com")).await.unwrap();

        let specs = vec![RecordSpec {
            record_type: crate::models::RecordType::Txt,
            name: "@".to_string(),
            value: "v=spf1 ~all".to_string(),
            ttl: 3600,
            priority: None,
        }];
        registry.insert_records(domain.id, &specs).await.unwrap();
        registry
            .insert_token(NewToken {
                domain_id: domain.id,
                token: "abc".to_string(),
                method: VerificationMethod::Dns,
                expires_at: Utc::now() + Duration::hours(24),
            })
            .await
            .unwrap();

        assert!(registry.delete_domain(domain.id).await.unwrap());
        assert!(registry.find_domain(domain.id).await.unwrap().is_none());
        assert!(registry.list_records(domain.id).await.unwrap().is_empty());
        let outcome = registry
            .consume_token("abc", VerificationMethod::Dns, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, TokenOutcome::NotFound));
    }

    #[tokio::test]
    async fn token_consumes_exactly_once() {
        let registry = InMemoryDomainRegistry::new();
        let domain = registry.insert_domain(new_domain("example.com")).await.unwrap();
        registry
            .insert_token(NewToken {
                domain_id: domain.id,
                token: "tok".to_string(),
                method: VerificationMethod::Dns,
                expires_at: Utc::now() + Duration::hours(24),
            })
            .await
            .unwrap();

        let first = registry
            .consume_token("tok", VerificationMethod::Dns, Utc::now())
            .await
            .unwrap();
        assert!(matches!(first, TokenOutcome::Consumed(_)));

        let second = registry
            .consume_token("tok", VerificationMethod::Dns, Utc::now())
            .await
            .unwrap();
        assert!(matches!(second, TokenOutcome::NotFound));
    }

    #[tokio::test]
    async fn expired_unused_token_classifies_as_expired() {
        let registry = InMemoryDomainRegistry::new();
        let domain = registry.insert_domain(new_domain("example.com")).await.unwrap();
        registry
            .insert_token(NewToken {
                domain_id: domain.id,
                token: "old".to_string(),
                method: VerificationMethod::Dns,
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();

        let outcome = registry
            .consume_token("old", VerificationMethod::Dns, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, TokenOutcome::Expired));

        // Expired tokens stay unused and inert.
        let again = registry
            .consume_token("old", VerificationMethod::Dns, Utc::now())
            .await
            .unwrap();
        assert!(matches!(again, TokenOutcome::Expired));
    }

    #[tokio::test]
    async fn usage_counters_accumulate_and_stamp_last_used() {
        let registry = InMemoryDomainRegistry::new();
        let domain = registry.insert_domain(new_domain("example.com")).await.unwrap();

        let at = Utc::now();
        registry.record_usage(domain.id, UsageEvent::Sent, at).await.unwrap();
        registry.record_usage(domain.id, UsageEvent::Sent, at).await.unwrap();
        registry.record_usage(domain.id, UsageEvent::Opened, at).await.unwrap();

        let stored = registry.find_domain(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.emails_sent, 2);
        assert_eq!(stored.emails_opened, 1);
        assert_eq!(stored.links_clicked, 0);
        assert_eq!(stored.last_used, Some(at));
    }
}
