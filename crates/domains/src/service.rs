//! Domain service: the operations exposed to the surrounding application.
//!
//! Owner context is explicit on every call that touches tenant-owned state;
//! the core performs no ambient user lookups. Authentication happens before
//! the call - the owner id arriving here is already trusted.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{ProviderConfig, VerifierConfig};
use crate::engine::VerificationEngine;
use crate::error::DomainError;
use crate::models::{
    AddedDomain, DnsRecord, Domain, DomainAnalytics, DomainSettings, DomainStatus, DomainType,
    TokenOutcome, UsageEvent, VerificationMethod, VerificationReport, VerificationToken,
};
use crate::records::{validate_domain_name, RecordTemplates};
use crate::registry::{DomainRegistry, NewDomain, NewToken};
use crate::resolver::DnsResolver;

/// Entry point for registering, verifying, and managing sending domains.
pub struct DomainService {
    registry: Arc<dyn DomainRegistry>,
    templates: RecordTemplates,
    engine: VerificationEngine,
    config: VerifierConfig,
}

impl DomainService {
    pub fn new(
        registry: Arc<dyn DomainRegistry>,
        resolver: Arc<dyn DnsResolver>,
        provider: ProviderConfig,
        config: VerifierConfig,
    ) -> Self {
        let engine = VerificationEngine::new(Arc::clone(&registry), resolver, config.clone());
        Self {
            registry,
            templates: RecordTemplates::new(provider),
            engine,
            config,
        }
    }

    /// Register a new sending domain for an owner.
    ///
    /// The domain starts in `pending` with its required record set and one
    /// fresh DNS verification token.
    pub async fn add_domain(
        &self,
        name: &str,
        domain_type: DomainType,
        owner: Uuid,
    ) -> Result<AddedDomain, DomainError> {
        let name = name.trim().to_ascii_lowercase();
        validate_domain_name(&name)?;

        if self.registry.find_domain_by_name(&name).await?.is_some() {
            return Err(DomainError::DuplicateDomain(name));
        }

        let domain = self
            .registry
            .insert_domain(NewDomain {
                name: name.clone(),
                domain_type,
                created_by: owner,
            })
            .await?;

        let specs = self.templates.required_records(&name);
        for spec in &specs {
            spec.validate()?;
        }
        let records = self.registry.insert_records(domain.id, &specs).await?;
        let token = self.issue_token(domain.id).await?;

        tracing::info!("Domain {} added in pending state", name);

        Ok(AddedDomain {
            domain,
            records,
            token,
        })
    }

    /// Run one verification pass and return the full per-record report.
    pub async fn verify(&self, domain_id: Uuid) -> Result<VerificationReport, DomainError> {
        self.engine.verify(domain_id).await
    }

    /// List the records a domain is expected to publish.
    pub async fn list_records(&self, domain_id: Uuid) -> Result<Vec<DnsRecord>, DomainError> {
        if self.registry.find_domain(domain_id).await?.is_none() {
            return Err(DomainError::DomainNotFound);
        }
        Ok(self.registry.list_records(domain_id).await?)
    }

    /// List an owner's domains, newest first.
    pub async fn list_domains(&self, owner: Uuid) -> Result<Vec<Domain>, DomainError> {
        Ok(self.registry.list_domains_by_owner(owner).await?)
    }

    /// Delete a domain and everything it owns.
    pub async fn delete_domain(&self, domain_id: Uuid, owner: Uuid) -> Result<(), DomainError> {
        let domain = self.owned_domain(domain_id, owner).await?;
        self.registry.delete_domain(domain.id).await?;
        tracing::info!("Domain {} deleted", domain.name);
        Ok(())
    }

    /// Issue a fresh DNS verification token for a domain.
    ///
    /// 32 random bytes hex-encoded; expired tokens are inert, so callers
    /// regenerate rather than extend.
    pub async fn issue_token(&self, domain_id: Uuid) -> Result<VerificationToken, DomainError> {
        if self.registry.find_domain(domain_id).await?.is_none() {
            return Err(DomainError::DomainNotFound);
        }

        let token_bytes: [u8; 32] = rand::random();
        let token = self
            .registry
            .insert_token(NewToken {
                domain_id,
                token: hex::encode(token_bytes),
                method: VerificationMethod::Dns,
                expires_at: Utc::now() + self.config.token_ttl,
            })
            .await?;
        Ok(token)
    }

    /// Consume a verification token, at most once.
    pub async fn consume_token(
        &self,
        value: &str,
        method: VerificationMethod,
    ) -> Result<VerificationToken, DomainError> {
        match self
            .registry
            .consume_token(value, method, Utc::now())
            .await?
        {
            TokenOutcome::Consumed(token) => Ok(token),
            TokenOutcome::NotFound => Err(DomainError::TokenNotFound),
            TokenOutcome::Expired => Err(DomainError::TokenExpired),
        }
    }

    /// Apply owner-adjustable settings (send caps, tracking toggles).
    pub async fn update_settings(
        &self,
        domain_id: Uuid,
        owner: Uuid,
        settings: DomainSettings,
    ) -> Result<(), DomainError> {
        self.owned_domain(domain_id, owner).await?;
        self.registry.update_settings(domain_id, &settings).await?;
        Ok(())
    }

    /// Manually move a verified domain between `active` and `inactive`.
    ///
    /// Domains that have not passed verification cannot be activated; their
    /// status belongs to the verification engine.
    pub async fn set_domain_enabled(
        &self,
        domain_id: Uuid,
        owner: Uuid,
        enabled: bool,
    ) -> Result<(), DomainError> {
        let domain = self.owned_domain(domain_id, owner).await?;

        match domain.status {
            DomainStatus::Verified | DomainStatus::Active | DomainStatus::Inactive => {
                let status = if enabled {
                    DomainStatus::Active
                } else {
                    DomainStatus::Inactive
                };
                self.registry.set_domain_status(domain_id, status).await?;
                tracing::info!("Domain {} manually set to {}", domain.name, status);
                Ok(())
            }
            DomainStatus::Pending | DomainStatus::Failed => {
                Err(DomainError::InvalidTransition(domain.status))
            }
        }
    }

    /// Usage snapshot for a domain, with derived open and click rates.
    pub async fn domain_analytics(
        &self,
        domain_id: Uuid,
        owner: Uuid,
    ) -> Result<DomainAnalytics, DomainError> {
        let domain = self.owned_domain(domain_id, owner).await?;
        Ok(DomainAnalytics {
            domain_id: domain.id,
            name: domain.name.clone(),
            status: domain.status,
            emails_sent: domain.emails_sent,
            emails_opened: domain.emails_opened,
            links_clicked: domain.links_clicked,
            open_rate: domain.open_rate(),
            click_rate: domain.click_rate(),
            last_used: domain.last_used,
            created_at: domain.created_at,
            verified_at: domain.verified_at,
        })
    }

    /// Bump a usage counter from the sending pipeline.
    pub async fn record_usage(
        &self,
        domain_id: Uuid,
        event: UsageEvent,
    ) -> Result<(), DomainError> {
        if self.registry.find_domain(domain_id).await?.is_none() {
            return Err(DomainError::DomainNotFound);
        }
        self.registry
            .record_usage(domain_id, event, Utc::now())
            .await?;
        Ok(())
    }

    /// Load a domain and check the caller owns it.
    async fn owned_domain(&self, domain_id: Uuid, owner: Uuid) -> Result<Domain, DomainError> {
        let domain = self
            .registry
            .find_domain(domain_id)
            .await?
            .ok_or(DomainError::DomainNotFound)?;
        if domain.created_by != owner {
            return Err(DomainError::PermissionDenied);
        }
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryDomainRegistry;
    use crate::resolver::{MockDnsResolver, QueryType};

    fn service() -> (DomainService, Arc<MockDnsResolver>) {
        let resolver = Arc::new(MockDnsResolver::new());
        let service = DomainService::new(
            Arc::new(InMemoryDomainRegistry::new()),
            Arc::clone(&resolver) as Arc<dyn DnsResolver>,
            ProviderConfig::default(),
            VerifierConfig::default(),
        );
        (service, resolver)
    }

    #[tokio::test]
    async fn add_domain_starts_pending_with_four_unverified_records() {
        let (service, _) = service();
        let owner = Uuid::new_v4();

        let added = service
            .add_domain("example-test.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        assert_eq!(added.domain.status, DomainStatus::Pending);
        assert_eq!(added.domain.name, "example-test.com");
        assert_eq!(added.records.len(), 4);
        assert!(added
            .records
            .iter()
            .all(|r| !r.is_verified && r.verification_attempts == 0));
        assert_eq!(added.token.token.len(), 64);
        assert!(!added.token.is_used);
    }

    #[tokio::test]
    async fn add_domain_folds_case_and_rejects_duplicates() {
        let (service, _) = service();
        let owner = Uuid::new_v4();

        let added = service
            .add_domain("Example-Test.COM", DomainType::Spoofing, owner)
            .await
            .unwrap();
        assert_eq!(added.domain.name, "example-test.com");

        let err = service
            .add_domain("EXAMPLE-TEST.com", DomainType::Tracking, owner)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateDomain(_)));
    }

    #[tokio::test]
    async fn add_domain_rejects_invalid_names() {
        let (service, _) = service();
        let owner = Uuid::new_v4();

        for bad in ["", "localhost", "-bad.com", "exa mple.com"] {
            let err = service
                .add_domain(bad, DomainType::Spoofing, owner)
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidDomainName(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Primary, owner)
            .await
            .unwrap();

        let err = service
            .delete_domain(added.domain.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied));

        service.delete_domain(added.domain.id, owner).await.unwrap();
        let err = service.list_records(added.domain.id).await.unwrap_err();
        assert!(matches!(err, DomainError::DomainNotFound));
    }

    #[tokio::test]
    async fn tokens_consume_once_then_report_not_found() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        let consumed = service
            .consume_token(&added.token.token, VerificationMethod::Dns)
            .await
            .unwrap();
        assert!(consumed.is_used);

        let err = service
            .consume_token(&added.token.token, VerificationMethod::Dns)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TokenNotFound));
    }

    #[tokio::test]
    async fn token_method_must_match() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        let err = service
            .consume_token(&added.token.token, VerificationMethod::File)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TokenNotFound));
    }

    #[tokio::test]
    async fn pending_domains_cannot_be_manually_activated() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        let err = service
            .set_domain_enabled(added.domain.id, owner, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition(DomainStatus::Pending)
        ));
    }

    #[tokio::test]
    async fn verified_domains_can_toggle_active() {
        let (service, resolver) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        resolver.add("example.com", QueryType::Mx, &["mail.sendgrid.net"]);
        resolver.add(
            "example.com",
            QueryType::Txt,
            &["v=spf1 include:sendgrid.net ~all"],
        );
        resolver.add("email.example.com", QueryType::Cname, &["sendgrid.net"]);
        resolver.add(
            "_dmarc.example.com",
            QueryType::Txt,
            &["v=DMARC1; p=quarantine; rua=mailto:dmarc@example.com"],
        );
        let report = service.verify(added.domain.id).await.unwrap();
        assert!(report.verified);

        service
            .set_domain_enabled(added.domain.id, owner, true)
            .await
            .unwrap();
        let analytics = service
            .domain_analytics(added.domain.id, owner)
            .await
            .unwrap();
        assert_eq!(analytics.status, DomainStatus::Active);

        service
            .set_domain_enabled(added.domain.id, owner, false)
            .await
            .unwrap();
        let analytics = service
            .domain_analytics(added.domain.id, owner)
            .await
            .unwrap();
        assert_eq!(analytics.status, DomainStatus::Inactive);
    }

    #[tokio::test]
    async fn settings_updates_require_ownership_and_apply() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        let settings = DomainSettings {
            max_emails_per_day: Some(50),
            click_tracking_enabled: Some(false),
            ..Default::default()
        };
        let err = service
            .update_settings(added.domain.id, Uuid::new_v4(), settings.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PermissionDenied));

        service
            .update_settings(added.domain.id, owner, settings)
            .await
            .unwrap();
        let domains = service.list_domains(owner).await.unwrap();
        assert_eq!(domains[0].max_emails_per_day, 50);
        assert!(!domains[0].click_tracking_enabled);
        assert_eq!(domains[0].rate_limit_per_hour, 100);
    }

    #[tokio::test]
    async fn usage_events_drive_analytics_rates() {
        let (service, _) = service();
        let owner = Uuid::new_v4();
        let added = service
            .add_domain("example.com", DomainType::Spoofing, owner)
            .await
            .unwrap();

        for _ in 0..4 {
            service
                .record_usage(added.domain.id, UsageEvent::Sent)
                .await
                .unwrap();
        }
        service
            .record_usage(added.domain.id, UsageEvent::Opened)
            .await
            .unwrap();

        let analytics = service
            .domain_analytics(added.domain.id, owner)
            .await
            .unwrap();
        assert_eq!(analytics.emails_sent, 4);
        assert_eq!(analytics.open_rate, 25.0);
        assert_eq!(analytics.click_rate, 0.0);
        assert!(analytics.last_used.is_some());
    }
}
