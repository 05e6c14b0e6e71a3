//! PostgreSQL domain registry.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{
    DnsRecord, Domain, DomainSettings, DomainStatus, RecordOutcome, RecordSpec, TokenOutcome,
    UsageEvent, VerificationMethod, VerificationToken,
};
use crate::registry::{DomainRegistry, NewDomain, NewToken};

/// PostgreSQL implementation of [`DomainRegistry`].
#[derive(Clone)]
pub struct PgDomainRegistry {
    pool: Pool<Postgres>,
}

impl PgDomainRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Run the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DomainRegistry for PgDomainRegistry {
    async fn insert_domain(&self, new: NewDomain) -> Result<Domain> {
        let domain = sqlx::query_as::<_, Domain>(
            r#"
            INSERT INTO email_domains (id, name, domain_type, status, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.domain_type)
        .bind(DomainStatus::Pending)
        .bind(new.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(domain)
    }

    async fn find_domain(&self, id: Uuid) -> Result<Option<Domain>> {
        let domain = sqlx::query_as::<_, Domain>("SELECT * FROM email_domains WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(domain)
    }

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<Domain>> {
        let domain =
            sqlx::query_as::<_, Domain>("SELECT * FROM email_domains WHERE lower(name) = lower($1)")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(domain)
    }

    async fn list_domains_by_owner(&self, owner: Uuid) -> Result<Vec<Domain>> {
        let domains = sqlx::query_as::<_, Domain>(
            "SELECT * FROM email_domains WHERE created_by = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(domains)
    }

    async fn delete_domain(&self, id: Uuid) -> Result<bool> {
        // Records and tokens cascade via foreign keys.
        let result = sqlx::query("DELETE FROM email_domains WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_records(
        &self,
        domain_id: Uuid,
        specs: &[RecordSpec],
    ) -> Result<Vec<DnsRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(specs.len());

        for spec in specs {
            let record = sqlx::query_as::<_, DnsRecord>(
                r#"
                INSERT INTO domain_dns_records (id, domain_id, record_type, name, value, ttl, priority)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(domain_id)
            .bind(spec.record_type)
            .bind(&spec.name)
            .bind(&spec.value)
            .bind(spec.ttl as i32)
            .bind(spec.priority.map(i32::from))
            .fetch_one(&mut *tx)
            .await?;
            records.push(record);
        }

        tx.commit().await?;
        Ok(records)
    }

    async fn list_records(&self, domain_id: Uuid) -> Result<Vec<DnsRecord>> {
        let records = sqlx::query_as::<_, DnsRecord>(
            "SELECT * FROM domain_dns_records WHERE domain_id = $1 ORDER BY created_at, id",
        )
        .bind(domain_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn apply_verification(
        &self,
        domain_id: Uuid,
        outcomes: &[RecordOutcome],
        status: DomainStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for outcome in outcomes {
            sqlx::query(
                r#"
                UPDATE domain_dns_records
                SET is_verified = $1,
                    verification_error = $2,
                    last_verification = $3,
                    verification_attempts = verification_attempts + 1,
                    updated_at = $3
                WHERE id = $4 AND domain_id = $5
                "#,
            )
            .bind(outcome.verified)
            .bind(&outcome.error)
            .bind(outcome.checked_at)
            .bind(outcome.record_id)
            .bind(domain_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE email_domains
            SET status = $1,
                verified_at = COALESCE($2, verified_at),
                updated_at = now()
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(verified_at)
        .bind(domain_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_domain_status(&self, domain_id: Uuid, status: DomainStatus) -> Result<()> {
        sqlx::query("UPDATE email_domains SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status)
            .bind(domain_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_settings(&self, domain_id: Uuid, settings: &DomainSettings) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_domains
            SET max_emails_per_day = COALESCE($1, max_emails_per_day),
                rate_limit_per_hour = COALESCE($2, rate_limit_per_hour),
                click_tracking_enabled = COALESCE($3, click_tracking_enabled),
                open_tracking_enabled = COALESCE($4, open_tracking_enabled),
                updated_at = now()
            WHERE id = $5
            "#,
        )
        .bind(settings.max_emails_per_day)
        .bind(settings.rate_limit_per_hour)
        .bind(settings.click_tracking_enabled)
        .bind(settings.open_tracking_enabled)
        .bind(domain_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_usage(
        &self,
        domain_id: Uuid,
        event: UsageEvent,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let query = match event {
            UsageEvent::Sent => {
                r#"
                UPDATE email_domains
                SET emails_sent = emails_sent + 1, last_used = $1, updated_at = $1
                WHERE id = $2
                "#
            }
            UsageEvent::Opened => {
                r#"
                UPDATE email_domains
                SET emails_opened = emails_opened + 1, updated_at = $1
                WHERE id = $2
                "#
            }
            UsageEvent::Clicked => {
                r#"
                UPDATE email_domains
                SET links_clicked = links_clicked + 1, updated_at = $1
                WHERE id = $2
                "#
            }
        };

        sqlx::query(query)
            .bind(at)
            .bind(domain_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_token(&self, token: NewToken) -> Result<VerificationToken> {
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO domain_verification_tokens (id, domain_id, token, verification_type, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.domain_id)
        .bind(&token.token)
        .bind(token.method)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn consume_token(
        &self,
        value: &str,
        method: VerificationMethod,
        now: DateTime<Utc>,
    ) -> Result<TokenOutcome> {
        // Check-unused-then-mark-used as one statement, so concurrent
        // attempts cannot both succeed.
        let consumed = sqlx::query_as::<_, VerificationToken>(
            r#"
            UPDATE domain_verification_tokens
            SET is_used = TRUE
            WHERE token = $1 AND verification_type = $2 AND is_used = FALSE AND expires_at > $3
            RETURNING *
            "#,
        )
        .bind(value)
        .bind(method)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(token) = consumed {
            return Ok(TokenOutcome::Consumed(token));
        }

        let expired = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM domain_verification_tokens
                WHERE token = $1 AND verification_type = $2
                  AND is_used = FALSE AND expires_at <= $3
            )
            "#,
        )
        .bind(value)
        .bind(method)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        if expired {
            Ok(TokenOutcome::Expired)
        } else {
            Ok(TokenOutcome::NotFound)
        }
    }
}
