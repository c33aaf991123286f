use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::SecurityAuditEvent;
use crate::error::AppError;
use crate::request_context::RequestContext;

/// Append-only sink for security audit events
///
/// The engine tolerates an absent sink and swallows sink failures; the
/// audit path must never block a security decision.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, ctx: &RequestContext, event: SecurityAuditEvent)
        -> Result<(), AppError>;
}

/// PostgreSQL-backed audit sink
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(
        &self,
        ctx: &RequestContext,
        event: SecurityAuditEvent,
    ) -> Result<(), AppError> {
        ctx.check()?;

        sqlx::query(
            r#"
            INSERT INTO security_audit_logs (
                id, account_id, event_type, event_description,
                ip_address, user_agent, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(event.account_id)
        .bind(event.kind.as_str())
        .bind(&event.description)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
