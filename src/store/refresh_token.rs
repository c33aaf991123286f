use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::RefreshTokenRecord;
use crate::error::AppError;
use crate::request_context::RequestContext;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(
        &self,
        ctx: &RequestContext,
        record: &RefreshTokenRecord,
    ) -> Result<(), AppError>;

    /// The only read path used during rotation
    async fn get_by_hash(
        &self,
        ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Atomic consume step of a rotation
    ///
    /// Sets `used_at` iff it is still unset and returns whether this call
    /// performed the transition. `false` means another rotation consumed
    /// the record first (or it vanished); the caller lost the race.
    async fn mark_used(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppError>;

    async fn revoke(&self, ctx: &RequestContext, id: Uuid) -> Result<(), AppError>;

    /// Family revocation: revoke every unrevoked record of the account in
    /// one statement so it stays correct under concurrent rotations
    async fn revoke_by_account(&self, ctx: &RequestContext, account_id: Uuid)
        -> Result<(), AppError>;

    /// Housekeeping removal of expired records, driven by an external
    /// periodic task
    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, AppError>;
}

/// PostgreSQL-backed refresh token store
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type RefreshTokenRow = (
    Uuid,
    Uuid,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<String>,
    Option<String>,
);

fn row_to_record(row: RefreshTokenRow) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: row.0,
        account_id: row.1,
        token_hash: row.2,
        expires_at: row.3,
        created_at: row.4,
        used_at: row.5,
        revoked_at: row.6,
        user_agent: row.7,
        ip_address: row.8,
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(
        &self,
        ctx: &RequestContext,
        record: &RefreshTokenRecord,
    ) -> Result<(), AppError> {
        ctx.check()?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id, account_id, token_hash, expires_at,
                created_at, used_at, revoked_at, user_agent, ip_address
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.created_at)
        .bind(record.used_at)
        .bind(record.revoked_at)
        .bind(&record.user_agent)
        .bind(&record.ip_address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_hash(
        &self,
        ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        ctx.check()?;

        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, account_id, token_hash, expires_at, created_at,
                   used_at, revoked_at, user_agent, ip_address
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_record))
    }

    async fn mark_used(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppError> {
        ctx.check()?;

        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET used_at = $1
            WHERE id = $2 AND used_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, ctx: &RequestContext, id: Uuid) -> Result<(), AppError> {
        ctx.check()?;

        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_by_account(
        &self,
        ctx: &RequestContext,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        ctx.check()?;

        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE account_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, AppError> {
        ctx.check()?;

        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
