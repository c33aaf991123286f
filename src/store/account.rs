use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Account;
use crate::error::AppError;
use crate::request_context::RequestContext;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create(&self, ctx: &RequestContext, account: &Account) -> Result<(), AppError>;
    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Account>, AppError>;
    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Account>, AppError>;
}

/// PostgreSQL-backed account store
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type AccountRow = (Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>);

fn row_to_account(row: AccountRow) -> Account {
    Account {
        id: row.0,
        email: row.1,
        name: row.2,
        password_hash: row.3,
        created_at: row.4,
        updated_at: row.5,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, ctx: &RequestContext, account: &Account) -> Result<(), AppError> {
        ctx.check()?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Account>, AppError> {
        ctx.check()?;

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_account))
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Account>, AppError> {
        ctx.check()?;

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, name, password_hash, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_account))
    }
}
