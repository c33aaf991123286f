//! Shared test harness: in-memory store implementations and an engine
//! builder, so the auth flows can be exercised without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use jwt_auth_server::auth::{JwtCodec, PasswordHasher};
use jwt_auth_server::configuration::JwtSettings;
use jwt_auth_server::domain::{Account, RefreshTokenRecord, SecurityAuditEvent};
use jwt_auth_server::engine::AuthEngine;
use jwt_auth_server::error::{AppError, DatabaseError};
use jwt_auth_server::request_context::RequestContext;
use jwt_auth_server::store::{AccountStore, AuditSink, RefreshTokenStore};

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_token_secret: "test-access-secret-0123456789-0123456789".to_string(),
        refresh_token_secret: "test-refresh-secret-0123456789-0123456789".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 2_592_000,
        issuer: "auth".to_string(),
        audience: vec!["svc-a".to_string()],
    }
}

/// A codec sharing the harness secrets, for forging and inspecting tokens
/// from tests
pub fn test_codec() -> JwtCodec {
    JwtCodec::new(&jwt_settings()).expect("valid jwt settings")
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn delete(&self, id: Uuid) {
        self.accounts.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, ctx: &RequestContext, account: &Account) -> Result<(), AppError> {
        ctx.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|a| a.email == account.email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "accounts_email_key".to_string(),
            )
            .into());
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<Account>, AppError> {
        ctx.check()?;
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> Result<Option<Account>, AppError> {
        ctx.check()?;
        Ok(self.accounts.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn records(&self) -> Vec<RefreshTokenRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn records_for_account(&self, account_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Force a record into the expired state
    pub fn expire(&self, id: Uuid) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(
        &self,
        ctx: &RequestContext,
        record: &RefreshTokenRecord,
    ) -> Result<(), AppError> {
        ctx.check()?;
        let mut records = self.records.lock().unwrap();
        if records.values().any(|r| r.token_hash == record.token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            )
            .into());
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_by_hash(
        &self,
        ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        ctx.check()?;
        let records = self.records.lock().unwrap();
        Ok(records.values().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn mark_used(&self, ctx: &RequestContext, id: Uuid) -> Result<bool, AppError> {
        ctx.check()?;
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if record.used_at.is_none() => {
                record.used_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, ctx: &RequestContext, id: Uuid) -> Result<(), AppError> {
        ctx.check()?;
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            if record.revoked_at.is_none() {
                record.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_by_account(
        &self,
        ctx: &RequestContext,
        account_id: Uuid,
    ) -> Result<(), AppError> {
        ctx.check()?;
        for record in self.records.lock().unwrap().values_mut() {
            if record.account_id == account_id && record.revoked_at.is_none() {
                record.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64, AppError> {
        ctx.check()?;
        let mut records = self.records.lock().unwrap();
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| r.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<SecurityAuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<SecurityAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(
        &self,
        ctx: &RequestContext,
        event: SecurityAuditEvent,
    ) -> Result<(), AppError> {
        ctx.check()?;
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Audit sink whose writes always fail; the engine must swallow these
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _ctx: &RequestContext, _event: SecurityAuditEvent) -> Result<(), AppError> {
        Err(AppError::Internal("audit sink unavailable".to_string()))
    }
}

pub struct TestHarness {
    pub engine: Arc<AuthEngine>,
    pub accounts: Arc<MemoryAccountStore>,
    pub refresh_tokens: Arc<MemoryRefreshTokenStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn spawn_engine() -> TestHarness {
    let accounts = Arc::new(MemoryAccountStore::default());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStore::default());
    let audit = Arc::new(MemoryAuditSink::default());

    let engine = AuthEngine::new(
        test_codec(),
        // Minimum allowed cost keeps the suite fast.
        PasswordHasher::new(10).expect("valid cost"),
        Arc::clone(&accounts) as Arc<dyn AccountStore>,
        Arc::clone(&refresh_tokens) as Arc<dyn RefreshTokenStore>,
        Some(Arc::clone(&audit) as Arc<dyn AuditSink>),
    )
    .expect("engine construction");

    TestHarness {
        engine: Arc::new(engine),
        accounts,
        refresh_tokens,
        audit,
    }
}

/// Engine without any audit sink attached. The returned `audit` handle is
/// a dangling sink that never receives events.
pub fn spawn_engine_without_audit() -> TestHarness {
    let accounts = Arc::new(MemoryAccountStore::default());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStore::default());

    let engine = AuthEngine::new(
        test_codec(),
        PasswordHasher::new(10).expect("valid cost"),
        Arc::clone(&accounts) as Arc<dyn AccountStore>,
        Arc::clone(&refresh_tokens) as Arc<dyn RefreshTokenStore>,
        None,
    )
    .expect("engine construction");

    TestHarness {
        engine: Arc::new(engine),
        accounts,
        refresh_tokens,
        audit: Arc::new(MemoryAuditSink::default()),
    }
}

/// Engine whose audit sink always fails
pub fn spawn_engine_with_failing_audit() -> TestHarness {
    let accounts = Arc::new(MemoryAccountStore::default());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStore::default());

    let engine = AuthEngine::new(
        test_codec(),
        PasswordHasher::new(10).expect("valid cost"),
        Arc::clone(&accounts) as Arc<dyn AccountStore>,
        Arc::clone(&refresh_tokens) as Arc<dyn RefreshTokenStore>,
        Some(Arc::new(FailingAuditSink)),
    )
    .expect("engine construction");

    TestHarness {
        engine: Arc::new(engine),
        accounts,
        refresh_tokens,
        audit: Arc::new(MemoryAuditSink::default()),
    }
}
