/// Auth engine
///
/// Orchestrates sign-up, login, refresh-token rotation, logout, and bearer
/// authorization across the token codec, password hasher, stores, and the
/// audit sink. The rotation path implements reuse detection: presenting an
/// already-rotated refresh token revokes the whole token family of the
/// owning account.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{hash_token, JwtCodec, PasswordHasher};
use crate::domain::{
    validate_email, validate_name, Account, AccountResponse, RefreshTokenRecord,
    SecurityAuditEvent, SecurityEventKind, SENTINEL_ACCOUNT_ID,
};
use crate::error::{AppError, TokenError};
use crate::request_context::RequestContext;
use crate::store::{AccountStore, AuditSink, RefreshTokenStore};

/// Access/refresh pair returned by the issuing operations, together with a
/// password-hash-stripped projection of the account
#[derive(Debug)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub account: AccountResponse,
}

/// Identity extracted from a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account_id: Uuid,
    pub email: String,
}

pub struct AuthEngine {
    accounts: Arc<dyn AccountStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    audit: Option<Arc<dyn AuditSink>>,
    codec: JwtCodec,
    passwords: PasswordHasher,
    /// Verified against when a login names an unknown email, so the
    /// missing-account path costs a bcrypt comparison like any other.
    dummy_password_hash: String,
}

impl AuthEngine {
    pub fn new(
        codec: JwtCodec,
        passwords: PasswordHasher,
        accounts: Arc<dyn AccountStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self, AppError> {
        let dummy_password_hash = passwords.dummy_hash()?;
        Ok(Self {
            accounts,
            refresh_tokens,
            audit,
            codec,
            passwords,
            dummy_password_hash,
        })
    }

    /// Create an account and issue its first token pair
    pub async fn sign_up(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthTokens, AppError> {
        if self.accounts.get_by_email(ctx, email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }

        validate_email(email)?;
        validate_name(name)?;
        let password_hash = self.passwords.hash(password)?;

        let account = Account::new(email.to_string(), name.to_string(), password_hash);
        self.accounts.create(ctx, &account).await.map_err(|e| {
            // Lost the uniqueness race against a concurrent sign-up.
            match e {
                AppError::Database(crate::error::DatabaseError::UniqueConstraintViolation(_)) => {
                    AppError::EmailTaken
                }
                other => other,
            }
        })?;

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            account_id = %account.id,
            "Account created"
        );

        self.issue_pair(ctx, &account, None, None).await
    }

    /// Authenticate with email and password and issue a token pair
    ///
    /// The unknown-email and wrong-password paths return the same error
    /// kind, and both perform a password verification.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<AuthTokens, AppError> {
        let account = match self.accounts.get_by_email(ctx, email).await? {
            Some(account) => account,
            None => {
                let _ = self.passwords.verify(password, &self.dummy_password_hash);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.passwords.verify(password, &account.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            account_id = %account.id,
            "Login succeeded"
        );

        self.issue_pair(ctx, &account, user_agent, ip_address).await
    }

    /// Rotate a refresh token: consume the presented one and issue a new
    /// pair. Reuse of an already-consumed token revokes the whole family.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<AuthTokens, AppError> {
        // 1. Cryptographic validation. Tampering kinds are audit-worthy;
        //    ordinary expiry is not.
        let claims = match self.codec.verify_refresh_token(refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                if e.is_suspicious() {
                    self.record_event(
                        ctx,
                        SENTINEL_ACCOUNT_ID,
                        SecurityEventKind::SuspiciousLogin,
                        format!("Invalid refresh token attempt: {}", e.suspicious_description()),
                        user_agent.clone(),
                        ip_address.clone(),
                    )
                    .await;
                }
                return Err(AppError::Token(e));
            }
        };

        // 2. Lookup by hash. Absence is the common case for very old
        //    tokens and is not audited.
        let token_hash = hash_token(refresh_token);
        let record = match self.refresh_tokens.get_by_hash(ctx, &token_hash).await? {
            Some(record) => record,
            None => return Err(AppError::InvalidToken),
        };

        // 3. Reuse check, before the validity check: a used but unexpired
        //    token being presented again is the theft signal.
        if record.used_at.is_some() {
            return Err(self
                .handle_token_reuse(ctx, &record, user_agent, ip_address)
                .await);
        }

        // 4. Expired or revoked records are rejected without ceremony.
        if !record.is_valid() {
            return Err(AppError::InvalidToken);
        }

        // 5. The owning account must still exist.
        let account = match self.accounts.get_by_id(ctx, record.account_id).await? {
            Some(account) => account,
            None => return Err(AppError::InvalidToken),
        };

        debug_assert_eq!(claims.account_id, record.account_id.to_string());

        // 6. Atomic consume. Losing the race against a concurrent rotation
        //    of the same token means the token was just used elsewhere:
        //    treat it exactly like reuse.
        if !self.refresh_tokens.mark_used(ctx, record.id).await? {
            return Err(self
                .handle_token_reuse(ctx, &record, user_agent, ip_address)
                .await);
        }

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            account_id = %account.id,
            "Refresh token rotated"
        );

        // 7. Issue the successor pair.
        self.issue_pair(ctx, &account, user_agent, ip_address).await
    }

    /// Revoke the presented refresh token. Idempotent from the client's
    /// point of view: an unknown token is not an error.
    pub async fn logout(&self, ctx: &RequestContext, refresh_token: &str) -> Result<(), AppError> {
        let token_hash = hash_token(refresh_token);

        let record = match self.refresh_tokens.get_by_hash(ctx, &token_hash).await? {
            Some(record) => record,
            None => return Ok(()),
        };

        self.refresh_tokens.revoke(ctx, record.id).await?;

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            account_id = %record.account_id,
            "Refresh token revoked on logout"
        );

        Ok(())
    }

    /// Authorize a protected request from its `Authorization` header
    ///
    /// The header must equal `Bearer <token>` (case-sensitive scheme,
    /// single space). Tampering failure kinds are recorded against the
    /// sentinel account.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        authorization_header: Option<&str>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<AuthenticatedAccount, AppError> {
        let header = match authorization_header {
            Some(header) => header,
            None => return Err(AppError::InvalidToken),
        };

        let token = match parse_bearer_header(header) {
            Some(token) => token,
            None => {
                // A present but garbled credential is worth recording.
                self.record_event(
                    ctx,
                    SENTINEL_ACCOUNT_ID,
                    SecurityEventKind::SuspiciousLogin,
                    TokenError::Malformed.suspicious_description(),
                    user_agent,
                    ip_address,
                )
                .await;
                return Err(AppError::Token(TokenError::Malformed));
            }
        };

        let claims = match self.codec.verify_access_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                if e.is_suspicious() || e == TokenError::Malformed {
                    self.record_event(
                        ctx,
                        SENTINEL_ACCOUNT_ID,
                        SecurityEventKind::SuspiciousLogin,
                        e.suspicious_description(),
                        user_agent,
                        ip_address,
                    )
                    .await;
                }
                return Err(AppError::Token(e));
            }
        };

        let account_id = Uuid::parse_str(&claims.account_id)
            .map_err(|_| AppError::Token(TokenError::BadClaimFormat("account_id")))?;

        Ok(AuthenticatedAccount {
            account_id,
            email: claims.email,
        })
    }

    /// Run the expired-record housekeeping pass (driven by an external
    /// periodic task)
    pub async fn delete_expired_tokens(&self, ctx: &RequestContext) -> Result<u64, AppError> {
        self.refresh_tokens.delete_expired(ctx).await
    }

    /// Generate, persist, and return a fresh access/refresh pair
    async fn issue_pair(
        &self,
        ctx: &RequestContext,
        account: &Account,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<AuthTokens, AppError> {
        let access_token = self.codec.issue_access_token(account.id, &account.email)?;
        let (refresh_token, token_id) = self.codec.issue_refresh_token(account.id)?;

        let record = RefreshTokenRecord::new(
            token_id,
            account.id,
            hash_token(&refresh_token),
            Utc::now() + Duration::seconds(self.codec.refresh_token_expiry()),
            user_agent,
            ip_address,
        );
        self.refresh_tokens.create(ctx, &record).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.codec.access_token_expiry(),
            account: AccountResponse::from(account),
        })
    }

    /// Family revocation for a detected reuse. Revocation failures are
    /// logged and the compromise is still reported to the caller.
    async fn handle_token_reuse(
        &self,
        ctx: &RequestContext,
        record: &RefreshTokenRecord,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppError {
        if let Err(e) = self
            .refresh_tokens
            .revoke_by_account(ctx, record.account_id)
            .await
        {
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                account_id = %record.account_id,
                error = %e,
                "Failed to revoke token family after reuse detection"
            );
        }

        self.record_event(
            ctx,
            record.account_id,
            SecurityEventKind::TokenReuseDetected,
            "Attempted reuse of an already-rotated refresh token detected. \
             All refresh tokens for the account have been revoked.",
            user_agent,
            ip_address,
        )
        .await;

        AppError::TokenCompromised
    }

    /// Append a security audit event. Sink failures are swallowed: the
    /// audit path never blocks a security decision.
    async fn record_event(
        &self,
        ctx: &RequestContext,
        account_id: Uuid,
        kind: SecurityEventKind,
        description: impl Into<String>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) {
        let description = description.into();

        tracing::warn!(
            correlation_id = %ctx.correlation_id(),
            account_id = %account_id,
            event = %kind,
            description = %description,
            "Security event"
        );

        if let Some(sink) = &self.audit {
            let event = SecurityAuditEvent::new(
                account_id,
                kind,
                description,
                ip_address,
                user_agent,
                None,
            );
            if let Err(e) = sink.record(ctx, event).await {
                tracing::error!(
                    correlation_id = %ctx.correlation_id(),
                    error = %e,
                    "Failed to persist security audit event"
                );
            }
        }
    }
}

/// Strict `Bearer <token>` parse: case-sensitive scheme, single space,
/// non-empty token
fn parse_bearer_header(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?;
    if token.is_empty() || token.starts_with(' ') || token.contains(' ') {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_parse() {
        assert_eq!(parse_bearer_header("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer_header("bearer abc.def.ghi"), None);
        assert_eq!(parse_bearer_header("Bearer"), None);
        assert_eq!(parse_bearer_header("Bearer "), None);
        assert_eq!(parse_bearer_header("Bearer  abc"), None);
        assert_eq!(parse_bearer_header("Bearer abc def"), None);
        assert_eq!(parse_bearer_header("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer_header("BearerToken"), None);
    }
}
