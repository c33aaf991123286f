use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder account id for events whose account cannot be determined
/// from an invalid token. The nil UUID never collides with a real account
/// because account ids are always generated as v4.
pub const SENTINEL_ACCOUNT_ID: Uuid = Uuid::nil();

/// Closed set of security-significant event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityEventKind {
    #[serde(rename = "TOKEN_REUSE_DETECTED")]
    TokenReuseDetected,
    #[serde(rename = "ALL_TOKENS_REVOKED")]
    AllTokensRevoked,
    #[serde(rename = "SUSPICIOUS_LOGIN")]
    SuspiciousLogin,
    #[serde(rename = "PASSWORD_CHANGED")]
    PasswordChanged,
    #[serde(rename = "ACCOUNT_LOCKED")]
    AccountLocked,
    #[serde(rename = "MULTIPLE_FAILED_LOGINS")]
    MultipleFailedLogins,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
            SecurityEventKind::AllTokensRevoked => "ALL_TOKENS_REVOKED",
            SecurityEventKind::SuspiciousLogin => "SUSPICIOUS_LOGIN",
            SecurityEventKind::PasswordChanged => "PASSWORD_CHANGED",
            SecurityEventKind::AccountLocked => "ACCOUNT_LOCKED",
            SecurityEventKind::MultipleFailedLogins => "MULTIPLE_FAILED_LOGINS",
        }
    }
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record of one security-significant event
#[derive(Debug, Clone)]
pub struct SecurityAuditEvent {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: SecurityEventKind,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SecurityAuditEvent {
    pub fn new(
        account_id: Uuid,
        kind: SecurityEventKind,
        description: impl Into<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            description: description.into(),
            ip_address,
            user_agent,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(SecurityEventKind::TokenReuseDetected.as_str(), "TOKEN_REUSE_DETECTED");
        assert_eq!(
            serde_json::to_string(&SecurityEventKind::SuspiciousLogin).unwrap(),
            "\"SUSPICIOUS_LOGIN\""
        );
    }

    #[test]
    fn test_unknown_kind_is_not_deserializable() {
        let result: Result<SecurityEventKind, _> = serde_json::from_str("\"SOMETHING_ELSE\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_sentinel_is_nil() {
        assert!(SENTINEL_ACCOUNT_ID.is_nil());
    }
}
