use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persisted state of one issued refresh token
///
/// Lifecycle: created -> used (rotation) or created -> revoked. Both
/// transitions are monotonic; `used_at` and `revoked_at` are never cleared.
/// The record id doubles as the `jti` claim of the issued token, and only
/// the SHA-256 hash of the token string is stored.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl RefreshTokenRecord {
    pub fn new(
        id: Uuid,
        account_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            id,
            account_id,
            token_hash,
            expires_at,
            created_at: Utc::now(),
            used_at: None,
            revoked_at: None,
            user_agent,
            ip_address,
        }
    }

    /// A record is live iff it is unexpired, unused, and unrevoked
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now() && self.used_at.is_none() && self.revoked_at.is_none()
    }

    pub fn mark_used(&mut self) {
        if self.used_at.is_none() {
            self.used_at = Some(Utc::now());
        }
    }

    pub fn revoke(&mut self) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh_record() -> RefreshTokenRecord {
        RefreshTokenRecord::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "a".repeat(64),
            Utc::now() + Duration::days(30),
            None,
            None,
        )
    }

    #[test]
    fn test_fresh_record_is_valid() {
        assert!(fresh_record().is_valid());
    }

    #[test]
    fn test_used_record_is_invalid() {
        let mut record = fresh_record();
        record.mark_used();
        assert!(!record.is_valid());
        assert!(record.used_at.is_some());
    }

    #[test]
    fn test_revoked_record_is_invalid() {
        let mut record = fresh_record();
        record.revoke();
        assert!(!record.is_valid());
    }

    #[test]
    fn test_expired_record_is_invalid() {
        let mut record = fresh_record();
        record.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!record.is_valid());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut record = fresh_record();
        record.mark_used();
        let first = record.used_at;
        record.mark_used();
        assert_eq!(first, record.used_at);

        record.revoke();
        let first = record.revoked_at;
        record.revoke();
        assert_eq!(first, record.revoked_at);
    }
}
