use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

pub const MAX_EMAIL_LENGTH: usize = 255;
pub const MAX_NAME_LENGTH: usize = 255;

/// Account entity
///
/// The password hash is deliberately excluded from serialization; any
/// externally visible projection goes through [`AccountResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a freshly generated identifier
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the entity fields
    ///
    /// The email check is intentionally minimal (`@` and `.` present) and
    /// recorded as a known limitation.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_email(&self.email)?;
        validate_name(&self.name)?;
        Ok(())
    }
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email").into());
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::InvalidFormat("email").into());
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH).into());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyField("name").into());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name", MAX_NAME_LENGTH).into());
    }
    Ok(())
}

/// Password-hash-stripped projection returned by the auth endpoints
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}
