/// Password hashing and verification
///
/// bcrypt with a configuration-supplied cost factor. Password length is
/// capped at 60 unicode scalars to stay below bcrypt's 72-byte input
/// ceiling once encoded as UTF-8.

use crate::error::{AppError, ConfigError, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 60;
const MIN_COST: u32 = 10;

pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher with the given work factor (floor 10)
    pub fn new(cost: u32) -> Result<Self, ConfigError> {
        if cost < MIN_COST {
            return Err(ConfigError::InvalidValue(format!(
                "password hash cost must be at least {}",
                MIN_COST
            )));
        }
        Ok(Self { cost })
    }

    /// Hash a password after validating its length
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        validate_password_length(password)?;

        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
    }

    /// Verify a password against a stored hash
    ///
    /// The hash string carries its own parameters; comparison cost tracks
    /// the cost it was created with.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))
    }

    /// Hash of a throwaway password, computed with the configured cost.
    /// Verified against when a login names an unknown email so that the
    /// missing-account path costs as much as the wrong-password path.
    pub fn dummy_hash(&self) -> Result<String, AppError> {
        bcrypt::hash("dummy-password-for-timing", self.cost)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
    }
}

/// 8 to 60 unicode scalars inclusive
pub fn validate_password_length(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH).into());
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH).into());
    }
    Ok(())
}
