/// Unified error handling
///
/// Domain-specific error types that converge into a single `AppError` for
/// control flow, plus the HTTP response mapping used by the transport layer.
/// Token-validation sub-kinds stay distinguishable internally (they drive
/// the security audit branch) and collapse to coarse categories at the
/// public boundary.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Token verification failure kinds
///
/// Every rejection path of the codec carries one of these so the engine can
/// decide which failures warrant a SUSPICIOUS_LOGIN audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Expired,
    NotYetValid,
    SignatureInvalid,
    NoneAlgorithm,
    WrongAlgorithm(String),
    IssuerMismatch,
    AudienceMismatch,
    MissingClaim(&'static str),
    BadClaimFormat(&'static str),
}

impl TokenError {
    /// Kinds that indicate deliberate tampering rather than ordinary decay.
    /// These trigger the audit branch on the refresh path.
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            TokenError::NoneAlgorithm
                | TokenError::SignatureInvalid
                | TokenError::WrongAlgorithm(_)
        )
    }

    /// Audit-log description for suspicious kinds
    pub fn suspicious_description(&self) -> String {
        match self {
            TokenError::NoneAlgorithm => {
                "Attempted to use JWT with 'none' algorithm (signature bypass attempt)".to_string()
            }
            TokenError::SignatureInvalid => {
                "JWT signature verification failed (possible token tampering)".to_string()
            }
            TokenError::WrongAlgorithm(alg) => {
                format!("Invalid JWT signing algorithm attempted: {}", alg)
            }
            TokenError::Malformed => "Malformed JWT token (possible attack attempt)".to_string(),
            other => format!("Token validation failed: {}", other),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::NotYetValid => write!(f, "token is not valid yet"),
            TokenError::SignatureInvalid => write!(f, "token signature verification failed"),
            TokenError::NoneAlgorithm => write!(f, "none algorithm is not allowed"),
            TokenError::WrongAlgorithm(alg) => {
                write!(f, "invalid signing algorithm: {} (expected HS256)", alg)
            }
            TokenError::IssuerMismatch => write!(f, "token issuer mismatch"),
            TokenError::AudienceMismatch => write!(f, "token audience mismatch"),
            TokenError::MissingClaim(claim) => write!(f, "missing {} claim", claim),
            TokenError::BadClaimFormat(claim) => write!(f, "{} claim has invalid format", claim),
        }
    }
}

impl StdError for TokenError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    /// Codec-level rejection carrying its sub-kind
    Token(TokenError),
    /// Store-level rejection: record absent, expired, or revoked, or the
    /// referenced account vanished. No sub-kind is exposed.
    InvalidToken,
    Database(DatabaseError),
    Config(ConfigError),
    InvalidCredentials,
    EmailTaken,
    TokenCompromised,
    AccountNotFound,
    Cancelled,
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::InvalidToken => write!(f, "invalid or expired token"),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::InvalidCredentials => write!(f, "invalid email or password"),
            AppError::EmailTaken => write!(f, "email already registered"),
            AppError::TokenCompromised => write!(
                f,
                "token may be compromised - all tokens have been revoked for security"
            ),
            AppError::AccountNotFound => write!(f, "account not found"),
            AppError::Cancelled => write!(f, "request cancelled or deadline exceeded"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Database(DatabaseError::UniqueConstraintViolation(
                    db_err.constraint().unwrap_or("unique constraint").to_string(),
                ))
            }
            _ => AppError::Database(DatabaseError::QueryExecution(err.to_string())),
        }
    }
}

/// Error response body for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Coarse user-visible message for a token failure
    ///
    /// Differentiates expired vs. malformed vs. signature vs. generic only;
    /// cryptographic internals never reach the client.
    fn token_failure_message(err: &TokenError) -> &'static str {
        match err {
            TokenError::Expired => "token has expired",
            TokenError::Malformed => "invalid token: malformed token",
            TokenError::SignatureInvalid => "invalid token: signature verification failed",
            TokenError::NoneAlgorithm => "invalid token: signature required",
            _ => "invalid or expired token",
        }
    }

    fn response_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Token(e) => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                Self::token_failure_message(e).to_string(),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "invalid or expired token".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid email or password".to_string(),
            ),
            AppError::EmailTaken => (
                StatusCode::CONFLICT,
                "EMAIL_TAKEN",
                "email already registered".to_string(),
            ),
            // Named explicitly so clients can distinguish rotation reuse
            // from ordinary expiry.
            AppError::TokenCompromised => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_COMPROMISED",
                "refresh token reuse detected - all tokens for this account have been revoked"
                    .to_string(),
            ),
            AppError::AccountNotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "account not found".to_string(),
            ),
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => (
                StatusCode::CONFLICT,
                "DUPLICATE_ENTRY",
                "duplicate entry".to_string(),
            ),
            AppError::Database(DatabaseError::ConnectionPool(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "database service temporarily unavailable".to_string(),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "database error occurred".to_string(),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "server configuration error".to_string(),
            ),
            AppError::Cancelled | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error".to_string(),
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id, error = %e, "Validation error");
            }
            AppError::Token(e) => {
                tracing::warn!(error_id, error = %e, "Token validation failed");
            }
            AppError::InvalidToken => {
                tracing::warn!(error_id, "Token rejected");
            }
            AppError::InvalidCredentials => {
                tracing::warn!(error_id, "Invalid credentials attempt");
            }
            AppError::EmailTaken => {
                tracing::warn!(error_id, "Duplicate registration attempt");
            }
            AppError::TokenCompromised => {
                tracing::warn!(error_id, "Refresh token reuse detected");
            }
            AppError::AccountNotFound => {
                tracing::warn!(error_id, "Account not found");
            }
            AppError::Database(e) => {
                tracing::error!(error_id, error = %e, "Database error");
            }
            AppError::Config(e) => {
                tracing::error!(error_id, error = %e, "Configuration error");
            }
            AppError::Cancelled => {
                tracing::warn!(error_id, "Request cancelled");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let (status, code, message) = self.response_parts();
        HttpResponse::build(status).json(ErrorResponse::new(
            error_id,
            message,
            code.to_string(),
            status.as_u16(),
        ))
    }

    fn status_code(&self) -> StatusCode {
        self.response_parts().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspicious_kinds() {
        assert!(TokenError::NoneAlgorithm.is_suspicious());
        assert!(TokenError::SignatureInvalid.is_suspicious());
        assert!(TokenError::WrongAlgorithm("RS256".to_string()).is_suspicious());
        assert!(!TokenError::Expired.is_suspicious());
        assert!(!TokenError::Malformed.is_suspicious());
        assert!(!TokenError::AudienceMismatch.is_suspicious());
    }

    #[test]
    fn test_http_mapping() {
        assert_eq!(
            AppError::Validation(ValidationError::TooShort("password", 8)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::EmailTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenCompromised.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Token(TokenError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_messages_stay_coarse() {
        let (_, _, message) =
            AppError::Token(TokenError::WrongAlgorithm("ES256".to_string())).response_parts();
        assert_eq!(message, "invalid or expired token");

        let (_, _, message) = AppError::Token(TokenError::Expired).response_parts();
        assert_eq!(message, "token has expired");
    }

    #[test]
    fn test_compromised_response_names_the_incident() {
        let (status, code, message) = AppError::TokenCompromised.response_parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "TOKEN_COMPROMISED");
        assert!(message.contains("revoked"));
    }
}
