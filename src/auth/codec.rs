/// JWT encoding and verification
///
/// Tokens are signed with HMAC-SHA256 only, with distinct secrets for the
/// access and refresh families. Verification inspects the header before any
/// key material is consulted, so `none`-algorithm and algorithm-confusion
/// tokens are rejected up front with their own failure kinds.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::{JwtSettings, MIN_SECRET_LENGTH};
use crate::error::{AppError, ConfigError, TokenError};

/// Token issuer and verifier
pub struct JwtCodec {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    issuer: String,
    audience: Vec<String>,
}

impl JwtCodec {
    /// Build a codec from validated settings
    ///
    /// Refuses to proceed when either secret is shorter than 32 bytes or
    /// the two secrets are identical.
    pub fn new(settings: &JwtSettings) -> Result<Self, ConfigError> {
        if settings.access_token_secret.len() < MIN_SECRET_LENGTH
            || settings.refresh_token_secret.len() < MIN_SECRET_LENGTH
        {
            return Err(ConfigError::InvalidValue(format!(
                "token secrets must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if settings.access_token_secret == settings.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok(Self {
            access_encoding_key: EncodingKey::from_secret(settings.access_token_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(settings.access_token_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(
                settings.refresh_token_secret.as_bytes(),
            ),
            refresh_decoding_key: DecodingKey::from_secret(
                settings.refresh_token_secret.as_bytes(),
            ),
            access_token_expiry: settings.access_token_expiry,
            refresh_token_expiry: settings.refresh_token_expiry,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        })
    }

    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    /// Generate a new access token for an account
    pub fn issue_access_token(&self, account_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            account_id: account_id.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            aud: self.audience.clone(),
            exp: now + self.access_token_expiry,
            iat: now,
            nbf: now,
            jti: Uuid::new_v4().to_string(),
        };

        self.sign(&claims, &self.access_encoding_key)
    }

    /// Generate a new refresh token, returning the token string and the
    /// fresh `token_id` that keys its persisted record
    pub fn issue_refresh_token(&self, account_id: Uuid) -> Result<(String, Uuid), AppError> {
        let token_id = Uuid::new_v4();
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            token_id: token_id.to_string(),
            account_id: account_id.to_string(),
            iss: self.issuer.clone(),
            sub: account_id.to_string(),
            aud: self.audience.clone(),
            exp: now + self.refresh_token_expiry,
            iat: now,
            nbf: now,
            jti: token_id.to_string(),
        };

        let token = self.sign(&claims, &self.refresh_encoding_key)?;
        Ok((token, token_id))
    }

    fn sign<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
    }

    /// Validate an access token and extract its claims
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.verify(token, &self.access_decoding_key)?;

        require_uuid_claim("account_id", &claims.account_id)?;
        if claims.email.is_empty() {
            return Err(TokenError::MissingClaim("email"));
        }

        Ok(claims)
    }

    /// Validate a refresh token and extract its claims
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.verify(token, &self.refresh_decoding_key)?;

        require_uuid_claim("token_id", &claims.token_id)?;
        require_uuid_claim("account_id", &claims.account_id)?;

        Ok(claims)
    }

    /// Shared verification pipeline
    ///
    /// Order matters: structure, then algorithm (before the secret is
    /// touched), then signature, then temporal and issuer/audience claims.
    fn verify<T: DeserializeOwned + RegisteredClaims>(
        &self,
        token: &str,
        key: &DecodingKey,
    ) -> Result<T, TokenError> {
        check_structure(token)?;
        check_algorithm(token)?;

        // Signature and payload decoding. Temporal validation is done by
        // hand below with strict boundaries and zero leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        let claims = decode::<T>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                    TokenError::WrongAlgorithm("unknown".to_string())
                }
                _ => TokenError::Malformed,
            })?;

        let now = Utc::now().timestamp();
        if claims.exp() <= now {
            return Err(TokenError::Expired);
        }
        if claims.nbf() > now {
            return Err(TokenError::NotYetValid);
        }
        if claims.iss() != self.issuer {
            return Err(TokenError::IssuerMismatch);
        }
        if !audience_exact_match(claims.aud(), &self.audience) {
            return Err(TokenError::AudienceMismatch);
        }

        Ok(claims)
    }
}

/// Registered-claim accessors shared by both claim sets
trait RegisteredClaims {
    fn exp(&self) -> i64;
    fn nbf(&self) -> i64;
    fn iss(&self) -> &str;
    fn aud(&self) -> &[String];
}

impl RegisteredClaims for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn nbf(&self) -> i64 {
        self.nbf
    }
    fn iss(&self) -> &str {
        &self.iss
    }
    fn aud(&self) -> &[String] {
        &self.aud
    }
}

impl RegisteredClaims for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn nbf(&self) -> i64 {
        self.nbf
    }
    fn iss(&self) -> &str {
        &self.iss
    }
    fn aud(&self) -> &[String] {
        &self.aud
    }
}

/// Custom claims must be present, non-empty, and parse as UUIDs
fn require_uuid_claim(name: &'static str, value: &str) -> Result<Uuid, TokenError> {
    if value.is_empty() {
        return Err(TokenError::MissingClaim(name));
    }
    Uuid::parse_str(value).map_err(|_| TokenError::BadClaimFormat(name))
}

/// The compact serialization must split into exactly three non-empty parts;
/// an empty third part is a stripped signature.
fn check_structure(token: &str) -> Result<(), TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(TokenError::Malformed);
    }
    Ok(())
}

/// Inspect the header's `alg` before any key material is consulted.
/// Only the exact string `HS256` is accepted.
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let header_part = token.split('.').next().unwrap_or_default();
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_part)
        .map_err(|_| TokenError::Malformed)?;
    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;

    match header.get("alg").and_then(|alg| alg.as_str()) {
        None | Some("") => Err(TokenError::NoneAlgorithm),
        Some(alg) if alg.eq_ignore_ascii_case("none") => Err(TokenError::NoneAlgorithm),
        Some("HS256") => Ok(()),
        Some(alg) => Err(TokenError::WrongAlgorithm(alg.to_string())),
    }
}

/// Exact multiset comparison of the token audience against the configured
/// audience. Stricter than the RFC 7519 any-overlap rule to prevent
/// cross-service token confusion.
fn audience_exact_match(token_aud: &[String], config_aud: &[String]) -> bool {
    if token_aud.len() != config_aud.len() {
        return false;
    }

    let mut sorted_token = token_aud.to_vec();
    let mut sorted_config = config_aud.to_vec();
    sorted_token.sort();
    sorted_config.sort();

    sorted_token == sorted_config
}

/// SHA-256 hex of the token bytes
///
/// Refresh-token records are indexed by this hash so the plaintext never
/// reaches the database. No salt: the input is already high-entropy.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 32 random bytes from the OS CSPRNG, hex-encoded
///
/// Reserved for password-reset and email-confirmation style features; not
/// on any current hot path.
pub fn generate_secure_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("secure token generation failed: {}", e)))?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}
