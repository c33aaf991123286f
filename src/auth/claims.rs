/// JWT claim sets (RFC 7519)
///
/// Identifiers travel as strings inside the payload and are parsed back to
/// UUIDs at the codec boundary.

use serde::{Deserialize, Deserializer, Serialize};

/// Claims carried by access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account id (UUID string, duplicated in `sub`)
    pub account_id: String,
    pub email: String,
    pub iss: String,
    pub sub: String,
    #[serde(deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Fresh UUID per issuance
    pub jti: String,
}

/// Claims carried by refresh tokens
///
/// `token_id` doubles as the primary key of the persisted record and as
/// `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub token_id: String,
    pub account_id: String,
    pub iss: String,
    pub sub: String,
    #[serde(deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
}

/// RFC 7519 allows `aud` to be a single string or an array of strings
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Audience::deserialize(deserializer)? {
        Audience::One(aud) => vec![aud],
        Audience::Many(auds) => auds,
    })
}
