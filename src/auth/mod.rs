/// Authentication primitives
///
/// JWT encode/decode/verify, password hashing, and the token hashing
/// helpers used to index refresh-token records.

mod claims;
mod codec;
mod password;

pub use claims::{AccessClaims, RefreshClaims};
pub use codec::{generate_secure_token, hash_token, JwtCodec};
pub use password::PasswordHasher;
