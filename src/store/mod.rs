/// Durable storage seams consumed by the auth engine
///
/// Each seam is a trait so the engine can be exercised against in-memory
/// doubles; production wiring uses the PostgreSQL implementations.

mod account;
mod audit;
mod refresh_token;

pub use account::{AccountStore, PgAccountStore};
pub use audit::{AuditSink, PgAuditSink};
pub use refresh_token::{PgRefreshTokenStore, RefreshTokenStore};
