mod bearer_auth;
mod request_logging;

pub use bearer_auth::BearerAuth;
pub use request_logging::{CorrelationId, RequestLogging};
