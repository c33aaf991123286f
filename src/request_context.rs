/// Request-scoped context
///
/// Explicit carrier for the correlation id, an optional deadline, and a
/// cancellation flag, threaded through every store and audit call. Stores
/// call [`RequestContext::check`] at their entry points; once the deadline
/// has passed or cancellation was requested, the I/O call fails before
/// touching the database. Partial rotation state left behind by a
/// cancellation is observationally equivalent to a lost refresh token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: Uuid,
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

/// Handle for signalling cancellation of an in-flight request
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Fails once the deadline has passed or cancellation was requested
    pub fn check(&self) -> Result<(), AppError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(AppError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(AppError::Cancelled);
            }
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_passes() {
        assert!(RequestContext::new().check().is_ok());
    }

    #[test]
    fn test_cancel_propagates() {
        let ctx = RequestContext::new();
        let handle = ctx.cancel_handle();
        assert!(ctx.check().is_ok());
        handle.cancel();
        assert!(matches!(ctx.check(), Err(AppError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline_fails() {
        let ctx = RequestContext::new().with_deadline(Duration::from_secs(0));
        assert!(matches!(ctx.check(), Err(AppError::Cancelled)));
    }

    #[test]
    fn test_correlation_id_is_stable_across_clones() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.correlation_id(), ctx.clone().correlation_id());
    }
}
