/// Request logging middleware
///
/// Assigns every request a correlation id, exposes it through request
/// extensions, and logs start/completion with timing.

use std::rc::Rc;
use std::time::Instant;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

/// Correlation id attached to each request by [`RequestLogging`]
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggingMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started_at = Instant::now();
        let correlation_id = CorrelationId(Uuid::new_v4());
        let method = req.method().to_string();
        let path = req.path().to_string();

        req.extensions_mut().insert(correlation_id);

        tracing::info!(
            correlation_id = %correlation_id.0,
            method = %method,
            path = %path,
            "Request started"
        );

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let res = service.call(req).await?;

            tracing::info!(
                correlation_id = %correlation_id.0,
                method = %method,
                path = %path,
                status = res.status().as_u16(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Request completed"
            );

            Ok(res)
        })
    }
}
