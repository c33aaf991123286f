/// Bearer authorization middleware
///
/// Validates the `Authorization` header on protected routes through the
/// auth engine and injects the authenticated identity into request
/// extensions for route handlers.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;

use crate::engine::AuthEngine;
use crate::middleware::CorrelationId;
use crate::request_context::RequestContext;

pub struct BearerAuth {
    engine: Arc<AuthEngine>,
}

impl BearerAuth {
    pub fn new(engine: Arc<AuthEngine>) -> Self {
        Self { engine }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
            engine: Arc::clone(&self.engine),
        }))
    }
}

pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
    engine: Arc<AuthEngine>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
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
        let engine = Arc::clone(&self.engine);
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let authorization = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|h| h.to_string());
            let user_agent = req
                .headers()
                .get("User-Agent")
                .and_then(|h| h.to_str().ok())
                .map(|h| h.to_string());
            let ip_address = req
                .connection_info()
                .realip_remote_addr()
                .map(|ip| ip.to_string());

            let ctx = match req.extensions().get::<CorrelationId>() {
                Some(correlation_id) => RequestContext::with_correlation_id(correlation_id.0),
                None => RequestContext::new(),
            };

            match engine
                .authorize(&ctx, authorization.as_deref(), user_agent, ip_address)
                .await
            {
                Ok(identity) => {
                    tracing::debug!(
                        account_id = %identity.account_id,
                        email = %identity.email,
                        "Bearer token validated"
                    );
                    req.extensions_mut().insert(identity);
                    service.call(req).await
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}
