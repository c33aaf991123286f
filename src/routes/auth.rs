/// Authentication routes
///
/// Thin HTTP glue over the auth engine: sign-up, login, token refresh,
/// logout, and the current-identity endpoint.

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::domain::AccountResponse;
use crate::engine::{AuthEngine, AuthTokens, AuthenticatedAccount};
use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::request_context::RequestContext;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub account: AccountResponse,
}

impl From<AuthTokens> for AuthResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
            account: tokens.account,
        }
    }
}

#[derive(Serialize)]
pub struct MeResponse {
    pub account_id: String,
    pub email: String,
}

/// Request context carrying the correlation id assigned by the logging
/// middleware
fn request_ctx(req: &HttpRequest) -> RequestContext {
    match req.extensions().get::<CorrelationId>() {
        Some(correlation_id) => RequestContext::with_correlation_id(correlation_id.0),
        None => RequestContext::new(),
    }
}

fn client_meta(req: &HttpRequest) -> (Option<String>, Option<String>) {
    let user_agent = req
        .headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string());
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .map(|ip| ip.to_string());
    (user_agent, ip_address)
}

/// POST /auth/signup
pub async fn signup(
    req: HttpRequest,
    form: web::Json<SignupRequest>,
    engine: web::Data<AuthEngine>,
) -> Result<HttpResponse, AppError> {
    let ctx = request_ctx(&req);
    let tokens = engine
        .sign_up(&ctx, &form.email, &form.password, &form.name)
        .await?;

    Ok(HttpResponse::Created().json(AuthResponse::from(tokens)))
}

/// POST /auth/login
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    engine: web::Data<AuthEngine>,
) -> Result<HttpResponse, AppError> {
    let ctx = request_ctx(&req);
    let (user_agent, ip_address) = client_meta(&req);

    let tokens = engine
        .login(&ctx, &form.email, &form.password, user_agent, ip_address)
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token. A reuse of an already-rotated
/// token answers 401 with a body naming the security incident.
pub async fn refresh(
    req: HttpRequest,
    form: web::Json<RefreshRequest>,
    engine: web::Data<AuthEngine>,
) -> Result<HttpResponse, AppError> {
    let ctx = request_ctx(&req);
    let (user_agent, ip_address) = client_meta(&req);

    let tokens = engine
        .refresh(&ctx, &form.refresh_token, user_agent, ip_address)
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /auth/logout
///
/// Idempotent: revoking an unknown token still answers 204.
pub async fn logout(
    req: HttpRequest,
    form: web::Json<LogoutRequest>,
    engine: web::Data<AuthEngine>,
) -> Result<HttpResponse, AppError> {
    let ctx = request_ctx(&req);
    engine.logout(&ctx, &form.refresh_token).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me (protected)
///
/// Identity is injected by the bearer middleware.
pub async fn me(identity: web::ReqData<AuthenticatedAccount>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(MeResponse {
        account_id: identity.account_id.to_string(),
        email: identity.email.clone(),
    }))
}
