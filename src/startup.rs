use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;

use crate::auth::{JwtCodec, PasswordHasher};
use crate::configuration::Settings;
use crate::engine::AuthEngine;
use crate::middleware::{BearerAuth, RequestLogging};
use crate::routes::{health_check, login, logout, me, refresh, signup};
use crate::store::{PgAccountStore, PgAuditSink, PgRefreshTokenStore};

/// Wire the engine and start the HTTP server
pub fn run(
    listener: TcpListener,
    pool: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    settings
        .validate()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let codec = JwtCodec::new(&settings.jwt)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let passwords = PasswordHasher::new(settings.password.hash_cost)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let engine = AuthEngine::new(
        codec,
        passwords,
        Arc::new(PgAccountStore::new(pool.clone())),
        Arc::new(PgRefreshTokenStore::new(pool.clone())),
        Some(Arc::new(PgAuditSink::new(pool))),
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let engine = Arc::new(engine);
    let engine_data = web::Data::from(Arc::clone(&engine));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogging)
            .app_data(engine_data.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .service(
                        web::scope("")
                            .wrap(BearerAuth::new(Arc::clone(&engine)))
                            .route("/me", web::get().to(me)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
