use std::net::TcpListener;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use jwt_auth_server::configuration::get_configuration;
use jwt_auth_server::request_context::RequestContext;
use jwt_auth_server::startup::run;
use jwt_auth_server::store::{PgRefreshTokenStore, RefreshTokenStore};
use jwt_auth_server::telemetry::init_telemetry;

const EXPIRED_TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    // Housekeeping: the engine owns no scheduler, so the periodic sweep of
    // expired refresh-token records lives out here.
    let sweep_store = PgRefreshTokenStore::new(pool.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRED_TOKEN_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let ctx = RequestContext::new();
            match sweep_store.delete_expired(&ctx).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(deleted, "Expired refresh tokens deleted");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Expired refresh token sweep failed");
                }
            }
        }
    });

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, pool, configuration)?.await
}
