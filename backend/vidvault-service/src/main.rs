/// Vidvault Service - HTTP Server
///
/// Upload authorization, transcode callbacks, access control and the
/// streaming gateway. Job polling runs separately in `transcode-poller`.
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use crypto_core::JwtValidator;
use sqlx::postgres::PgPoolOptions;
use tracing_actix_web::TracingLogger;
use vidvault_service::handlers::{self, AppState};
use vidvault_service::logging;
use vidvault_service::middleware::MetricsMiddleware;
use vidvault_service::services::transcode::HttpJobClient;
use vidvault_service::services::S3ObjectStore;
use vidvault_service::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(config.app.is_production());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(address = %bind_address, env = %config.app.env, "starting vidvault-service");

    let validator = Arc::new(
        JwtValidator::from_rsa_pem(&config.auth.jwt_public_key_pem)
            .context("invalid JWT_PUBLIC_KEY_PEM")?,
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let jobs = Arc::new(
        HttpJobClient::new(&config.transcode).context("failed to build job API client")?,
    );
    let store = Arc::new(S3ObjectStore::new());

    if config.transcode.webhook_token.is_none() {
        tracing::warn!("TRANSCODE_WEBHOOK_TOKEN not set; job callbacks will be rejected");
    }

    let state = web::Data::new(
        AppState::new(pool, config, store, jobs).context("failed to build application state")?,
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .configure(|cfg| handlers::configure(cfg, validator.clone()))
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"))?
    .run()
    .await?;

    tracing::info!("vidvault-service shut down");
    Ok(())
}
