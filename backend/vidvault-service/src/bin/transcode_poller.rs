/// Transcode poller
///
/// Reconciles PROCESSING videos against the job API for deployments where
/// webhooks are unavailable or unreliable, and fails uploads that were
/// never completed.
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::time::{interval, MissedTickBehavior};
use vidvault_service::logging;
use vidvault_service::services::transcode::{HttpJobClient, TranscodeOrchestrator};
use vidvault_service::services::CredentialVault;
use vidvault_service::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(config.app.is_production());

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections.min(4))
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let vault = Arc::new(
        CredentialVault::from_config(&config.vault).context("invalid vault configuration")?,
    );
    let jobs = Arc::new(
        HttpJobClient::new(&config.transcode).context("failed to build job API client")?,
    );
    let orchestrator = TranscodeOrchestrator::new(
        pool,
        vault,
        jobs,
        config.transcode.manifest_file_name.clone(),
    );

    let batch_size = config.transcode.poll_batch_size;
    let stale_ttl = config.transcode.stale_pending_ttl;
    let mut ticker = interval(config.transcode.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = config.transcode.poll_interval.as_secs(),
        batch_size,
        "transcode poller started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match orchestrator.poll_once(batch_size).await {
                    Ok(summary) if summary.checked > 0 => {
                        tracing::info!(
                            checked = summary.checked,
                            completed = summary.completed,
                            failed = summary.failed,
                            still_running = summary.still_running,
                            errors = summary.errors,
                            "poll cycle finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "poll cycle failed"),
                }

                match orchestrator.reap_stale(stale_ttl).await {
                    Ok(0) => {}
                    Ok(reaped) => tracing::info!(reaped, "failed stale uploads"),
                    Err(e) => tracing::error!(error = %e, "stale upload sweep failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
