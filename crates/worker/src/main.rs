use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use tripwire_events::{ChannelDispatcher, EmailDelivery};
use tripwire_pipeline::{
    AlertStore, CachedLookupResolver, DispatchRunner, EvaluationRunner, HttpMetricSource,
    IngestionRunner, LookupResolver, PgAlertStore, TickScheduler,
};
use tripwire_worker::config::WorkerConfig;
use tripwire_worker::{logging, stages};

/// How long a stage may take to finish its current cycle after shutdown.
const STAGE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single outbound webhook or chat request.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    // --- Tracing ---
    logging::init(config.log_format);
    tracing::info!(
        tenant_scope = %config.tenant_scope,
        ingestion_enabled = config.ingestion.stage.enabled,
        evaluation_enabled = config.evaluation.enabled,
        dispatch_enabled = config.dispatch.stage.enabled,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = tripwire_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    tripwire_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    tripwire_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let store: Arc<dyn AlertStore> = Arc::new(PgAlertStore::new(pool.clone()));
    let lookups: Arc<dyn LookupResolver> = Arc::new(CachedLookupResolver::new(pool));

    let source = HttpMetricSource::new(
        &config.ingestion.source_url,
        config.ingestion.source_timeout,
    )
    .context("Failed to build metric source client")?;

    let email = match config.email.clone() {
        Some(email_config) => {
            tracing::info!(smtp_host = %email_config.smtp_host, "Email channel enabled");
            Some(EmailDelivery::new(email_config).context("Invalid SMTP configuration")?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, email notifications will fail until configured");
            None
        }
    };
    let sender = ChannelDispatcher::new(DELIVERY_TIMEOUT, email)
        .context("Failed to build delivery client")?;

    let scope = config.tenant_scope;
    let ingestion = Arc::new(IngestionRunner::new(store.clone(), Arc::new(source), scope));
    let evaluation = Arc::new(EvaluationRunner::new(store.clone(), lookups.clone(), scope));
    let dispatch = Arc::new(DispatchRunner::new(
        store,
        lookups,
        Arc::new(sender),
        scope,
    ));

    // --- Stages ---
    let cancel = CancellationToken::new();

    let ingestion_handle = {
        let scheduler = TickScheduler::new(
            "ingestion",
            config.ingestion.stage.tick_interval,
            config.ingestion.stage.enabled,
        );
        let stage_config = config.ingestion.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            scheduler
                .run(cancel, |token| {
                    let runner = Arc::clone(&ingestion);
                    let stage_config = stage_config.clone();
                    async move { stages::ingestion_cycle(&runner, &stage_config, token).await }
                })
                .await
        })
    };

    let evaluation_handle = {
        let scheduler = TickScheduler::new(
            "evaluation",
            config.evaluation.tick_interval,
            config.evaluation.enabled,
        );
        let cancel = cancel.clone();
        tokio::spawn(async move {
            scheduler
                .run(cancel, |token| {
                    let runner = Arc::clone(&evaluation);
                    async move { stages::evaluation_cycle(&runner, token).await }
                })
                .await
        })
    };

    let dispatch_handle = {
        let scheduler = TickScheduler::new(
            "dispatch",
            config.dispatch.stage.tick_interval,
            config.dispatch.stage.enabled,
        );
        let stage_config = config.dispatch.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            scheduler
                .run(cancel, |token| {
                    let runner = Arc::clone(&dispatch);
                    let stage_config = stage_config.clone();
                    async move { stages::dispatch_cycle(&runner, &stage_config, token).await }
                })
                .await
        })
    };

    tracing::info!("Worker started");

    // --- Shutdown ---
    shutdown_signal().await;
    cancel.cancel();

    for (name, handle) in [
        ("ingestion", ingestion_handle),
        ("evaluation", evaluation_handle),
        ("dispatch", dispatch_handle),
    ] {
        match tokio::time::timeout(STAGE_SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(cycles)) => tracing::info!(stage = name, cycles, "Stage stopped"),
            Ok(Err(e)) => tracing::error!(stage = name, error = %e, "Stage task panicked"),
            Err(_) => tracing::warn!(stage = name, "Stage did not stop in time"),
        }
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// stops cleanly whether run interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
