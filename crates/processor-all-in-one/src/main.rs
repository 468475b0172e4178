mod config;

use anyhow::{Context, Result};
use processor_domain::{ContractValidator, JobPipeline, PipelineMetrics, ServiceIdentity};
use processor_nats::{
    create_pipeline_handler, JobConsumer, NatsClient, NatsCompletionPublisher,
    NatsDeadLetterPublisher,
};
use processor_postgres::{PostgresClient, PostgresJobRepository};
use prometheus::Registry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let config = match config::ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting job processor service");

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());

    if let Err(e) = run_service(token, config).await {
        error!(error = %e, "Service failed");
        std::process::exit(1);
    }
}

/// Cancel the token on SIGTERM/SIGINT so the consumer resolves its
/// in-flight delivery and stops fetching
fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(signal) => signal,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("Received SIGINT");
        }

        token.cancel();
    });
}

async fn run_service(token: CancellationToken, config: config::ServiceConfig) -> Result<()> {
    // Contracts are startup-fatal: the process must not begin consuming
    // without them
    let validator = ContractValidator::load(Path::new(&config.contracts_path))
        .context("Failed to load contract documents")?;

    let postgres = PostgresClient::new(&config.postgres)?;
    wait_for_store(&postgres, Duration::from_secs(config.startup_timeout_secs)).await?;

    let nats = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await?;
    nats.ensure_stream(&config.stream, vec![format!("{}.>", config.stream)])
        .await?;

    let identity = ServiceIdentity {
        service: "processor".to_string(),
        instance: hostname(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let registry = Registry::new();
    let metrics = Arc::new(PipelineMetrics::new(&registry).map_err(anyhow::Error::new)?);

    let pipeline = Arc::new(JobPipeline::new(
        validator,
        Arc::new(PostgresJobRepository::new(postgres)),
        Arc::new(NatsCompletionPublisher::new(
            nats.jetstream().clone(),
            config.outbound_subject.clone(),
        )),
        Arc::new(NatsDeadLetterPublisher::new(
            nats.jetstream().clone(),
            config.dead_letter_subject.clone(),
        )),
        metrics,
        identity,
        Duration::from_millis(config.work_delay_ms),
    ));

    let redelivery_delay = match config.redelivery_delay_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let consumer = JobConsumer::new(
        nats.jetstream(),
        &config.stream,
        &config.consumer_name,
        &config.inbound_subject,
        config.fetch_wait_secs,
        redelivery_delay,
        create_pipeline_handler(pipeline),
    )
    .await?;

    info!(
        stream = %config.stream,
        inbound = %config.inbound_subject,
        outbound = %config.outbound_subject,
        dead_letter = %config.dead_letter_subject,
        "Waiting for jobs"
    );

    consumer.run(token).await
}

/// Retry until the store answers a ping, then bootstrap the schema,
/// bounded by the startup timeout
async fn wait_for_store(postgres: &PostgresClient, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match postgres.ping().await {
            Ok(()) => break,
            Err(e) if tokio::time::Instant::now() < deadline => {
                warn!(error = %e, "Waiting for database");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(e) => {
                return Err(e.context("Database not reachable within startup timeout"));
            }
        }
    }

    postgres.ensure_schema().await
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "processor-0".to_string())
}
