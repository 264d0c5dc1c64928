//! xyzb-enricher - ISBN-10 enrichment service
//!
//! Polls the catalog API, derives missing ISBN-10s from ISBN-13s, pushes the
//! corrected records back, and keeps a ledger of processed identifiers.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xyzb_enricher::{
    Args, CatalogApi, EnricherConfig, EnrichmentPipeline, HttpCatalogClient, Supervisor,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML is read before tracing starts so it can supply the log level
    let toml_config = xyzb_common::config::load_module_config(args.config.as_deref(), "enricher")
        .context("Failed to load config file")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting xyzb-enricher");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = EnricherConfig::resolve(&args, &toml_config)
        .context("Invalid configuration")?;

    let catalog: Arc<dyn CatalogApi> = Arc::new(
        HttpCatalogClient::new(config.catalog_client_config())
            .context("Failed to initialize catalog client")?,
    );
    let pipeline = EnrichmentPipeline::new(config.pipeline_config(), catalog);
    let supervisor = Supervisor::new(config.supervisor_config());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let report = supervisor
        .run(&pipeline, shutdown)
        .await
        .context("Enrichment supervisor stopped")?;

    if config.once {
        match &report.last_summary {
            Some(summary) => {
                let json = serde_json::to_string_pretty(summary)
                    .context("Failed to serialize run summary")?;
                println!("{}", json);
            }
            None => warn!("No run summary produced"),
        }
        if report.failed_runs > 0 {
            error!(failed_runs = report.failed_runs, "Enrichment run failed");
            anyhow::bail!("Enrichment run failed");
        }
    }

    info!(runs = report.runs, "Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing current run before shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing current run before shutdown");
        },
    }
}
