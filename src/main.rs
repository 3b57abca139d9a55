use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use opswatch::server::{self, AppState};
use opswatch::{Settings, ThresholdProvider};
use opswatch_adapters::influx::InfluxClient;
use opswatch_adapters::RetryPolicy;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "opswatch")]
#[command(about = "Dashboard API for live metrics, LLM narratives and alert thresholds")]
struct Args {
    /// Settings file (TOML); missing is fine
    #[arg(short, long, default_value = "opswatch.toml")]
    config: PathBuf,

    /// Threshold file (INI), overrides `thresholds_path`
    #[arg(short, long)]
    thresholds: Option<PathBuf>,

    /// Listen address (host:port), overrides `listen_addr`
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("opswatch=info,opswatch_adapters=info")),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    if let Some(path) = args.thresholds {
        settings.thresholds_path = path;
    }
    if let Some(addr) = args.listen {
        settings.listen_addr = addr;
    }
    info!(
        config = %args.config.display(),
        influx = %settings.influx.url,
        bucket = %settings.influx.bucket,
        "Settings loaded"
    );

    let thresholds = match ThresholdProvider::load(&settings.thresholds_path) {
        Ok(provider) => provider,
        Err(e) => {
            warn!("{}; serving an empty threshold table", e);
            ThresholdProvider::empty()
        }
    };

    let client = InfluxClient::builder()
        .endpoint(settings.influx.url.as_str())
        .org(settings.influx.org.as_str())
        .token(settings.influx.token.as_str())
        .timeout(settings.influx.timeout)
        .retry(RetryPolicy {
            attempts: settings.influx.retry_attempts,
            backoff: settings.influx.retry_backoff,
        })
        .build()?;

    match client.health().await {
        Ok(true) => info!(endpoint = client.endpoint(), "InfluxDB is healthy"),
        Ok(false) => warn!(endpoint = client.endpoint(), "InfluxDB reports not ready"),
        Err(e) => error!(endpoint = client.endpoint(), "InfluxDB health check failed: {}", e),
    }

    let state = Arc::new(AppState::new(Arc::new(client), thresholds, &settings));

    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;
    info!(addr = %settings.listen_addr, "Listening");

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}
