//! Naturalness API server.

use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use naturalness_api::{app, AppState, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "naturalness-api")]
#[command(about = "NDVI, water and naturalness index server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "NATURALNESS_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    listen: String,

    /// Log filter, e.g. "info" or "imagery=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long, env = "TOKIO_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Service configuration file
    #[arg(short, long, env = "NATURALNESS_CONFIG", default_value = "config/naturalness.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("Invalid log filter '{}'", args.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        info!("Configuring tokio runtime with {} worker threads", threads);
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let config = ServiceConfig::load(&args.config)?;
    info!(
        base_url = %config.imagery.base_url,
        cache_dir = %config.cache_dir.display(),
        max_pixels = config.imagery.max_pixels,
        "Starting naturalness API server"
    );

    let state = Arc::new(AppState::from_config(config, Some(prometheus_handle))?);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", args.listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
