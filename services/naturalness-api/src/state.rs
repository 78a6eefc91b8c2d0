//! Application state for the naturalness API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use imagery::{ImageryProvider, SentinelHubProvider};
use storage::ObjectStoreCache;

use crate::config::ServiceConfig;

/// Shared application state.
pub struct AppState {
    /// Source of index rasters.
    pub provider: Arc<dyn ImageryProvider>,

    pub config: ServiceConfig,

    /// Prometheus exporter handle, absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ImageryProvider>, config: ServiceConfig) -> Self {
        Self {
            provider,
            config,
            metrics: None,
        }
    }

    /// Wire the production provider from configuration.
    pub fn from_config(config: ServiceConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let cache = ObjectStoreCache::local(&config.cache_dir)
            .with_context(|| format!("Failed to open cache at {:?}", config.cache_dir))?;

        let provider = SentinelHubProvider::from_config(config.imagery.clone(), Arc::new(cache))
            .context("Failed to initialize imagery provider")?;

        if config.imagery.access_token.is_none() {
            tracing::warn!("No SENTINELHUB_ACCESS_TOKEN configured, upstream requests will be rejected");
        }

        Ok(Self {
            provider: Arc::new(provider),
            config,
            metrics,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
