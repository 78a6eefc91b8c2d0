//! Configuration for the imagery provider and cost model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use naturalness_common::{Index, NaturalnessError, NaturalnessResult};

/// Evaluation script source per index.
pub type Evalscripts = HashMap<Index, Arc<str>>;

/// Configuration for talking to the upstream imagery provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageryConfig {
    /// Base URL of the provider's main deployment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Pre-issued bearer token. Obtaining it is outside this service.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Data collection requested from the provider.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Directory holding `{evalscript_id}.js` files.
    #[serde(default = "default_evalscript_dir")]
    pub evalscript_dir: PathBuf,

    /// Largest accepted width or height in pixels.
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u32,

    /// Resolution in meters per pixel used when a request gives none.
    #[serde(default = "default_resolution")]
    pub default_resolution: f64,

    /// Assumed evaluation-script run time used for the estimate bounds.
    #[serde(default)]
    pub eval_duration: EvalDurationRange,

    /// Upper bound on acquisitions per day, used when the catalog count is unavailable.
    #[serde(default = "default_max_revisit_rate")]
    pub max_revisit_rate: f64,

    /// Count real acquisitions via the catalog API before estimating.
    #[serde(default)]
    pub catalog_lookup: bool,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://services.sentinel-hub.com".to_string()
}

fn default_collection() -> String {
    "sentinel-2-l2a".to_string()
}

fn default_evalscript_dir() -> PathBuf {
    PathBuf::from("config/evalscripts")
}

fn default_max_pixels() -> u32 {
    2500
}

fn default_resolution() -> f64 {
    10.0
}

fn default_max_revisit_rate() -> f64 {
    1.0 / 5.0
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            collection: default_collection(),
            evalscript_dir: default_evalscript_dir(),
            max_pixels: default_max_pixels(),
            default_resolution: default_resolution(),
            eval_duration: EvalDurationRange::default(),
            max_revisit_rate: default_max_revisit_rate(),
            catalog_lookup: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ImageryConfig {
    /// Reject settings the cost model cannot work with.
    pub fn validate(&self) -> NaturalnessResult<()> {
        self.eval_duration.validate()?;
        if self.max_pixels == 0 {
            return Err(NaturalnessError::configuration("max_pixels must be positive"));
        }
        if !(self.default_resolution > 0.0) {
            return Err(NaturalnessError::configuration(
                "default_resolution must be positive",
            ));
        }
        if !(self.max_revisit_rate > 0.0) {
            return Err(NaturalnessError::configuration(
                "max_revisit_rate must be positive",
            ));
        }
        Ok(())
    }
}

/// Lower and upper bound of the evaluation-script duration, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalDurationRange {
    pub low_ms: u32,
    pub high_ms: u32,
}

impl Default for EvalDurationRange {
    fn default() -> Self {
        Self {
            low_ms: 1100,
            high_ms: 1300,
        }
    }
}

impl EvalDurationRange {
    pub fn new(low_ms: u32, high_ms: u32) -> NaturalnessResult<Self> {
        let range = Self { low_ms, high_ms };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> NaturalnessResult<()> {
        if self.low_ms > self.high_ms {
            return Err(NaturalnessError::configuration(format!(
                "Evaluation script duration range is in the wrong order ({} > {}), provide the lower bound first",
                self.low_ms, self.high_ms
            )));
        }
        Ok(())
    }
}

/// Read the evaluation script of every catalog index from `dir`.
pub fn load_evalscripts(dir: &Path) -> NaturalnessResult<Evalscripts> {
    let mut scripts = HashMap::new();

    for index in Index::ALL {
        let path = dir.join(format!("{}.js", index.spec().evalscript_id));
        let source = std::fs::read_to_string(&path).map_err(|e| {
            NaturalnessError::configuration(format!(
                "Failed to read evaluation script {}: {}",
                path.display(),
                e
            ))
        })?;
        scripts.insert(index, Arc::from(source));
    }

    tracing::info!(count = scripts.len(), dir = %dir.display(), "Loaded evaluation scripts");
    Ok(scripts)
}
