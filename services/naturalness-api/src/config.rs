//! Service configuration loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use imagery::ImageryConfig;
use naturalness_common::time::DEFAULT_LOOKBACK_DAYS;

/// Service configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub imagery: ImageryConfig,

    /// Root of the provider response cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Days before `end_date` used when a request omits `start_date`.
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_lookback_days() -> i64 {
    DEFAULT_LOOKBACK_DAYS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            imagery: ImageryConfig::default(),
            cache_dir: default_cache_dir(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

impl ServiceConfig {
    /// Load from a YAML file, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read: {:?}", path))?;
            serde_yaml::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse: {:?}", path))?
        } else {
            tracing::warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override secrets and deployment paths from the environment.
    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = var("SENTINELHUB_ACCESS_TOKEN").filter(|t| !t.is_empty()) {
            self.imagery.access_token = Some(token);
        }
        if let Some(url) = var("SENTINELHUB_BASE_URL").filter(|u| !u.is_empty()) {
            self.imagery.base_url = url;
        }
        if let Some(dir) = var("NATURALNESS_CACHE_DIR").filter(|d| !d.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.imagery
            .validate()
            .context("Invalid imagery configuration")?;
        if self.default_lookback_days <= 0 {
            anyhow::bail!("default_lookback_days must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
imagery:
  base_url: https://creodias.sentinel-hub.com
  eval_duration:
    low_ms: 1000
    high_ms: 1500
  catalog_lookup: true
cache_dir: /var/cache/naturalness
default_lookback_days: 7
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.imagery.base_url, "https://creodias.sentinel-hub.com");
        assert_eq!(config.imagery.eval_duration.high_ms, 1500);
        assert!(config.imagery.catalog_lookup);
        assert_eq!(config.imagery.max_pixels, 2500);
        assert_eq!(config.default_lookback_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SENTINELHUB_ACCESS_TOKEN", "secret"),
            ("NATURALNESS_CACHE_DIR", "/tmp/pu-cache"),
            ("SENTINELHUB_BASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.imagery.access_token.as_deref(), Some("secret"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/pu-cache"));
        assert_eq!(config.imagery.base_url, "https://services.sentinel-hub.com");
    }

    #[test]
    fn test_wrong_order_duration_rejected() {
        let yaml = "imagery:\n  eval_duration:\n    low_ms: 1300\n    high_ms: 1100\n";
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.default_lookback_days, 365);
    }
}
