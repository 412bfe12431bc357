use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::pipelines::OutputLimits;
use crate::storage::backends::BackendConfigs;

static CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

/// The runtime config, this is only valid after `init` or `init_test`.
pub fn config() -> &'static RuntimeConfig {
    CONFIG.get().expect("config not initialised")
}

#[cfg(test)]
/// Loads a config from a raw YAML string.
///
/// Tests share one process, so only the first call wins.
pub fn init_test(data: &str) -> anyhow::Result<()> {
    let cfg: RuntimeConfig = serde_yaml::from_str(data)?;
    let _ = CONFIG.set(cfg);
    Ok(())
}

pub async fn init(config_file: &Path) -> anyhow::Result<()> {
    let file = tokio::fs::read(config_file).await?;

    let cfg: RuntimeConfig = if config_file
        .extension()
        .map(|ext| ext == "json")
        .unwrap_or(false)
    {
        serde_json::from_slice(&file)?
    } else {
        serde_yaml::from_slice(&file)?
    };

    cfg.validate()?;

    let _ = CONFIG.set(cfg);

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    /// The set storage backend configuration.
    pub backend: BackendConfigs,

    #[serde(default = "default_upload_size")]
    /// The maximum size of a request body in bytes.
    ///
    /// Bulk requests carry every file in one body.
    /// Defaults to 50 MiB.
    pub max_upload_size: usize,

    #[serde(default)]
    /// The maximum amount of artifacts being generated at any one time
    /// across every request.
    ///
    /// Unbounded when not set.
    pub max_concurrency: Option<usize>,

    #[serde(default = "default_quality")]
    /// The encoder quality used when a tool does not take one
    /// from the request, from 1 to 100 inclusive.
    ///
    /// Defaults to `80`.
    pub default_quality: u8,

    #[serde(default)]
    /// Adds a random UUID segment to every storage key after the timestamp.
    ///
    /// Defaults to `false`, which keeps keys in the
    /// `<prefix>-<timestamp>[-<name>][-<size>].<ext>` form.
    pub unique_keys: bool,

    #[serde(default = "default_max_output_dimension")]
    /// The longest side, in pixels, an uploaded or generated image may have.
    ///
    /// Defaults to `16384`.
    pub max_output_dimension: u32,

    #[serde(default = "default_max_output_pixels")]
    /// The largest pixel count an uploaded or generated image may have.
    ///
    /// Defaults to `50000000`.
    pub max_output_pixels: u64,
}

impl RuntimeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=100).contains(&self.default_quality) {
            return Err(anyhow::anyhow!(
                "default_quality must be between 1 and 100, got {}",
                self.default_quality,
            ));
        }

        if self.max_concurrency == Some(0) {
            return Err(anyhow::anyhow!("max_concurrency must be greater than 0 when set"));
        }

        if self.max_output_dimension == 0 || self.max_output_pixels == 0 {
            return Err(anyhow::anyhow!("output limits must be greater than 0"));
        }

        Ok(())
    }
}

const fn default_upload_size() -> usize {
    50 * 1024 * 1024
}

fn default_max_output_dimension() -> u32 {
    OutputLimits::default().max_dimension
}

fn default_max_output_pixels() -> u64 {
    OutputLimits::default().max_pixels
}

const fn default_quality() -> u8 {
    80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_applied() {
        let cfg: RuntimeConfig = serde_yaml::from_str(
            "backend:\n  filesystem:\n    directory: /tmp/imgtools\n",
        )
        .unwrap();

        assert_eq!(cfg.default_quality, 80);
        assert_eq!(cfg.max_upload_size, 50 * 1024 * 1024);
        assert!(cfg.max_concurrency.is_none());
        assert!(!cfg.unique_keys);
        assert_eq!(cfg.max_output_dimension, 16_384);
        assert_eq!(cfg.max_output_pixels, 50_000_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_quality_is_rejected() {
        let cfg: RuntimeConfig = serde_yaml::from_str(
            "backend:\n  filesystem:\n    directory: /tmp/imgtools\ndefault_quality: 0\n",
        )
        .unwrap();

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_blob_storage_backend_parses() {
        let cfg: RuntimeConfig = serde_yaml::from_str(
            r#"
backend:
  blobstorage:
    name: images
    region: auto
    endpoint: https://account.r2.cloudflarestorage.com
    access_key: key
    secret_key: secret
max_concurrency: 8
"#,
        )
        .unwrap();

        assert!(matches!(cfg.backend, BackendConfigs::BlobStorage { .. }));
        assert_eq!(cfg.max_concurrency, Some(8));
    }
}
