/// `load_config` module: Loads the optional YAML configuration for `publish-docs`.
///
/// Bucket names and the local storage root are process-wide configuration.
/// They are read here once and threaded explicitly into the publish request;
/// nothing in the core reads the environment.
///
/// # Accepted YAML
///
/// ```yaml
/// publish:
///   source_bucket: clusterhq-dev-docs
///   bucket: clusterhq-staging-docs
///   copy_scope: stale_keys      # or all_source_keys
/// storage:
///   root: ./buckets
/// ```
///
/// Every key is optional. `DOCS_RELEASE_STORAGE_ROOT` overrides `storage.root`.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use docs_release_core::publish::{CopyScope, DEFAULT_DESTINATION_BUCKET, DEFAULT_SOURCE_BUCKET};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const STORAGE_ROOT_ENV: &str = "DOCS_RELEASE_STORAGE_ROOT";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub source_bucket: String,
    pub bucket: String,
    pub copy_scope: CopyScope,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            source_bucket: DEFAULT_SOURCE_BUCKET.to_string(),
            bucket: DEFAULT_DESTINATION_BUCKET.to_string(),
            copy_scope: CopyScope::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub root: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./buckets"),
        }
    }
}

impl CliConfig {
    /// Defaults with environment overrides applied; used when no file is given.
    pub fn from_env() -> Self {
        let mut config = CliConfig::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(STORAGE_ROOT_ENV) {
            info!(root = %root, "Storage root overridden from environment");
            self.storage.root = PathBuf::from(root);
        }
    }
}

/// Loads a YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a document with no keys, not an error.
    let mut config: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    config.apply_env_overrides();

    info!(
        source_bucket = %config.publish.source_bucket,
        bucket = %config.publish.bucket,
        storage_root = %config.storage.root.display(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}
