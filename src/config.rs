//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILOCR_CONFIG` (environment variable)
//! 2. `~/.config/mailocr/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailocr\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! A few deployment values can then be overridden individually through
//! environment variables (see [`Config::apply_env_overrides`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MAILOCR_CONFIG";
/// Overrides `storage.content_bucket`.
pub const CONTENT_BUCKET_ENV: &str = "MAILOCR_CONTENT_BUCKET";
/// Overrides `ocr.notification_channel`.
pub const NOTIFICATION_CHANNEL_ENV: &str = "MAILOCR_NOTIFICATION_CHANNEL";
/// Overrides `ocr.authorization_role`.
pub const AUTHORIZATION_ROLE_ENV: &str = "MAILOCR_AUTHORIZATION_ROLE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Object store settings.
    pub storage: StorageConfig,
    /// OCR service settings.
    pub ocr: OcrConfig,
    /// Result aggregation limits.
    pub aggregate: AggregateConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the file-backed store (one subdirectory per bucket).
    pub root: PathBuf,
    /// Bucket that receives extracted attachments.
    pub content_bucket: String,
    /// Prefix prepended to every attachment key (e.g. `"incoming/"`).
    pub key_prefix: String,
}

/// OCR service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Spool directory of the file-backed OCR service.
    pub spool_dir: PathBuf,
    /// Channel the service publishes completion messages to.
    pub notification_channel: String,
    /// Role the service assumes to read sources and publish notifications.
    pub authorization_role: String,
}

/// Safety limits for draining a job's result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Maximum number of pages per job.
    pub max_pages: usize,
    /// Maximum total serialized size of one job's pages, in bytes.
    pub max_bytes: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            content_bucket: "content".to_string(),
            key_prefix: String::new(),
        }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            max_pages: 10_000,
            max_bytes: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl OcrConfig {
    /// The spool directory, defaulting to `<storage root>/.ocr-spool`.
    pub fn spool_dir_or(&self, storage_root: &Path) -> PathBuf {
        if self.spool_dir.as_os_str().is_empty() {
            storage_root.join(".ocr-spool")
        } else {
            self.spool_dir.clone()
        }
    }
}

impl Config {
    /// Apply the `MAILOCR_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup(CONTENT_BUCKET_ENV) {
            self.storage.content_bucket = bucket;
        }
        if let Some(channel) = lookup(NOTIFICATION_CHANNEL_ENV) {
            self.ocr.notification_channel = channel;
        }
        if let Some(role) = lookup(AUTHORIZATION_ROLE_ENV) {
            self.ocr.authorization_role = role;
        }
    }

    /// Check the values the submit stage cannot run without.
    pub fn validate_for_submit(&self) -> Result<()> {
        if self.ocr.notification_channel.trim().is_empty() {
            return Err(IngestError::Config(format!(
                "ocr.notification_channel is not set (or set {NOTIFICATION_CHANNEL_ENV})"
            )));
        }
        if self.ocr.authorization_role.trim().is_empty() {
            return Err(IngestError::Config(format!(
                "ocr.authorization_role is not set (or set {AUTHORIZATION_ROLE_ENV})"
            )));
        }
        Ok(())
    }

    /// Check the values the extract stage cannot run without.
    pub fn validate_for_extract(&self) -> Result<()> {
        if self.storage.content_bucket.trim().is_empty() {
            return Err(IngestError::Config(format!(
                "storage.content_bucket is not set (or set {CONTENT_BUCKET_ENV})"
            )));
        }
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path. Errors are reported, not
/// replaced with defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| IngestError::Config(format!("{}: {e}", path.display())))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailocr").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailocr")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.storage.content_bucket, "content");
        assert_eq!(cfg.aggregate.max_pages, 10_000);
        assert!(cfg.ocr.notification_channel.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.storage.content_bucket, cfg.storage.content_bucket);
        assert_eq!(parsed.aggregate, cfg.aggregate);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[ocr]
notification_channel = "ocr-done"
authorization_role = "ocr-reader"

[aggregate]
max_pages = 50
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.ocr.notification_channel, "ocr-done");
        assert_eq!(cfg.aggregate.max_pages, 50);
        assert_eq!(cfg.aggregate.max_bytes, 512 * 1024 * 1024);
        assert_eq!(cfg.storage.content_bucket, "content");
        assert!(cfg.validate_for_submit().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|name| match name {
            CONTENT_BUCKET_ENV => Some("docs".to_string()),
            AUTHORIZATION_ROLE_ENV => Some("role".to_string()),
            _ => None,
        });
        assert_eq!(cfg.storage.content_bucket, "docs");
        assert_eq!(cfg.ocr.authorization_role, "role");
        assert!(cfg.ocr.notification_channel.is_empty());
    }

    #[test]
    fn test_validate_for_submit_requires_channel_and_role() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.validate_for_submit(),
            Err(IngestError::Config(_))
        ));
        cfg.ocr.notification_channel = "t".into();
        cfg.ocr.authorization_role = "  ".into();
        assert!(cfg.validate_for_submit().is_err());
        cfg.ocr.authorization_role = "r".into();
        assert!(cfg.validate_for_submit().is_ok());
    }

    #[test]
    fn test_spool_dir_default() {
        let cfg = Config::default();
        assert_eq!(
            cfg.ocr.spool_dir_or(Path::new("data")),
            PathBuf::from("data/.ocr-spool")
        );
    }

    #[test]
    fn test_load_config_from_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[aggregate]\nmax_pages = \"many\"\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(IngestError::Config(_))));
    }
}
