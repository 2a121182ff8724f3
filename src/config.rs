//! Server configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table first, then the user's file is merged on top,
//! so a config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! cors_origins = ["http://localhost:3000", "http://localhost:3001"]
//!
//! [uploads]
//! max_file_size = 52428800  # Bytes per file (50 MiB)
//! max_files = 100           # Files per upload request
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! jpeg_quality = 90         # JPEG output quality (1-100)
//!
//! [tasks]
//! retention_secs = 3600     # How long finished tasks stay downloadable (max 1 year)
//! sweep_interval_secs = 60  # How often expired tasks are purged
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listener and CORS settings.
    pub server: ServerConfig,
    /// Upload size and count limits.
    pub uploads: UploadsConfig,
    /// Worker pool and encoder settings.
    pub processing: ProcessingConfig,
    /// Task retention.
    pub tasks: TasksConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }
        if let Some(origin) = self
            .server
            .cors_origins
            .iter()
            .find(|o| o.as_str() != "*" && !o.starts_with("http://") && !o.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "server.cors_origins entry '{origin}' must be \"*\" or an http(s) origin"
            )));
        }
        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_file_size must be non-zero".into(),
            ));
        }
        if self.uploads.max_files == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_files must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.processing.jpeg_quality) {
            return Err(ConfigError::Validation(
                "processing.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.tasks.retention_secs > MAX_RETENTION_SECS {
            return Err(ConfigError::Validation(format!(
                "tasks.retention_secs must be at most {MAX_RETENTION_SECS}"
            )));
        }
        if self.tasks.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "tasks.sweep_interval_secs must be non-zero".into(),
            ));
        }
        if self.tasks.sweep_interval_secs > MAX_RETENTION_SECS {
            return Err(ConfigError::Validation(format!(
                "tasks.sweep_interval_secs must be at most {MAX_RETENTION_SECS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Maximum size of a single uploaded file, in bytes.
    pub max_file_size: usize,
    /// Maximum number of files in one upload request.
    pub max_files: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_files: 100,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Quality for JPEG output (1-100).
    pub jpeg_quality: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            jpeg_quality: 90,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Upper bound for `tasks.retention_secs` and `tasks.sweep_interval_secs` (one year).
pub const MAX_RETENTION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TasksConfig {
    /// Seconds a finished task (and its uploads) stays available.
    pub retention_secs: u64,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl TasksConfig {
    /// The retention window as a signed duration for timestamp arithmetic.
    pub fn retention(&self) -> Result<chrono::Duration, ConfigError> {
        i64::try_from(self.retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "tasks.retention_secs {} is out of range",
                    self.retention_secs
                ))
            })
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults. Otherwise user values are
/// merged on top of the defaults, unknown keys are rejected, and the result
/// is validated.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded config file");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# bulk-resize Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
# Address and port to listen on. --host / --port override these.
host = "0.0.0.0"
port = 8000

# Browser origins allowed to call the API. Use ["*"] to allow any origin.
cors_origins = ["http://localhost:3000", "http://localhost:3001"]

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[uploads]
# Largest accepted file, in bytes (50 MiB).
max_file_size = 52428800

# Most files accepted in a single upload request.
max_files = 100

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# JPEG output quality (1 = worst, 100 = best).
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Tasks
# ---------------------------------------------------------------------------
[tasks]
# Seconds a finished task stays downloadable before it is purged along
# with its uploads. Uploads never used by a task expire after the same time.
# At most 31536000 (one year).
retention_secs = 3600

# Seconds between expiry sweeps.
sweep_interval_secs = 60
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(
            config.server.cors_origins,
            vec!["http://localhost:3000", "http://localhost:3001"]
        );
        assert_eq!(config.uploads.max_file_size, 52_428_800);
        assert_eq!(config.uploads.max_files, 100);
        assert_eq!(config.processing.jpeg_quality, 90);
        assert_eq!(config.tasks.retention_secs, 3600);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[server]
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        // Overridden value
        assert_eq!(config.server.port, 9000);
        // Default values preserved
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.uploads.max_files, 100);
    }

    #[test]
    fn unknown_keys_rejected() {
        let toml = r#"
[uploads]
max_file_sise = 10
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[uploads]
max_files = 5

[tasks]
retention_secs = 10
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.uploads.max_files, 5);
        assert_eq!(config.tasks.retention_secs, 10);
        // Unspecified values should be defaults
        assert_eq!(config.uploads.max_file_size, 52_428_800);
        assert_eq!(config.tasks.sweep_interval_secs, 60);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        fs::write(&config_path, "[processing]\njpeg_quality = 0\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = Config::default();
        config.uploads.max_files = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.uploads.max_file_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tasks.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cors_origin_must_be_http_or_wildcard() {
        let mut config = Config::default();
        config.server.cors_origins = vec!["*".into()];
        assert!(config.validate().is_ok());

        config.server.cors_origins = vec!["localhost:3000".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("localhost:3000"));
    }

    #[test]
    fn retention_above_ceiling_rejected() {
        let mut config = Config::default();
        config.tasks.retention_secs = MAX_RETENTION_SECS;
        assert!(config.validate().is_ok());

        for secs in [MAX_RETENTION_SECS + 1, 10_u64.pow(16), u64::MAX] {
            config.tasks.retention_secs = secs;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("tasks.retention_secs"));
        }
    }

    #[test]
    fn sweep_interval_above_ceiling_rejected() {
        let mut config = Config::default();
        config.tasks.sweep_interval_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn retention_converts_without_overflow() {
        let tasks = TasksConfig::default();
        assert_eq!(tasks.retention().unwrap(), chrono::Duration::seconds(3600));

        for secs in [10_u64.pow(16), u64::MAX] {
            let tasks = TasksConfig {
                retention_secs: secs,
                ..TasksConfig::default()
            };
            assert!(matches!(tasks.retention(), Err(ConfigError::Validation(_))));
        }
    }

    #[test]
    fn load_config_rejects_huge_retention() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[tasks]\nretention_secs = 10000000000000000\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Processing tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
            ..Default::default()
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
            ..Default::default()
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            ..Default::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"port = 8000"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"port = 9000"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("port").unwrap().as_integer(), Some(9000));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[uploads]
max_files = 100
max_file_size = 1000
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[uploads]
max_files = 3
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let uploads = merged.get("uploads").unwrap();
        assert_eq!(uploads.get("max_files").unwrap().as_integer(), Some(3));
        // max_file_size preserved from base
        assert_eq!(uploads.get("max_file_size").unwrap().as_integer(), Some(1000));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str(r#"origins = ["a", "b"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"origins = ["c"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("origins").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_matches_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn stock_defaults_value_round_trips() {
        let config = resolve_config(stock_defaults_value(), None).unwrap();
        assert_eq!(config, Config::default());
    }
}
