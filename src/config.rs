//! Application configuration.
//!
//! Handles loading, validating, and merging the `imagedesk.toml` file. Stock
//! defaults are serialized to a TOML value and the user file is merged on top
//! of it, so a config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "127.0.0.1:3000"     # Listen address
//! enable_cors = false         # Permissive CORS for cross-origin front ends
//!
//! [limits]
//! max_upload_bytes = 20971520 # Per-file upload limit (20 MiB)
//! max_batch_files = 20        # Files accepted by one batch request
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//!
//! [defaults.resize]           # Operation parameters used when a request
//! width = 800                 # carries no params; see `request` for the
//! height = 600                # full list of sections
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::request::OperationParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Extra body allowance on top of the file payload, for multipart framing
/// and the text parts.
const BODY_SLACK_BYTES: usize = 1024 * 1024;

/// Application configuration loaded from `imagedesk.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub processing: ProcessingConfig,
    /// Operation parameters used when a request has no `params` part.
    pub defaults: OperationParams,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind must be a socket address like 127.0.0.1:3000 (got {:?})",
                self.server.bind
            )));
        }
        if self.limits.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.limits.max_batch_files == 0 {
            return Err(ConfigError::Validation(
                "limits.max_batch_files must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        self.defaults
            .validate()
            .map_err(|e| ConfigError::Validation(format!("defaults: {e}")))
    }

    /// Request body limit for the HTTP layer: a full batch plus slack.
    pub fn body_limit(&self) -> usize {
        self.limits
            .max_upload_bytes
            .saturating_mul(self.limits.max_batch_files)
            .saturating_add(BODY_SLACK_BYTES)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Add a permissive CORS layer.
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            enable_cors: false,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted file, in bytes.
    pub max_upload_bytes: usize,
    /// Most files accepted by one batch request.
    pub max_batch_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            max_batch_files: 20,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
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

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
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

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
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
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imagedesk.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imagedesk Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
# Address and port to listen on.
bind = "127.0.0.1:3000"

# Answer cross-origin requests (useful when the page is served elsewhere).
enable_cors = false

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted image, in bytes (20 MiB).
max_upload_bytes = 20971520

# Most images accepted by one batch request.
max_batch_files = 20

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Default operation parameters
# ---------------------------------------------------------------------------
# Used when a request does not send its own parameters, and as the initial
# values of the page's inputs.

[defaults.resize]
# Target box. Omit one edge to keep the aspect ratio.
width = 800
height = 600
# cover | contain | fill | inside
fit = "cover"

[defaults.crop]
left = 0
top = 0
width = 500
height = 500

[defaults.rotate]
# Clockwise degrees. Non-right angles grow the canvas.
angle = 90.0

[defaults.watermark]
text = "© imagedesk"
# top-left | top-right | bottom-left | bottom-right | center
position = "bottom-right"
# Glyph height in pixels (multiples of 8 render crisply).
size = 80
color = "white"
opacity = 0.8

[defaults.enhance]
# Multipliers; 1.0 leaves the image unchanged.
brightness = 1.2
contrast = 1.1
saturation = 1.3

[defaults.blur]
# Gaussian sigma. Values below 0.3 do nothing.
amount = 5.0

[defaults.format]
# jpeg | png | webp | avif  (webp output is lossless)
type = "webp"
quality = 80

[defaults.avatar]
size = 200
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{FitMode, OutputFormat};
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!(!config.server.enable_cors);
        assert_eq!(config.limits.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.limits.max_batch_files, 20);
        assert_eq!(config.processing.max_processes, None);
        assert_eq!(config.defaults, OperationParams::default());
    }

    #[test]
    fn parse_partial_config() {
        let config: AppConfig = toml::from_str(
            r#"
[server]
bind = "0.0.0.0:8080"

[defaults.resize]
width = 320
"#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(!config.server.enable_cors);
        assert_eq!(config.defaults.resize.width, Some(320));
        assert_eq!(config.defaults.resize.height, Some(600));
        assert_eq!(config.limits.max_batch_files, 20);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("imagedesk.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imagedesk.toml");
        fs::write(
            &path,
            r#"
[limits]
max_batch_files = 5

[defaults.format]
type = "jpeg"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.limits.max_batch_files, 5);
        assert_eq!(config.limits.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.defaults.format.format, OutputFormat::Jpeg);
        assert_eq!(config.defaults.format.quality, 80);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imagedesk.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[server]
port = 3000
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[theme]\ncolor = \"red\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[defaults.blur]\nradius = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imagedesk.toml");
        fs::write(&path, "[limits]\nmax_files = 3\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_bind() {
        let mut config = AppConfig::default();
        config.server.bind = "localhost".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.limits.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.max_batch_files = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_checks_default_params() {
        let mut config = AppConfig::default();
        config.defaults.avatar.size = 0;
        match config.validate() {
            Err(ConfigError::Validation(msg)) => assert!(msg.starts_with("defaults:")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imagedesk.toml");
        fs::write(&path, "[defaults.crop]\nwidth = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn body_limit_covers_full_batch() {
        let config = AppConfig::default();
        assert_eq!(
            config.body_limit(),
            20 * 20 * 1024 * 1024 + BODY_SLACK_BYTES
        );

        let mut huge = AppConfig::default();
        huge.limits.max_upload_bytes = usize::MAX;
        assert_eq!(huge.body_limit(), usize::MAX);
    }

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[defaults.resize]
fit = "inside"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let resize = &merged["defaults"]["resize"];
        assert_eq!(resize["fit"].as_str(), Some("inside"));
        assert_eq!(resize["width"].as_integer(), Some(800));
    }

    #[test]
    fn resolve_config_with_overlay() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[defaults.resize]\nfit = \"contain\"\n").unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.defaults.resize.fit, FitMode::Contain);
        assert_eq!(config.defaults.resize.width, Some(800));
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        for section in ["server", "limits", "processing", "defaults"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value =
            toml::from_str(stock_config_toml()).expect("stock config must be valid TOML");
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[server]",
            "[limits]",
            "[processing]",
            "[defaults.resize]",
            "[defaults.crop]",
            "[defaults.rotate]",
            "[defaults.watermark]",
            "[defaults.enhance]",
            "[defaults.blur]",
            "[defaults.format]",
            "[defaults.avatar]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }
}
