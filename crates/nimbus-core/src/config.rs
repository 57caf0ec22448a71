//! Configuration module for Nimbus.
//!
//! Typed settings for the pacer, uploads, timeouts, logging and the OneDrive
//! backend, read from YAML or assembled with [`ConfigBuilder`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upload chunk alignment required by OneDrive (320 KiB).
pub const ONEDRIVE_CHUNK_ALIGNMENT: u64 = 320 * 1024;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Nimbus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pacer: PacerConfig,
    pub upload: UploadConfig,
    pub timeouts: TimeoutsConfig,
    pub logging: LoggingConfig,
    pub onedrive: OneDriveConfig,
}

/// Call pacing and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Shortest interval between calls, in milliseconds.
    pub min_sleep_ms: u64,
    /// Longest backoff interval, in milliseconds.
    pub max_sleep_ms: u64,
    /// Successes needed to halve the interval.
    pub decay_constant: u32,
    /// Attempts per call, the first one included.
    pub max_attempts: u32,
}

/// Chunked upload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of each upload fragment in bytes.
    pub chunk_size: u64,
    /// Fragment sizes must be a multiple of this, in bytes.
    pub alignment: u64,
}

/// Deadlines and background intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Overall deadline for chunked uploads and server-side jobs, in seconds.
    pub operation_timeout_secs: u64,
    /// Interval between async job status polls, in milliseconds.
    pub job_poll_interval_ms: u64,
    /// Interval between token renewals during long operations, in seconds.
    pub token_renew_interval_secs: u64,
}

/// `tracing` output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// OneDrive backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneDriveConfig {
    /// Path inside the drive the backend is scoped to.
    pub root: String,
    /// Drive to use; `None` selects the signed-in user's default drive.
    pub drive_id: Option<String>,
    /// `personal`, `business`, or `documentLibrary`.
    pub drive_type: String,
    /// Base URL of the Microsoft Graph API.
    pub graph_url: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads a YAML file; missing sections take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but any read or parse failure yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Default location of the config file
    ///
    /// Typically `$XDG_CONFIG_HOME/nimbus/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("nimbus")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            min_sleep_ms: 10,
            max_sleep_ms: 2_000,
            decay_constant: 2,
            max_attempts: 10,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10 * 1024 * 1024,
            alignment: ONEDRIVE_CHUNK_ALIGNMENT,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 300,
            job_poll_interval_ms: 1_000,
            token_renew_interval_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for OneDriveConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            drive_id: None,
            drive_type: "personal".to_string(),
            graph_url: "https://graph.microsoft.com/v1.0".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Duration accessors
// ---------------------------------------------------------------------------

impl PacerConfig {
    pub fn min_sleep(&self) -> Duration {
        Duration::from_millis(self.min_sleep_ms)
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }
}

impl TimeoutsConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    pub fn token_renew_interval(&self) -> Duration {
        Duration::from_secs(self.token_renew_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"pacer.max_attempts"`.
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accepted `logging.level` values
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `onedrive.drive_type`.
const VALID_DRIVE_TYPES: &[&str] = &["personal", "business", "documentLibrary"];

impl Config {
    /// Checks every section and collects all problems.
    ///
    /// Returns nothing for a usable configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- pacer ---
        if self.pacer.min_sleep_ms == 0 {
            errors.push(ValidationError::new(
                "pacer.min_sleep_ms",
                "must be greater than 0",
            ));
        }
        if self.pacer.max_sleep_ms < self.pacer.min_sleep_ms {
            errors.push(ValidationError::new(
                "pacer.max_sleep_ms",
                format!(
                    "max_sleep_ms ({}) must not be below min_sleep_ms ({})",
                    self.pacer.max_sleep_ms, self.pacer.min_sleep_ms
                ),
            ));
        }
        if self.pacer.decay_constant == 0 {
            errors.push(ValidationError::new(
                "pacer.decay_constant",
                "must be greater than 0",
            ));
        }
        if self.pacer.max_attempts == 0 {
            errors.push(ValidationError::new(
                "pacer.max_attempts",
                "must be greater than 0",
            ));
        }

        // --- upload ---
        if self.upload.alignment == 0 {
            errors.push(ValidationError::new(
                "upload.alignment",
                "must be greater than 0",
            ));
        }
        if self.upload.chunk_size == 0 {
            errors.push(ValidationError::new(
                "upload.chunk_size",
                "must be greater than 0",
            ));
        } else if self.upload.alignment > 0 && self.upload.chunk_size % self.upload.alignment != 0
        {
            errors.push(ValidationError::new(
                "upload.chunk_size",
                format!(
                    "chunk_size ({}) must be a multiple of {} bytes",
                    self.upload.chunk_size, self.upload.alignment
                ),
            ));
        }

        // --- timeouts ---
        if self.timeouts.operation_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "timeouts.operation_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.timeouts.job_poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                "timeouts.job_poll_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.timeouts.token_renew_interval_secs == 0 {
            errors.push(ValidationError::new(
                "timeouts.token_renew_interval_secs",
                "must be greater than 0",
            ));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        // --- onedrive ---
        if !VALID_DRIVE_TYPES.contains(&self.onedrive.drive_type.as_str()) {
            errors.push(ValidationError::new(
                "onedrive.drive_type",
                format!(
                    "invalid drive type '{}'; expected one of: {}",
                    self.onedrive.drive_type,
                    VALID_DRIVE_TYPES.join(", ")
                ),
            ));
        }
        if !(self.onedrive.graph_url.starts_with("https://")
            || self.onedrive.graph_url.starts_with("http://"))
        {
            errors.push(ValidationError::new(
                "onedrive.graph_url",
                format!("not an http(s) URL: {}", self.onedrive.graph_url),
            ));
        }
        if matches!(self.onedrive.drive_id.as_deref(), Some("")) {
            errors.push(ValidationError::new(
                "onedrive.drive_id",
                "must not be empty when set",
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// ```
/// use nimbus_core::config::ConfigBuilder;
///
/// let cfg = ConfigBuilder::new()
///     .pacer_max_attempts(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- pacer ---

    pub fn pacer_min_sleep_ms(mut self, ms: u64) -> Self {
        self.config.pacer.min_sleep_ms = ms;
        self
    }

    pub fn pacer_max_sleep_ms(mut self, ms: u64) -> Self {
        self.config.pacer.max_sleep_ms = ms;
        self
    }

    pub fn pacer_decay_constant(mut self, decay: u32) -> Self {
        self.config.pacer.decay_constant = decay;
        self
    }

    pub fn pacer_max_attempts(mut self, attempts: u32) -> Self {
        self.config.pacer.max_attempts = attempts;
        self
    }

    // --- upload ---

    pub fn upload_chunk_size(mut self, bytes: u64) -> Self {
        self.config.upload.chunk_size = bytes;
        self
    }

    pub fn upload_alignment(mut self, bytes: u64) -> Self {
        self.config.upload.alignment = bytes;
        self
    }

    // --- timeouts ---

    pub fn operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeouts.operation_timeout_secs = secs;
        self
    }

    pub fn job_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.job_poll_interval_ms = ms;
        self
    }

    pub fn token_renew_interval_secs(mut self, secs: u64) -> Self {
        self.config.timeouts.token_renew_interval_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- onedrive ---

    pub fn onedrive_root(mut self, root: impl Into<String>) -> Self {
        self.config.onedrive.root = root.into();
        self
    }

    pub fn onedrive_drive_id(mut self, drive_id: impl Into<String>) -> Self {
        self.config.onedrive.drive_id = Some(drive_id.into());
        self
    }

    pub fn onedrive_drive_type(mut self, drive_type: impl Into<String>) -> Self {
        self.config.onedrive.drive_type = drive_type.into();
        self
    }

    pub fn onedrive_graph_url(mut self, url: impl Into<String>) -> Self {
        self.config.onedrive.graph_url = url.into();
        self
    }

    // --- build ---

    /// The configured [`Config`], unvalidated.
    pub fn build(self) -> Config {
        self.config
    }

    /// Builds, then validates; `Err` carries every problem found
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
