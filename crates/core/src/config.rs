//! Engine configuration.
//!
//! Configuration is layered: defaults < `converge.toml` < `CONVERGE_*`
//! environment variables. Every field has a default so an empty file is a
//! valid configuration. Config is validated on load and read-only afterwards.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::{fmt, fs};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Log Level
// =============================================================================

/// Logging level used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The `EnvFilter` directive for this level.
    #[must_use]
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ERROR" => Ok(Self::Error),
            "WARN" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            "TRACE" => Ok(Self::Trace),
            _ => Err(Error::validation(
                "logging.level",
                format!("Invalid log level: '{s}'. Must be ERROR, WARN, INFO, DEBUG, or TRACE"),
            )),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Longest allowed per-check timeout: one day.
pub const MAX_CHECK_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// Resource check scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Upper bound on a single entity check.
    pub timeout_ms: u64,
    /// Pause between check cycles.
    pub interval_ms: u64,
    /// Maximum checks running at once.
    pub max_concurrent: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            interval_ms: 30_000,
            max_concurrent: 16,
        }
    }
}

impl CheckConfig {
    /// Per-check timeout, capped at [`MAX_CHECK_TIMEOUT_MS`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.min(MAX_CHECK_TIMEOUT_MS))
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Status derivation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Unresolved detect/actuate cycles after which an entity is unhappy.
    pub flapping_threshold: u32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            flapping_threshold: 5,
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// =============================================================================
// Configuration
// =============================================================================

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub check: CheckConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Parse configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document is not valid TOML for this schema
    /// or fails validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigRead` or `Error::ConfigParse` on failure.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::config_read(path, e.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, an optional file, then process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, an override is
    /// malformed, or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CONVERGE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if an override cannot be parsed, or if the
    /// resulting configuration is invalid.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CONVERGE_CHECK_TIMEOUT_MS") {
            self.check.timeout_ms = parse_override("check.timeout_ms", &raw)?;
        }
        if let Some(raw) = lookup("CONVERGE_CHECK_INTERVAL_MS") {
            self.check.interval_ms = parse_override("check.interval_ms", &raw)?;
        }
        if let Some(raw) = lookup("CONVERGE_CHECK_MAX_CONCURRENT") {
            self.check.max_concurrent = parse_override("check.max_concurrent", &raw)?;
        }
        if let Some(raw) = lookup("CONVERGE_FLAPPING_THRESHOLD") {
            self.status.flapping_threshold = parse_override("status.flapping_threshold", &raw)?;
        }
        if let Some(raw) = lookup("CONVERGE_LOG_LEVEL") {
            self.logging.level = raw.parse()?;
        }
        if let Some(raw) = lookup("CONVERGE_LOG_JSON") {
            self.logging.json = parse_override("logging.json", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.check.timeout_ms == 0 {
            return Err(Error::validation("check.timeout_ms", "must be greater than zero"));
        }
        if self.check.timeout_ms > MAX_CHECK_TIMEOUT_MS {
            return Err(Error::validation(
                "check.timeout_ms",
                format!("must not exceed {MAX_CHECK_TIMEOUT_MS}"),
            ));
        }
        if self.check.interval_ms == 0 {
            return Err(Error::validation("check.interval_ms", "must be greater than zero"));
        }
        if self.check.max_concurrent == 0 {
            return Err(Error::validation("check.max_concurrent", "must be greater than zero"));
        }
        if self.status.flapping_threshold == 0 {
            return Err(Error::validation(
                "status.flapping_threshold",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_override<T>(field: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::validation(field, format!("invalid value '{raw}': {e}")))
}
