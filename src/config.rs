//! TOML configuration for speedsite.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::executor::DEFAULT_DEADLINE;
use crate::report::TimestampFormat;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SPEEDSITE_CONFIG";

/// Config file picked up from the working directory when nothing else is given.
pub const LOCAL_CONFIG: &str = "speedsite.toml";

/// Where [`Config::load_or_default`] found its configuration.
///
/// Config is resolved before the tracing subscriber exists, so the loader
/// records what happened and the binary logs it afterwards via [`log`].
///
/// [`log`]: ConfigSource::log
#[derive(Debug, Default)]
pub struct ConfigSource {
    /// File the configuration was read from; `None` means compiled-in defaults.
    pub path: Option<PathBuf>,
    /// `SPEEDSITE_CONFIG` path that was set but could not be loaded, with the error.
    pub rejected_env: Option<(PathBuf, String)>,
}

impl ConfigSource {
    pub fn log(&self) {
        if let Some((path, error)) = &self.rejected_env {
            warn!(
                path = %path.display(),
                %error,
                "SPEEDSITE_CONFIG set but file could not be loaded, trying fallback"
            );
        }
        match &self.path {
            Some(path) => info!(path = %path.display(), "loaded configuration"),
            None => debug!("no config file found, using compiled-in defaults"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub measurement: MeasurementConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the configuration source, in order:
    /// 1. `explicit` (the `--config` flag); failing to load it is an error.
    /// 2. The path in `SPEEDSITE_CONFIG`.
    /// 3. `./speedsite.toml`.
    /// 4. Compiled-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let mut source = ConfigSource::default();

        if let Some(path) = explicit {
            let cfg = Self::load(path)?;
            source.path = Some(path.to_path_buf());
            return Ok((cfg, source));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(cfg) => {
                    source.path = Some(path);
                    return Ok((cfg, source));
                }
                Err(e) => source.rejected_env = Some((path, format!("{:#}", e))),
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            let cfg = Self::load(local)?;
            source.path = Some(local.to_path_buf());
            return Ok((cfg, source));
        }

        Ok((Self::default(), source))
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let deadline = self.measurement.deadline_secs;
        if !deadline.is_finite() || deadline <= 0.0 || Duration::try_from_secs_f64(deadline).is_err()
        {
            anyhow::bail!(
                "measurement.deadline_secs must be a positive number of seconds, got {}",
                deadline
            );
        }
        if self.history.capacity == 0 {
            anyhow::bail!("history.capacity must be at least 1");
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("server.bind is not a valid socket address: {}", self.server.bind);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Provider id: `speedtest-cli`, `ookla` or `simulated`.
    pub provider: String,
    /// Hard wall-clock limit for one measurement. Fractions are allowed.
    pub deadline_secs: f64,
    /// Pin a provider-specific server instead of auto-selecting.
    pub server_id: Option<String>,
    /// How long the simulated provider pretends to measure.
    pub simulated_delay_ms: u64,
}

impl MeasurementConfig {
    /// Falls back to the default deadline for values `validate()` rejects.
    pub fn deadline(&self) -> Duration {
        Duration::try_from_secs_f64(self.deadline_secs).unwrap_or(DEFAULT_DEADLINE)
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            provider: "speedtest-cli".to_string(),
            deadline_secs: DEFAULT_DEADLINE.as_secs_f64(),
            server_id: None,
            simulated_delay_ms: 1500,
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of entries kept; the oldest is evicted first.
    pub capacity: usize,
    pub timestamp_format: TimestampFormat,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            timestamp_format: TimestampFormat::Clock,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
