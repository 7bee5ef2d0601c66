//! Measurement providers: the external tools that actually run a speed test.
//!
//! A provider is a blocking black box. It may take seconds or never return,
//! so callers go through [`crate::executor::BoundedExecutor`] instead of
//! invoking [`MeasurementProvider::measure`] directly.

pub mod ookla;
pub mod simulated;
pub mod speedtest_cli;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MeasurementConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{tool} not found ({hint})")]
    NotInstalled { tool: String, hint: &'static str },

    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("could not parse {tool} output: {source}")]
    Parse {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("unknown measurement provider '{0}'")]
    UnknownProvider(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Map a process launch failure, distinguishing a missing binary.
    pub(crate) fn from_spawn(tool: &str, hint: &'static str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProviderError::NotInstalled {
                tool: tool.to_string(),
                hint,
            }
        } else {
            ProviderError::Spawn {
                tool: tool.to_string(),
                source: err,
            }
        }
    }

    /// Build a `Failed` error from a finished process that exited non-zero.
    pub(crate) fn from_output(tool: &str, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        ProviderError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr,
        }
    }
}

/// Metadata describing a measurement provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMeta {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub install_hint: &'static str,
}

/// Per-run options handed to a provider.
#[derive(Debug, Clone, Default)]
pub struct MeasurementRequest {
    /// Provider-specific server id; `None` lets the provider pick the closest.
    pub server_id: Option<String>,
}

/// Provider output in raw units, before any display conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub ping_ms: f64,
    pub download_bps: f64,
    pub upload_bps: f64,
    pub server: Option<String>,
}

/// A completed measurement in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Round-trip latency in milliseconds.
    pub ping: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    #[serde(rename = "server", default, skip_serializing_if = "Option::is_none")]
    pub server_label: Option<String>,
    pub elapsed_seconds: f64,
}

/// Trait for every speed test backend.
///
/// `measure` is called on a dedicated worker thread and is allowed to block.
pub trait MeasurementProvider: Send + Sync {
    /// Static metadata about the provider.
    fn meta(&self) -> ProviderMeta;

    /// Check whether the provider's CLI/dependency is installed.
    fn is_available(&self) -> bool;

    /// Run one full measurement: server selection, ping, download, upload.
    fn measure(&self, req: &MeasurementRequest) -> Result<RawMeasurement, ProviderError>;
}

/// Every provider this build knows about, in preference order.
pub fn all_providers(cfg: &MeasurementConfig) -> Vec<Arc<dyn MeasurementProvider>> {
    vec![
        Arc::new(speedtest_cli::SpeedtestCliProvider::default()) as Arc<dyn MeasurementProvider>,
        Arc::new(ookla::OoklaProvider::default()),
        Arc::new(simulated::SimulatedProvider::new(Duration::from_millis(
            cfg.simulated_delay_ms,
        ))),
    ]
}

/// Run `is_available` on the blocking pool.
///
/// Availability checks launch the provider's CLI, so they must not run on a
/// runtime worker thread. A check that panics counts as not installed.
pub async fn check_installed(provider: Arc<dyn MeasurementProvider>) -> bool {
    tokio::task::spawn_blocking(move || provider.is_available())
        .await
        .unwrap_or(false)
}

/// Look up the provider configured by id.
pub fn provider_by_id(
    id: &str,
    cfg: &MeasurementConfig,
) -> Result<Arc<dyn MeasurementProvider>, ProviderError> {
    all_providers(cfg)
        .into_iter()
        .find(|p| p.meta().id == id)
        .ok_or_else(|| ProviderError::UnknownProvider(id.to_string()))
}
