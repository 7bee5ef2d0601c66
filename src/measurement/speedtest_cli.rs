//! `speedtest-cli` (the Python speedtest.net client) wrapper.
//!
//! Runs `speedtest-cli --json` and reads download/upload in bits per second
//! and ping in milliseconds.

use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::{MeasurementProvider, MeasurementRequest, ProviderError, ProviderMeta, RawMeasurement};

const INSTALL_HINT: &str = "install with `pip install speedtest-cli` or your package manager";

pub struct SpeedtestCliProvider {
    binary: String,
}

impl SpeedtestCliProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SpeedtestCliProvider {
    fn default() -> Self {
        Self::new("speedtest-cli")
    }
}

#[derive(Debug, Deserialize)]
struct CliOutput {
    download: f64,
    upload: f64,
    ping: f64,
    #[serde(default)]
    server: Option<CliServer>,
}

#[derive(Debug, Deserialize)]
struct CliServer {
    #[serde(default)]
    sponsor: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl CliServer {
    fn label(&self) -> Option<String> {
        match (&self.sponsor, &self.name) {
            (Some(sponsor), Some(name)) => Some(format!("{} ({})", sponsor, name)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

/// Parse the JSON document printed by `speedtest-cli --json`.
pub fn parse_output(stdout: &[u8]) -> Result<RawMeasurement, ProviderError> {
    let out: CliOutput = serde_json::from_slice(stdout).map_err(|source| ProviderError::Parse {
        tool: "speedtest-cli",
        source,
    })?;

    Ok(RawMeasurement {
        ping_ms: out.ping,
        download_bps: out.download,
        upload_bps: out.upload,
        server: out.server.as_ref().and_then(CliServer::label),
    })
}

impl MeasurementProvider for SpeedtestCliProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            id: "speedtest-cli",
            display_name: "Speedtest.net (speedtest-cli)",
            description: "Python speedtest.net client; picks the lowest-latency server automatically.",
            install_hint: INSTALL_HINT,
        }
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn measure(&self, req: &MeasurementRequest) -> Result<RawMeasurement, ProviderError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--json");
        if let Some(id) = &req.server_id {
            cmd.arg("--server").arg(id);
        }

        debug!(binary = %self.binary, server_id = ?req.server_id, "launching speedtest-cli");
        let output = cmd
            .output()
            .map_err(|e| ProviderError::from_spawn(&self.binary, INSTALL_HINT, e))?;

        if !output.status.success() {
            return Err(ProviderError::from_output(&self.binary, &output));
        }

        parse_output(&output.stdout)
    }
}
