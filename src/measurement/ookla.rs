//! Official Ookla `speedtest` CLI provider.
//!
//! Runs `speedtest --format=json` with the license and GDPR prompts accepted
//! up front. The JSON reports bandwidth in bytes per second.

use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::{MeasurementProvider, MeasurementRequest, ProviderError, ProviderMeta, RawMeasurement};

const INSTALL_HINT: &str = "install the official CLI: https://www.speedtest.net/apps/cli";

/// Provider backed by the Ookla `speedtest` binary.
pub struct OoklaProvider {
    binary: String,
}

impl OoklaProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for OoklaProvider {
    fn default() -> Self {
        Self::new("speedtest")
    }
}

#[derive(Debug, Deserialize)]
struct OoklaOutput {
    ping: OoklaPing,
    download: OoklaTransfer,
    upload: OoklaTransfer,
    #[serde(default)]
    server: Option<OoklaServer>,
}

#[derive(Debug, Deserialize)]
struct OoklaPing {
    latency: f64,
}

#[derive(Debug, Deserialize)]
struct OoklaTransfer {
    /// Bytes per second.
    bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct OoklaServer {
    name: String,
    #[serde(default)]
    location: Option<String>,
}

/// Parse `speedtest --format=json` output. Bandwidth is reported in bytes/s.
pub fn parse_output(stdout: &[u8]) -> Result<RawMeasurement, ProviderError> {
    let out: OoklaOutput = serde_json::from_slice(stdout).map_err(|source| ProviderError::Parse {
        tool: "speedtest",
        source,
    })?;

    let server = out.server.map(|s| match s.location {
        Some(loc) => format!("{} ({})", s.name, loc),
        None => s.name,
    });

    Ok(RawMeasurement {
        ping_ms: out.ping.latency,
        download_bps: out.download.bandwidth * 8.0,
        upload_bps: out.upload.bandwidth * 8.0,
        server,
    })
}

impl MeasurementProvider for OoklaProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            id: "ookla",
            display_name: "Speedtest.net (Ookla)",
            description: "The official Ookla CLI. Best for comparing against ISP marketing claims.",
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
        cmd.arg("--format=json")
            .arg("--accept-license")
            .arg("--accept-gdpr");
        if let Some(id) = &req.server_id {
            cmd.arg(format!("--server-id={}", id));
        }

        debug!(binary = %self.binary, server_id = ?req.server_id, "launching ookla speedtest");
        let output = cmd
            .output()
            .map_err(|e| ProviderError::from_spawn(&self.binary, INSTALL_HINT, e))?;

        if !output.status.success() {
            return Err(ProviderError::from_output(&self.binary, &output));
        }

        parse_output(&output.stdout)
    }
}
