//! Result formatting: unit conversion, timestamps, CSV and terminal summaries.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::measurement::{MeasurementResult, ProviderError, RawMeasurement};

/// Header row of the CSV export.
pub const CSV_HEADER: &str = "timestamp,ping,download_mbps,upload_mbps";

/// How capture timestamps are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Local wall-clock time, `HH:MM:SS`.
    #[default]
    Clock,
    /// Local time as RFC 3339 with offset.
    Rfc3339,
}

impl TimestampFormat {
    pub fn render(&self, at: DateTime<Local>) -> String {
        match self {
            TimestampFormat::Clock => at.format("%H:%M:%S").to_string(),
            TimestampFormat::Rfc3339 => at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        }
    }

    pub fn now(&self) -> String {
        self.render(Local::now())
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bits per second to megabits per second, rounded for display.
pub fn bps_to_mbps(bps: f64) -> f64 {
    round2(bps / 1_000_000.0)
}

/// Convert a provider's raw figures into a [`MeasurementResult`].
///
/// Negative or non-finite values mean the provider handed back something
/// malformed; that is reported as a provider failure rather than recorded.
pub fn to_result(raw: RawMeasurement, elapsed: Duration) -> Result<MeasurementResult, ProviderError> {
    for (field, value) in [
        ("ping", raw.ping_ms),
        ("download", raw.download_bps),
        ("upload", raw.upload_bps),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ProviderError::InvalidMeasurement(format!(
                "{} must be a non-negative number, got {}",
                field, value
            )));
        }
    }

    Ok(MeasurementResult {
        ping: round2(raw.ping_ms),
        download_mbps: bps_to_mbps(raw.download_bps),
        upload_mbps: bps_to_mbps(raw.upload_bps),
        server_label: raw.server,
        elapsed_seconds: round2(elapsed.as_secs_f64()),
    })
}

/// Encode history as CSV: header plus one row per entry, oldest first.
pub fn history_csv(entries: &[HistoryEntry]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 2 + entries.len() * 40);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for entry in entries {
        out.push_str(&format!(
            "{},{},{},{}\r\n",
            csv_escape(&entry.timestamp),
            entry.result.ping,
            entry.result.download_mbps,
            entry.result.upload_mbps,
        ));
    }
    out
}

/// Quote a field if it contains a comma, quote, or newline.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One-line human-readable summary for terminal output.
pub fn format_summary(result: &MeasurementResult) -> String {
    let mut summary = format!(
        "ping {:.2} ms, download {:.2} Mbps, upload {:.2} Mbps ({:.1}s)",
        result.ping, result.download_mbps, result.upload_mbps, result.elapsed_seconds,
    );
    if let Some(server) = &result.server_label {
        summary.push_str(&format!(", server: {}", server));
    }
    summary
}
