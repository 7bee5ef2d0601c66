use std::sync::Arc;

use tracing::info;

use super::error::ApiError;
use crate::config::Config;
use crate::executor::{BoundedExecutor, ExecutionOutcome};
use crate::history::{HistoryEntry, HistoryStore};
use crate::measurement::{self, MeasurementRequest};
use crate::report::TimestampFormat;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<BoundedExecutor>,
    pub history: Arc<HistoryStore>,
    pub timestamp_format: TimestampFormat,
}

impl AppState {
    pub fn new(
        executor: BoundedExecutor,
        history: HistoryStore,
        timestamp_format: TimestampFormat,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            history: Arc::new(history),
            timestamp_format,
        }
    }

    /// Build the provider, executor and store described by `cfg`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let provider = measurement::provider_by_id(&cfg.measurement.provider, &cfg.measurement)?;
        let executor = BoundedExecutor::new(provider, cfg.measurement.deadline()).with_request(
            MeasurementRequest {
                server_id: cfg.measurement.server_id.clone(),
            },
        );

        Ok(Self::new(
            executor,
            HistoryStore::new(cfg.history.capacity),
            cfg.history.timestamp_format,
        ))
    }

    /// Run one bounded measurement and record it on success.
    ///
    /// Failures and timeouts leave the history untouched.
    pub async fn run_test(&self) -> Result<HistoryEntry, ApiError> {
        match self.executor.execute().await {
            ExecutionOutcome::Completed(result) => {
                let entry = HistoryEntry::new(result, self.timestamp_format.now());
                let evicted = self.history.append(entry.clone());
                info!(
                    timestamp = %entry.timestamp,
                    evicted,
                    history_len = self.history.len(),
                    "history updated"
                );
                Ok(entry)
            }
            ExecutionOutcome::Failed(reason) => Err(ApiError::Measurement(reason)),
            ExecutionOutcome::TimedOut(deadline) => Err(ApiError::Timeout {
                deadline_secs: deadline.as_secs_f64(),
            }),
        }
    }
}
