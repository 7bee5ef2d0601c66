//! Bounded-time execution of a single measurement.
//!
//! The provider runs on its own OS thread. The caller waits on a oneshot
//! channel under a wall-clock deadline. When the deadline passes first the
//! worker is abandoned, not killed: it keeps running until the provider
//! returns, and its late result is dropped because nobody holds the receiver.
//!
//! Workers are plain threads, not `spawn_blocking` tasks: the runtime must be
//! able to shut down while an abandoned worker is still blocked. A provider
//! that never returns leaks its thread until exit.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::measurement::{
    MeasurementProvider, MeasurementRequest, MeasurementResult, ProviderError, RawMeasurement,
};
use crate::report;

/// Default wall-clock budget for one full measurement.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Outcome of one bounded measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The provider finished within the deadline.
    Completed(MeasurementResult),
    /// The provider finished within the deadline but reported an error.
    Failed(String),
    /// The deadline elapsed first. Carries the configured deadline.
    TimedOut(Duration),
}

type WorkerReport = (Result<RawMeasurement, ProviderError>, Duration);

pub struct BoundedExecutor {
    provider: Arc<dyn MeasurementProvider>,
    deadline: Duration,
    request: MeasurementRequest,
}

impl BoundedExecutor {
    pub fn new(provider: Arc<dyn MeasurementProvider>, deadline: Duration) -> Self {
        Self {
            provider,
            deadline,
            request: MeasurementRequest::default(),
        }
    }

    pub fn with_request(mut self, request: MeasurementRequest) -> Self {
        self.request = request;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn provider(&self) -> Arc<dyn MeasurementProvider> {
        Arc::clone(&self.provider)
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.meta().id
    }

    /// Run the provider once and wait at most `deadline` for it.
    pub async fn execute(&self) -> ExecutionOutcome {
        let run_id = Uuid::new_v4();
        let provider_id = self.provider_id();
        let (tx, rx) = oneshot::channel::<WorkerReport>();

        let provider = Arc::clone(&self.provider);
        let request = self.request.clone();
        let spawned = thread::Builder::new()
            .name(format!("measure-{}", &run_id.simple().to_string()[..8]))
            .spawn(move || {
                let started = Instant::now();
                let result = provider.measure(&request);
                let elapsed = started.elapsed();
                if tx.send((result, elapsed)).is_err() {
                    debug!(
                        %run_id,
                        elapsed_secs = elapsed.as_secs_f64(),
                        "measurement finished after its deadline; result discarded"
                    );
                }
            });

        if let Err(e) = spawned {
            warn!(%run_id, error = %e, "could not start measurement worker");
            return ExecutionOutcome::Failed(format!("failed to start measurement worker: {}", e));
        }

        info!(
            %run_id,
            provider = provider_id,
            deadline_secs = self.deadline.as_secs_f64(),
            "measurement started"
        );

        let outcome = match tokio::time::timeout(self.deadline, rx).await {
            Ok(Ok((Ok(raw), elapsed))) => match report::to_result(raw, elapsed) {
                Ok(result) => ExecutionOutcome::Completed(result),
                Err(e) => ExecutionOutcome::Failed(e.to_string()),
            },
            Ok(Ok((Err(e), _))) => ExecutionOutcome::Failed(e.to_string()),
            // Sender dropped without a value: the provider panicked.
            Ok(Err(_)) => {
                ExecutionOutcome::Failed("measurement worker exited without a result".to_string())
            }
            Err(_) => ExecutionOutcome::TimedOut(self.deadline),
        };

        match &outcome {
            ExecutionOutcome::Completed(r) => info!(
                %run_id,
                ping_ms = r.ping,
                download_mbps = r.download_mbps,
                upload_mbps = r.upload_mbps,
                elapsed_secs = r.elapsed_seconds,
                "measurement completed"
            ),
            ExecutionOutcome::Failed(reason) => warn!(%run_id, %reason, "measurement failed"),
            ExecutionOutcome::TimedOut(d) => warn!(
                %run_id,
                deadline_secs = d.as_secs_f64(),
                "measurement timed out; worker abandoned"
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::ProviderMeta;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Stub {
        delay: Duration,
        outcome: Result<RawMeasurement, String>,
        finished: Arc<AtomicBool>,
    }

    impl Stub {
        fn ok(delay: Duration, ping: f64, down: f64, up: f64) -> Self {
            Self {
                delay,
                outcome: Ok(RawMeasurement {
                    ping_ms: ping,
                    download_bps: down,
                    upload_bps: up,
                    server: Some("stub".to_string()),
                }),
                finished: Arc::new(AtomicBool::new(false)),
            }
        }

        fn err(delay: Duration, message: &str) -> Self {
            Self {
                delay,
                outcome: Err(message.to_string()),
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MeasurementProvider for Stub {
        fn meta(&self) -> ProviderMeta {
            ProviderMeta {
                id: "stub",
                display_name: "Stub",
                description: "",
                install_hint: "",
            }
        }

        fn is_available(&self) -> bool {
            true
        }

        fn measure(&self, _req: &MeasurementRequest) -> Result<RawMeasurement, ProviderError> {
            thread::sleep(self.delay);
            self.finished.store(true, Ordering::SeqCst);
            self.outcome.clone().map_err(ProviderError::Other)
        }
    }

    struct Panicking;

    impl MeasurementProvider for Panicking {
        fn meta(&self) -> ProviderMeta {
            ProviderMeta {
                id: "panicking",
                display_name: "Panicking",
                description: "",
                install_hint: "",
            }
        }

        fn is_available(&self) -> bool {
            true
        }

        fn measure(&self, _req: &MeasurementRequest) -> Result<RawMeasurement, ProviderError> {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn test_completed_within_deadline() {
        let exec = BoundedExecutor::new(
            Arc::new(Stub::ok(Duration::from_millis(20), 12.3, 55.1e6, 10.2e6)),
            Duration::from_secs(5),
        );
        match exec.execute().await {
            ExecutionOutcome::Completed(r) => {
                assert_eq!(r.ping, 12.3);
                assert_eq!(r.download_mbps, 55.1);
                assert_eq!(r.upload_mbps, 10.2);
                assert_eq!(r.server_label.as_deref(), Some("stub"));
                assert!(r.elapsed_seconds >= 0.02);
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_error_is_surfaced_verbatim() {
        let exec = BoundedExecutor::new(
            Arc::new(Stub::err(Duration::ZERO, "No servers found near you")),
            Duration::from_secs(5),
        );
        assert_eq!(
            exec.execute().await,
            ExecutionOutcome::Failed("No servers found near you".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly_and_abandons_worker() {
        let stub = Stub::ok(Duration::from_millis(800), 1.0, 1.0, 1.0);
        let finished = Arc::clone(&stub.finished);
        let deadline = Duration::from_millis(100);
        let exec = BoundedExecutor::new(Arc::new(stub), deadline);

        let started = Instant::now();
        let outcome = exec.execute().await;
        let waited = started.elapsed();

        assert_eq!(outcome, ExecutionOutcome::TimedOut(deadline));
        assert!(waited < Duration::from_millis(600), "waited {:?}", waited);
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned worker still runs to completion on its own.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_measurement_is_failure() {
        let exec = BoundedExecutor::new(
            Arc::new(Stub::ok(Duration::ZERO, -5.0, 1.0, 1.0)),
            Duration::from_secs(5),
        );
        match exec.execute().await {
            ExecutionOutcome::Failed(reason) => assert!(reason.starts_with("invalid measurement")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_provider_becomes_failure() {
        let exec = BoundedExecutor::new(Arc::new(Panicking), Duration::from_secs(5));
        assert_eq!(
            exec.execute().await,
            ExecutionOutcome::Failed("measurement worker exited without a result".to_string())
        );
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let slow = BoundedExecutor::new(
            Arc::new(Stub::ok(Duration::from_millis(150), 30.0, 20.0e6, 5.0e6)),
            Duration::from_secs(5),
        );
        let fast = BoundedExecutor::new(
            Arc::new(Stub::ok(Duration::from_millis(10), 10.0, 90.0e6, 40.0e6)),
            Duration::from_secs(5),
        );

        let (a, b) = tokio::join!(slow.execute(), fast.execute());
        match (a, b) {
            (ExecutionOutcome::Completed(a), ExecutionOutcome::Completed(b)) => {
                assert_eq!(a.download_mbps, 20.0);
                assert_eq!(b.download_mbps, 90.0);
            }
            other => panic!("expected two completions, got {:?}", other),
        }
    }
}
