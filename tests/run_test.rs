//! End-to-end behaviour of `AppState::run_test` against stub providers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use speedsite::api::error::ApiError;
use speedsite::api::state::AppState;
use speedsite::executor::BoundedExecutor;
use speedsite::history::{HistoryEntry, HistoryStore};
use speedsite::measurement::{
    MeasurementProvider, MeasurementRequest, MeasurementResult, ProviderError, ProviderMeta,
    RawMeasurement,
};
use speedsite::report::{self, TimestampFormat};

struct Stub {
    delay: Duration,
    outcome: Result<RawMeasurement, &'static str>,
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
        std::thread::sleep(self.delay);
        self.outcome
            .clone()
            .map_err(|msg| ProviderError::Other(msg.to_string()))
    }
}

fn raw(ping: f64, down: f64, up: f64) -> RawMeasurement {
    RawMeasurement {
        ping_ms: ping,
        download_bps: down,
        upload_bps: up,
        server: None,
    }
}

fn executor(delay: Duration, outcome: Result<RawMeasurement, &'static str>, deadline: Duration) -> BoundedExecutor {
    BoundedExecutor::new(Arc::new(Stub { delay, outcome }), deadline)
}

fn app(exec: BoundedExecutor, capacity: usize) -> AppState {
    AppState::new(exec, HistoryStore::new(capacity), TimestampFormat::Clock)
}

#[tokio::test]
async fn successful_run_converts_units_and_appends_once() {
    let state = app(
        executor(Duration::ZERO, Ok(raw(12.3, 55.1e6, 10.2e6)), Duration::from_secs(5)),
        10,
    );

    let entry = state.run_test().await.unwrap();
    assert_eq!(entry.result.ping, 12.3);
    assert_eq!(entry.result.download_mbps, 55.1);
    assert_eq!(entry.result.upload_mbps, 10.2);
    assert_eq!(entry.timestamp.len(), "HH:MM:SS".len());

    assert_eq!(state.history.all(), vec![entry]);
}

#[tokio::test]
async fn failing_provider_leaves_history_unchanged() {
    let state = app(
        executor(Duration::ZERO, Err("Unable to connect to servers to test latency."), Duration::from_secs(5)),
        10,
    );

    match state.run_test().await {
        Err(ApiError::Measurement(reason)) => {
            assert_eq!(reason, "Unable to connect to servers to test latency.")
        }
        other => panic!("expected measurement error, got {:?}", other),
    }
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn slow_provider_times_out_within_deadline() {
    let deadline = Duration::from_millis(200);
    let state = app(
        executor(Duration::from_secs(2), Ok(raw(1.0, 1.0e6, 1.0e6)), deadline),
        10,
    );

    let started = Instant::now();
    let outcome = state.run_test().await;
    let waited = started.elapsed();

    assert!(matches!(outcome, Err(ApiError::Timeout { .. })));
    assert!(waited >= deadline);
    assert!(waited < deadline + Duration::from_millis(500), "waited {:?}", waited);
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn late_result_never_reaches_history() {
    let state = app(
        executor(Duration::from_millis(300), Ok(raw(1.0, 1.0e6, 1.0e6)), Duration::from_millis(50)),
        10,
    );

    assert!(state.run_test().await.is_err());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(state.history.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_append_both_results() {
    let history = Arc::new(HistoryStore::new(10));
    let slow = AppState {
        executor: Arc::new(executor(
            Duration::from_millis(200),
            Ok(raw(30.0, 20.0e6, 5.0e6)),
            Duration::from_secs(5),
        )),
        history: Arc::clone(&history),
        timestamp_format: TimestampFormat::Clock,
    };
    let fast = AppState {
        executor: Arc::new(executor(
            Duration::from_millis(20),
            Ok(raw(10.0, 90.0e6, 40.0e6)),
            Duration::from_secs(5),
        )),
        history: Arc::clone(&history),
        timestamp_format: TimestampFormat::Clock,
    };

    let (a, b) = tokio::join!(
        tokio::spawn(async move { slow.run_test().await }),
        tokio::spawn(async move { fast.run_test().await }),
    );
    let slow_entry = a.unwrap().unwrap();
    let fast_entry = b.unwrap().unwrap();
    assert_eq!(slow_entry.result.download_mbps, 20.0);
    assert_eq!(fast_entry.result.download_mbps, 90.0);

    // Appended in completion order: the fast run finishes first.
    let all = history.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], fast_entry);
    assert_eq!(all[1], slow_entry);
}

#[tokio::test]
async fn history_keeps_only_the_newest_entries() {
    let state = app(
        executor(Duration::ZERO, Ok(raw(5.0, 50.0e6, 5.0e6)), Duration::from_secs(5)),
        3,
    );
    for _ in 0..7 {
        state.run_test().await.unwrap();
    }
    assert_eq!(state.history.len(), 3);
}

#[test]
fn csv_export_has_header_and_rows_in_insertion_order() {
    let store = HistoryStore::new(10);
    let result = |down: f64| MeasurementResult {
        ping: 10.0,
        download_mbps: down,
        upload_mbps: 5.0,
        server_label: None,
        elapsed_seconds: 20.0,
    };
    store.append(HistoryEntry::new(result(100.0), "t1".to_string()));
    store.append(HistoryEntry::new(result(200.0), "t2".to_string()));

    let csv = report::history_csv(&store.all());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], report::CSV_HEADER);
    assert_eq!(lines[1], "t1,10,100,5");
    assert_eq!(lines[2], "t2,10,200,5");
}
