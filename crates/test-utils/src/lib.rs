pub mod builders;
pub mod fake_process;
pub mod recording_display;

use std::sync::{Arc, Once};
use std::time::Duration;

use rendertrack::clock::mock::ManualClock;
use rendertrack::engine::SupervisorHandle;
use rendertrack::registry::{RegistryOptions, TaskRegistry};
use rendertrack::task::TaskRow;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Registry driven by a hand-advanced clock.
pub fn manual_registry(options: RegistryOptions) -> (TaskRegistry, ManualClock) {
    let clock = ManualClock::new();
    let registry = TaskRegistry::with_clock(options, Arc::new(clock.clone()));
    (registry, clock)
}

/// Poll the supervisor until the row of `task` satisfies `pred`.
///
/// Panics after 5 seconds.
pub async fn wait_for_row<F>(handle: &SupervisorHandle, task: &str, pred: F) -> TaskRow
where
    F: Fn(&TaskRow) -> bool,
{
    with_timeout(async {
        loop {
            let rows = handle.snapshot().await.expect("supervisor is gone");
            if let Some(row) = rows.into_iter().find(|r| r.id == task) {
                if pred(&row) {
                    return row;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
