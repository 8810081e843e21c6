//! # Scheduled Worker Example
//!
//! A service `main` built from runlet pieces:
//! - an HTTP-server stand-in with a graceful stop (`WithShutdown`)
//! - a heartbeat every 2 seconds (`WithRepeat`)
//! - a nightly report at 02:30 Europe/Berlin, plus a "cleanup" job every 5 seconds,
//!   both through the `Scheduler` so several replicas would run each tick once
//! - a failure handler that keeps the cleanup job alive on expected errors (`OnError`)
//!
//! Run with `RUST_LOG=runlet=debug cargo run --example scheduled_worker`, stop with Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono_tz::Europe::Berlin;
use runlet::{
    Config, Daily, Every, MemoryLockFactory, MemoryScheduleStore, OsSignals, OnError, Scheduler,
    Scope, TaskError, TaskRef, WithRepeat, WithShutdown,
};

/// Pretends to serve requests until told to stop.
async fn serve(scope: Scope) -> Result<(), TaskError> {
    tracing::info!("server listening on 127.0.0.1:8080");
    scope.cancelled().await;
    Ok(())
}

/// Drains in-flight requests; overrunning the grace window is reported as an error.
async fn drain(scope: Scope) -> Result<(), TaskError> {
    tracing::info!(deadline = ?scope.deadline(), "draining connections");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(300)) => Ok(()),
        _ = scope.cancelled() => Err(TaskError::DeadlineExceeded),
    }
}

#[tokio::main]
async fn main() -> Result<(), TaskError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runlet=info,scheduled_worker=info".into()),
        )
        .init();

    let cfg = Config {
        shutdown_grace: Duration::from_secs(2),
        ..Config::default()
    };

    let server: TaskRef = Arc::new(WithShutdown::new(serve, drain));

    let beats = Arc::new(AtomicU64::new(0));
    let heartbeat: TaskRef = Arc::new(WithRepeat::new(Every(Duration::from_secs(2)), move || {
        let beats = beats.clone();
        async move {
            let n = beats.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(beat = n, "alive");
        }
    }));

    let scheduler = Scheduler::new(
        Arc::new(MemoryLockFactory::new()),
        Arc::new(MemoryScheduleStore::new()),
    );

    let nightly = Daily::new(2, 30, Berlin).map_err(|e| TaskError::fail(e.to_string()))?;
    let report = scheduler.with_schedule("nightly-report", nightly, || async {
        tracing::info!("nightly report sent");
    });

    let runs = Arc::new(AtomicU64::new(0));
    let flaky_cleanup = OnError::new(
        move || {
            let runs = runs.clone();
            async move {
                if runs.fetch_add(1, Ordering::Relaxed) % 3 == 2 {
                    return Err(TaskError::fail("temp dir busy"));
                }
                tracing::info!("temp files removed");
                Ok(())
            }
        },
        |err| {
            tracing::warn!(error = %err, "cleanup skipped");
            Ok(())
        },
    );
    let cleanup = scheduler.with_schedule(
        "cleanup",
        Every(Duration::from_secs(5)),
        Arc::new(flaky_cleanup),
    );

    runlet::run_main_with(
        Scope::new(),
        &cfg,
        Arc::new(OsSignals::new()),
        [server, heartbeat, report, cleanup],
    )
    .await
}
