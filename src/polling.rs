// Polling session: one ticking loop per active test. Each tick samples the probe and hands
// the snapshot to the sink; ticks run inline in the loop so two writes for one test never overlap.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::error::Error;
use crate::models::Snapshot;
use crate::probe::MetricsProbe;
use crate::sink::SnapshotSink;

/// Probe and sink shared by every session.
#[derive(Clone)]
pub struct PollingDeps {
    pub probe: Arc<dyn MetricsProbe>,
    pub sink: Arc<dyn SnapshotSink>,
}

#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    pub sample_interval_ms: u64,
    /// Consecutive uncommitted ticks before the session ends itself.
    pub max_failed_ticks: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2000,
            max_failed_ticks: 3,
        }
    }
}

/// Why a session's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// Stopped by its owner.
    Cancelled,
    /// Liveness check failed.
    StoreUnreachable(String),
    /// Gave up after this many consecutive uncommitted ticks.
    WriteFailures(u32),
    /// Did not stop within the join timeout, or panicked.
    Aborted,
}

pub struct PollingSession {
    test_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<SessionExit>,
}

impl PollingSession {
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// The loop has returned, whether stopped or self-terminated.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the loop to end. Safe to call any number of times, never blocks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels and waits for the loop. No tick writes after this returns.
    pub async fn stop(self, timeout: Duration) -> SessionExit {
        self.cancel.cancel();
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => exit_of(joined),
            Err(_) => {
                warn!(test_id = %self.test_id, ?timeout, "session did not stop in time; aborting");
                handle.abort();
                let _ = handle.await;
                SessionExit::Aborted
            }
        }
    }

    /// Waits for a loop that has ended (or will end) on its own.
    pub async fn join(self) -> SessionExit {
        exit_of(self.handle.await)
    }
}

fn exit_of(joined: Result<SessionExit, tokio::task::JoinError>) -> SessionExit {
    joined.unwrap_or_else(|e| {
        warn!(error = %e, "session task failed");
        SessionExit::Aborted
    })
}

/// Starts polling for `test_id`. The first tick fires one interval after the liveness check.
pub fn spawn(test_id: &str, deps: PollingDeps, config: PollingConfig) -> PollingSession {
    let cancel = CancellationToken::new();
    let span = tracing::info_span!("session", test_id, sink = deps.sink.name());
    let handle = tokio::spawn(run(test_id.to_string(), deps, config, cancel.clone()).instrument(span));
    PollingSession {
        test_id: test_id.to_string(),
        cancel,
        handle,
    }
}

async fn run(
    test_id: String,
    deps: PollingDeps,
    config: PollingConfig,
    cancel: CancellationToken,
) -> SessionExit {
    let PollingDeps { probe, sink } = deps;
    let PollingConfig {
        sample_interval_ms,
        max_failed_ticks,
    } = config;

    if let Err(e) = sink.check_liveness().await {
        let err = Error::from(e);
        warn!(error = %err, operation = "check_liveness", "store not reachable; session not started");
        return SessionExit::StoreUnreachable(err.to_string());
    }
    info!(sample_interval_ms, "session started");

    let period = Duration::from_millis(sample_interval_ms);
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut ticks: u64 = 0;
    let mut failed_in_row: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(ticks, "session stopped");
                return SessionExit::Cancelled;
            }
            _ = tick.tick() => {}
        }

        let snapshot = match probe.sample().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, operation = "sample", "probe unavailable; empty snapshot this tick");
                Snapshot::empty()
            }
        };
        // A stop that arrived while sampling wins over the write.
        if cancel.is_cancelled() {
            info!(ticks, "session stopped");
            return SessionExit::Cancelled;
        }

        let report = sink.write(&test_id, &snapshot).await;
        ticks += 1;
        if report.committed {
            failed_in_row = 0;
            debug!(
                tick = ticks,
                written = report.succeeded(),
                skipped = report.failures.len(),
                "tick folded"
            );
            continue;
        }

        failed_in_row += 1;
        if report.unreachable()
            && let Err(e) = sink.check_liveness().await
        {
            let err = Error::from(e);
            warn!(error = %err, operation = "check_liveness", "store lost; session ending");
            return SessionExit::StoreUnreachable(err.to_string());
        }
        if failed_in_row >= max_failed_ticks {
            warn!(failed_in_row, "too many failed ticks; session ending");
            return SessionExit::WriteFailures(failed_in_row);
        }
        warn!(failed_in_row, max_failed_ticks, "tick not committed");
    }
}
