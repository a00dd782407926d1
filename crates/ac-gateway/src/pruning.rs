//! Background sweeps (spec §4.6, §5): close sessions idle past
//! `pipeline.session_idle_timeout_minutes`, release stale registry slots,
//! and periodically flush the append-only stores to disk.

use std::time::Duration;

use ac_domain::model::{AccessLevel, PerformanceMetricRow, RowMetadata};
use ac_sessions::IdleMonitor;

use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the periodic sweep task. Runs for the lifetime of the process;
/// the returned handle is not awaited, just kept so the caller can decide
/// whether to abort it on shutdown.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: AppState) {
    let monitor = IdleMonitor::new(state.config.pipeline.session_idle_timeout_minutes);
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        ticker.tick().await;
        sweep_idle_sessions(&state, &monitor);
        state.registry.prune_idle();
        snapshot_metrics(&state);
        flush_stores(&state);
    }
}

/// Roll the Clock & Deadline Service's rolling windows (spec §4.1) into
/// `performance_metrics` rows, one p95 sample per operation class that has
/// observed at least one latency this process.
fn snapshot_metrics(state: &AppState) {
    let now = chrono::Utc::now();
    for sample in state.metrics.snapshot() {
        let Some(p95) = sample.p95 else { continue };
        state.performance_store.insert(PerformanceMetricRow {
            metric_id: uuid::Uuid::new_v4().to_string(),
            server_id: state.config.server.name.clone(),
            metric_type: format!("p95_{}_ms", sample.op.label()),
            value: p95.as_secs_f64() * 1000.0,
            timestamp: now,
            metadata: RowMetadata {
                data_type: "performance_metric".into(),
                access_level: AccessLevel::Public,
                retention_until: None,
            },
        });
    }
}

fn sweep_idle_sessions(state: &AppState, monitor: &IdleMonitor) {
    let now = chrono::Utc::now();
    for session in state.session_store.list() {
        if !monitor.is_idle(&session, now) {
            continue;
        }
        if let Some(handle) = state.pipelines.get(&session.session_id) {
            tracing::info!(session_id = %session.session_id, "draining idle session");
            handle.request_drain();
        }
    }
}

fn flush_stores(state: &AppState) {
    if let Err(e) = state.session_store.flush() {
        tracing::warn!(error = %e, "failed to flush session store");
    }
    if let Err(e) = state.learner_store.flush() {
        tracing::warn!(error = %e, "failed to flush learner store");
    }
    if let Err(e) = state.assessment_store.flush() {
        tracing::warn!(error = %e, "failed to flush assessment store");
    }
    if let Err(e) = state.engagement_store.flush() {
        tracing::warn!(error = %e, "failed to flush engagement store");
    }
    if let Err(e) = state.performance_store.flush() {
        tracing::warn!(error = %e, "failed to flush performance store");
    }
}
