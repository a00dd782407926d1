use serde::Serialize;

/// Structured trace events emitted across the adaptation core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        learner_id: String,
        is_new: bool,
    },
    SessionReset {
        session_id: String,
        reason: String,
    },
    SessionClosed {
        session_id: String,
        total_events: u64,
        adaptations_out: u64,
    },
    TransitionComputed {
        session_id: String,
        value: f64,
        confidence: f64,
        stability: f64,
        degraded: bool,
    },
    CommandEmitted {
        session_id: String,
        sequence: u64,
        kind: String,
    },
    LatencyViolation {
        session_id: Option<String>,
        op: String,
        budget_ms: u64,
        observed_ms: u64,
    },
    AuditWritten {
        sequence: u64,
        event_kind: String,
        success: bool,
    },
    LearnerAnonymised {
        learner_id_hash: String,
    },
    PersistenceRetry {
        session_id: String,
        attempt: u32,
        delay_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "adaptation_core_event");
    }
}
