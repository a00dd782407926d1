use serde::{Deserialize, Serialize};

/// Session Pipeline & concurrency-model knobs (spec §4.6, §5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cap on active sessions (spec §5 default 64).
    #[serde(default = "d_max_learners")]
    pub max_concurrent_learners: usize,
    #[serde(default = "d_idle_minutes")]
    pub session_idle_timeout_minutes: u32,
    #[serde(default = "d_queue_cap")]
    pub inbound_queue_capacity: usize,
    #[serde(default = "d_calc_budget")]
    pub calculator_budget_ms: u64,
    #[serde(default = "d_e2e_budget")]
    pub end_to_end_budget_ms: u64,
    /// Drain grace deadline on cancellation/shutdown (spec §4.6 default 2s).
    #[serde(default = "d_drain_grace")]
    pub drain_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_learners: d_max_learners(),
            session_idle_timeout_minutes: d_idle_minutes(),
            inbound_queue_capacity: d_queue_cap(),
            calculator_budget_ms: d_calc_budget(),
            end_to_end_budget_ms: d_e2e_budget(),
            drain_grace_ms: d_drain_grace(),
        }
    }
}

fn d_max_learners() -> usize {
    64
}
fn d_idle_minutes() -> u32 {
    60
}
fn d_queue_cap() -> usize {
    64
}
fn d_calc_budget() -> u64 {
    10
}
fn d_e2e_budget() -> u64 {
    25
}
fn d_drain_grace() -> u64 {
    2_000
}
