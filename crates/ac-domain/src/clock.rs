//! Clock & Deadline Service (spec §4.1).
//!
//! Supplies monotonic timestamps, wraps units of work with a deadline, and
//! records observed latency per operation class in a bounded ring buffer.
//! Breaching a budget never aborts a session; the pipeline logs a
//! [`crate::trace::TraceEvent::LatencyViolation`] and continues.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Operation classes named by the budget table in spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    CalculatorStep,
    EndToEnd,
    ToolLearnerModel,
    ToolKnowledgeModel,
    ToolEngagement,
    ToolAssessment,
    ToolTransitionDecision,
}

impl OpClass {
    /// Default budget in milliseconds, overridable via [`crate::config::Config`].
    pub fn default_budget_ms(self) -> u64 {
        match self {
            OpClass::CalculatorStep => 10,
            OpClass::EndToEnd => 25,
            OpClass::ToolLearnerModel => 100,
            OpClass::ToolKnowledgeModel => 100,
            OpClass::ToolEngagement => 100,
            OpClass::ToolAssessment => 200,
            OpClass::ToolTransitionDecision => 500,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OpClass::CalculatorStep => "calculator_step",
            OpClass::EndToEnd => "end_to_end",
            OpClass::ToolLearnerModel => "tool_process_learner_model",
            OpClass::ToolKnowledgeModel => "tool_process_knowledge_model",
            OpClass::ToolEngagement => "tool_track_engagement",
            OpClass::ToolAssessment => "tool_evaluate_assessment",
            OpClass::ToolTransitionDecision => "tool_make_transition_decision",
        }
    }
}

/// Monotonic time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    pub fn new() -> Self {
        Self
    }

    /// A monotonic instant usable for measuring elapsed durations.
    pub fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A single budget attached to a unit of work.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    op: OpClass,
    budget: Duration,
    started: Instant,
}

impl Deadline {
    pub fn start(op: OpClass, budget_ms: u64) -> Self {
        Self {
            op,
            budget: Duration::from_millis(budget_ms),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn op(&self) -> OpClass {
        self.op
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `fut` under this deadline. Returns `Err(DeadlineExceeded)` if it
    /// does not complete within budget; the caller decides what to do with
    /// that (log + continue — never abort the session).
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        match tokio::time::timeout(self.budget, fut).await {
            Ok(v) => Ok(v),
            Err(_) => Err(Error::DeadlineExceeded {
                op: self.op.label().to_string(),
                budget_ms: self.budget.as_millis() as u64,
            }),
        }
    }

    /// Whether the already-elapsed time has breached the budget (for
    /// synchronous work that can't be wrapped in `run`, e.g. the
    /// calculator).
    pub fn breached(&self) -> bool {
        self.elapsed() > self.budget
    }
}

/// A bounded-size ring buffer of latency observations for one operation
/// class, used to compute percentiles for the performance properties in
/// spec §8.
#[derive(Debug)]
pub struct LatencyHistogram {
    capacity: usize,
    samples: VecDeque<Duration>,
}

impl LatencyHistogram {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn observe(&mut self, latency: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Nearest-rank percentile (`p` in `0.0..=1.0`) over the current window.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p.clamp(0.0, 1.0)).round() as usize;
        sorted.get(idx).copied()
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(0.95)
    }
}

/// One row of [`DeadlineMetrics::snapshot`]: the rolling-window state for
/// one operation class.
#[derive(Debug, Clone, Copy)]
pub struct LatencySnapshot {
    pub op: OpClass,
    pub count: usize,
    pub p50: Option<Duration>,
    pub p95: Option<Duration>,
}

/// Shared `observe(op, latency)` sink named by the Clock & Deadline
/// Service's contract (spec §4.1): one bounded ring buffer per operation
/// class, behind a single lock since observations land from every active
/// session's consumer task. `ac-gateway`'s background sweep periodically
/// reads [`DeadlineMetrics::snapshot`] into the `performance_metrics`
/// persistence table (spec §6) to back the §8 p95 latency properties.
pub struct DeadlineMetrics {
    capacity: usize,
    histograms: Mutex<HashMap<OpClass, LatencyHistogram>>,
}

impl DeadlineMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            histograms: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, op: OpClass, latency: Duration) {
        self.histograms
            .lock()
            .entry(op)
            .or_insert_with(|| LatencyHistogram::new(self.capacity))
            .observe(latency);
    }

    /// One row per operation class that has observed at least one sample.
    pub fn snapshot(&self) -> Vec<LatencySnapshot> {
        self.histograms
            .lock()
            .iter()
            .map(|(op, hist)| LatencySnapshot {
                op: *op,
                count: hist.len(),
                p50: hist.percentile(0.50),
                p95: hist.p95(),
            })
            .collect()
    }
}

impl Default for DeadlineMetrics {
    fn default() -> Self {
        Self::new(1024)
    }
}
