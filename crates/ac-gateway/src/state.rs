//! Shared application state handed to every axum handler.
//!
//! Narrowed from the node gateway's ~20-field `AppState` (memory, LLM
//! providers, skills, MCP, agents, import staging, ...) down to the
//! handful of services the adaptation core actually needs: the session
//! pipeline manager, the four persistence tables, and the cached API
//! token digest.

use std::sync::Arc;

use ac_domain::clock::DeadlineMetrics;
use ac_domain::config::Config;
use ac_persist::{AssessmentStore, AuditSink, EngagementStore, LearnerStore, PerformanceStore};
use ac_pipeline::{SessionPipelines, ToolRequestRouter};
use ac_sessions::{LearnerRegistry, SessionStore};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config, learner registry, session pipelines
/// - **Persistence** — the four tables `ac-persist` owns
/// - **Security** — the cached API token digest
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub registry: Arc<LearnerRegistry>,
    pub session_store: Arc<SessionStore>,
    pub pipelines: Arc<SessionPipelines>,
    pub router: Arc<ToolRequestRouter>,

    // ── Persistence ───────────────────────────────────────────────────
    pub audit: Arc<AuditSink>,
    pub learner_store: Arc<LearnerStore>,
    pub assessment_store: Arc<AssessmentStore>,
    pub engagement_store: Arc<EngagementStore>,
    pub performance_store: Arc<PerformanceStore>,

    /// Rolling per-`OpClass` latency windows (spec §4.1), fed by every
    /// session's consumer loop and periodically snapshotted into
    /// `performance_store` by [`crate::pruning`].
    pub metrics: Arc<DeadlineMetrics>,

    // ── Security (startup-computed) ──────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
