//! Synchronous tool interface (spec §6): the five named tools
//! `process_learner_model`, `process_knowledge_model`, `track_engagement`,
//! `evaluate_assessment`, `make_transition_decision`. Requests bypass the
//! inbound queue and are bound by the per-tool budgets in spec §4.1.
//!
//! Grounded on the node gateway's `ToolRouter` request/response pairing
//! (`PendingRequest` + `complete_request`), narrowed here to a plain
//! tagged-enum request/response pair since tool dispatch is in-process
//! rather than routed to a remote node.

use ac_domain::model::{
    AdaptationCommand, AssessmentModelInput, EngagementModelInput, KnowledgeModelInput,
    LearnerModelInput, TransitionState,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    ProcessLearnerModel {
        session_id: String,
        input: LearnerModelInput,
    },
    ProcessKnowledgeModel {
        session_id: String,
        input: KnowledgeModelInput,
    },
    TrackEngagement {
        session_id: String,
        input: EngagementModelInput,
    },
    EvaluateAssessment {
        session_id: String,
        input: AssessmentModelInput,
    },
    MakeTransitionDecision {
        session_id: String,
    },
}

impl ToolRequest {
    pub fn session_id(&self) -> &str {
        match self {
            ToolRequest::ProcessLearnerModel { session_id, .. }
            | ToolRequest::ProcessKnowledgeModel { session_id, .. }
            | ToolRequest::TrackEngagement { session_id, .. }
            | ToolRequest::EvaluateAssessment { session_id, .. }
            | ToolRequest::MakeTransitionDecision { session_id } => session_id,
        }
    }

    /// Per-tool latency budget in milliseconds (spec §4.1): 100ms for the
    /// learner/knowledge/engagement models, 200ms for assessment, 500ms for
    /// the full decision bundle.
    pub fn budget_ms(&self) -> u64 {
        match self {
            ToolRequest::MakeTransitionDecision { .. } => 500,
            ToolRequest::EvaluateAssessment { .. } => 200,
            _ => 100,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::ProcessLearnerModel { .. } => "process_learner_model",
            ToolRequest::ProcessKnowledgeModel { .. } => "process_knowledge_model",
            ToolRequest::TrackEngagement { .. } => "track_engagement",
            ToolRequest::EvaluateAssessment { .. } => "evaluate_assessment",
            ToolRequest::MakeTransitionDecision { .. } => "make_transition_decision",
        }
    }
}

/// A single Signal Extractor's output (spec §4.3): the normalised signal
/// value, the weight it was assigned, and whether any input fell back to
/// the 0.5 default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalResult {
    pub value: f64,
    pub weight: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolResponse {
    ProcessLearnerModel {
        session_id: String,
        signal: SignalResult,
    },
    ProcessKnowledgeModel {
        session_id: String,
        signal: SignalResult,
    },
    TrackEngagement {
        session_id: String,
        signal: SignalResult,
    },
    EvaluateAssessment {
        session_id: String,
        signal: SignalResult,
    },
    MakeTransitionDecision {
        session_id: String,
        transition: TransitionState,
        commands: Vec<AdaptationCommand>,
    },
    Error {
        code: String,
        message: String,
    },
}
