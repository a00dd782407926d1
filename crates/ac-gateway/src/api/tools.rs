//! Synchronous tool interface (spec §6) — one HTTP endpoint per named
//! tool, each dispatching through [`ac_pipeline::ToolRequestRouter`]
//! rather than touching a session's pipeline directly.
//!
//! - `POST /v1/tools/process_learner_model`
//! - `POST /v1/tools/process_knowledge_model`
//! - `POST /v1/tools/track_engagement`
//! - `POST /v1/tools/evaluate_assessment`
//! - `POST /v1/tools/make_transition_decision`

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use ac_protocol::tools::ToolRequest;

use crate::state::AppState;

async fn dispatch(state: &AppState, request: ToolRequest) -> impl IntoResponse {
    Json(state.router.dispatch(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LearnerModelBody {
    session_id: String,
    input: ac_domain::model::LearnerModelInput,
}

pub async fn process_learner_model(
    State(state): State<AppState>,
    Json(body): Json<LearnerModelBody>,
) -> impl IntoResponse {
    dispatch(
        &state,
        ToolRequest::ProcessLearnerModel { session_id: body.session_id, input: body.input },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeModelBody {
    session_id: String,
    input: ac_domain::model::KnowledgeModelInput,
}

pub async fn process_knowledge_model(
    State(state): State<AppState>,
    Json(body): Json<KnowledgeModelBody>,
) -> impl IntoResponse {
    dispatch(
        &state,
        ToolRequest::ProcessKnowledgeModel { session_id: body.session_id, input: body.input },
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct EngagementBody {
    session_id: String,
    input: ac_domain::model::EngagementModelInput,
}

pub async fn track_engagement(
    State(state): State<AppState>,
    Json(body): Json<EngagementBody>,
) -> impl IntoResponse {
    dispatch(&state, ToolRequest::TrackEngagement { session_id: body.session_id, input: body.input }).await
}

#[derive(Debug, Deserialize)]
pub struct AssessmentBody {
    session_id: String,
    input: ac_domain::model::AssessmentModelInput,
}

pub async fn evaluate_assessment(
    State(state): State<AppState>,
    Json(body): Json<AssessmentBody>,
) -> impl IntoResponse {
    dispatch(&state, ToolRequest::EvaluateAssessment { session_id: body.session_id, input: body.input }).await
}

#[derive(Debug, Deserialize)]
pub struct SessionOnlyBody {
    session_id: String,
}

pub async fn make_transition_decision(
    State(state): State<AppState>,
    Json(body): Json<SessionOnlyBody>,
) -> impl IntoResponse {
    dispatch(&state, ToolRequest::MakeTransitionDecision { session_id: body.session_id }).await
}
