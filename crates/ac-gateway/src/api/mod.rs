pub mod auth;
pub mod health;
pub mod tools;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required — just the
/// liveness probe) and **protected** (gated behind the bearer-token
/// middleware): the duplex learner transport and the five named tools.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/healthz", get(health::health));

    let protected = Router::new()
        .route("/v1/learners/ws", get(crate::ws::learner_ws))
        .route("/v1/tools/process_learner_model", post(tools::process_learner_model))
        .route("/v1/tools/process_knowledge_model", post(tools::process_knowledge_model))
        .route("/v1/tools/track_engagement", post(tools::track_engagement))
        .route("/v1/tools/evaluate_assessment", post(tools::evaluate_assessment))
        .route("/v1/tools/make_transition_decision", post(tools::make_transition_decision))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected)
}
