//! `GET /healthz` — liveness only (spec E.8): no dependency checks, just
//! confirmation the process is up and serving.

use axum::response::{IntoResponse, Json};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
