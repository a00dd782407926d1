//! Duplex learner transport (spec §6): one WebSocket per active session —
//! `connect` / `connection_established`, `learning_data` /
//! `adaptation_response`, `adaptation_request`, `disconnect` /
//! `disconnection_confirmed`, `error`.
//!
//! Adapted from the node gateway's `nodes/ws.rs`: `WebSocketUpgrade` →
//! wait for the first frame (here `connect` instead of `node_hello`) →
//! split into a writer task draining an outbound channel and a reader
//! loop dispatching inbound frames, torn down together on disconnect.
//! The node gateway forwarded one outbound channel straight from a remote
//! peer; here two feed the same writer — the fanout's per-decision
//! [`ChannelSink`] stream and direct replies this handler produces itself
//! (`connection_established`, `error`, request/response `adaptation_request`
//! replies, `disconnection_confirmed`).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use ac_domain::model::{
    AgeBucket, AuditEventKind, DynamicStats, GuidancePreference, InteractionStyle, LearnerProfile,
    LearnerRecord, PriorKnowledgeLevel, SessionConfiguration,
};
use ac_pipeline::{ChannelSink, ConnectRequest, InboundEvent, PipelineOutbound};
use ac_protocol::tools::ToolRequest;
use ac_protocol::transport::WsMessage;

use crate::state::AppState;

pub async fn learner_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (learner_id, channel, configuration) = loop {
        let Some(Ok(msg)) = receiver.next().await else { return };
        let Message::Text(text) = msg else { continue };
        match serde_json::from_str::<WsMessage>(&text) {
            Ok(WsMessage::Connect { learner_id, channel, configuration, .. }) => {
                break (learner_id, channel, configuration.unwrap_or_else(default_configuration));
            }
            Ok(_) => {
                let err = WsMessage::Error {
                    code: "invalid_action".into(),
                    message: "expected connect as the first frame".into(),
                    session_id: None,
                };
                if send(&mut sender, &err).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let err = WsMessage::Error {
                    code: "invalid_action".into(),
                    message: format!("malformed frame: {e}"),
                    session_id: None,
                };
                if send(&mut sender, &err).await.is_err() {
                    return;
                }
            }
        }
    };

    let (profile, dynamic_stats) = resolve_learner(&state, &learner_id);

    let (command_tx, mut command_rx) =
        mpsc::channel::<PipelineOutbound>(state.config.pipeline.inbound_queue_capacity);
    let sink = ChannelSink::new(command_tx);

    let outcome = match state.pipelines.connect(
        ConnectRequest {
            learner_id: learner_id.clone(),
            channel: channel.clone(),
            configuration,
            profile,
            dynamic_stats,
        },
        sink,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            let err = WsMessage::Error { code: e.code().into(), message: e.to_string(), session_id: None };
            let _ = send(&mut sender, &err).await;
            return;
        }
    };

    let _ = state.audit.record(
        Some(outcome.session_id.clone()),
        Some(learner_id.clone()),
        AuditEventKind::Access,
        true,
        serde_json::json!({ "action": "connect", "channel": channel }),
    );

    let established = WsMessage::ConnectionEstablished {
        session_id: outcome.session_id.clone(),
        learner_id: learner_id.clone(),
        is_new_session: outcome.is_new_session,
        current_event: outcome.current_event,
        progress: outcome.progress,
        server_time: chrono::Utc::now(),
    };
    if send(&mut sender, &established).await.is_err() {
        return;
    }

    let session_id = outcome.session_id;
    let (direct_tx, mut direct_rx) = mpsc::channel::<WsMessage>(8);

    let writer_state = state.clone();
    let writer_session_id = session_id.clone();
    let writer = tokio::spawn(async move {
        // §4.6: three consecutive failed transport writes force the session
        // into a drain rather than leaving it queuing into a dead socket.
        let mut consecutive_failures = 0u32;
        loop {
            tokio::select! {
                outbound = command_rx.recv() => {
                    let Some(outbound) = outbound else { break };
                    let msg = match outbound {
                        PipelineOutbound::Command(command) => WsMessage::AdaptationResponse {
                            session_id: command.session_id.clone(),
                            request_id: None,
                            commands: vec![command],
                        },
                        PipelineOutbound::Error { code, message } => WsMessage::Error {
                            code,
                            message,
                            session_id: Some(writer_session_id.clone()),
                        },
                    };
                    if send(&mut sender, &msg).await.is_err() {
                        consecutive_failures += 1;
                        if consecutive_failures >= 3 {
                            if let Some(handle) = writer_state.pipelines.get(&writer_session_id) {
                                handle.request_drain();
                            }
                            break;
                        }
                    } else {
                        consecutive_failures = 0;
                    }
                }
                msg = direct_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let is_final = matches!(msg, WsMessage::DisconnectionConfirmed { .. });
                    let _ = send(&mut sender, &msg).await;
                    if is_final {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<WsMessage>(&text) {
            Ok(WsMessage::LearningData { session_id: sid, snapshot }) if sid == session_id => {
                if let Some(handle) = state.pipelines.get(&session_id) {
                    let (profile, dynamic_stats) = resolve_learner(&state, &learner_id);
                    let event = InboundEvent { snapshot, profile, dynamic_stats };
                    if handle.push_event(event).is_err() {
                        let busy = WsMessage::Error {
                            code: "busy".into(),
                            message: "inbound queue full, try again shortly".into(),
                            session_id: Some(session_id.clone()),
                        };
                        if direct_tx.send(busy).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(WsMessage::AdaptationRequest { session_id: sid, request_id }) if sid == session_id => {
                let response = state
                    .router
                    .dispatch(ToolRequest::MakeTransitionDecision { session_id: session_id.clone() })
                    .await;
                let reply = match response {
                    ac_protocol::tools::ToolResponse::MakeTransitionDecision { session_id, commands, .. } => {
                        WsMessage::AdaptationResponse { session_id, request_id: Some(request_id), commands }
                    }
                    ac_protocol::tools::ToolResponse::Error { code, message } => {
                        WsMessage::Error { code, message, session_id: Some(session_id.clone()) }
                    }
                    _ => continue,
                };
                if direct_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Disconnect { session_id: sid, .. }) if sid == session_id => {
                if let Some(handle) = state.pipelines.get(&session_id) {
                    handle.request_drain();
                }
                let summary = await_close(&state, &session_id).await;
                let _ = direct_tx.send(WsMessage::DisconnectionConfirmed { summary }).await;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "malformed inbound frame");
            }
        }
    }

    drop(direct_tx);
    let _ = writer.await;
}

/// Wait (bounded by the pipeline's drain grace period) for the session's
/// consumer loop to finish closing, then report what the store last saw.
/// The consumer removes the session from the store as its very last step,
/// so a snapshot taken once the pipeline handle disappears reflects the
/// final counters closely enough for a summary frame.
async fn await_close(state: &AppState, session_id: &str) -> ac_domain::model::SessionSummary {
    let last_known = state.session_store.get(session_id);
    let deadline = tokio::time::Instant::now()
        + std::time::Duration::from_millis(state.config.pipeline.drain_grace_ms + 500);
    while state.pipelines.get(session_id).is_some() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    let record = state.session_store.get(session_id).or(last_known);
    let now = chrono::Utc::now();
    match record {
        Some(rec) => ac_domain::model::SessionSummary {
            session_id: rec.session_id,
            learner_id: rec.learner_id,
            started_at: rec.created_at,
            ended_at: now,
            total_events: rec.counters.events_in,
            adaptations_out: rec.counters.adaptations_out,
            help_requests: rec.counters.help_requests,
            final_event: rec.current_event,
            final_progress: rec.progress,
        },
        None => ac_domain::model::SessionSummary {
            session_id: session_id.to_string(),
            learner_id: String::new(),
            started_at: now,
            ended_at: now,
            total_events: 0,
            adaptations_out: 0,
            help_requests: 0,
            final_event: ac_domain::model::LearningEvent::Onboarding,
            final_progress: 0.0,
        },
    }
}

async fn send(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).unwrap_or_default();
    sender.send(Message::Text(text)).await
}

/// A learner's first `connect` for a never-seen `learner_id` carries no
/// profile/stats (spec §6 only shows `configuration` as optional on
/// `connect`) — fall back to a neutral profile and persist it, same
/// defaults the tool-only path uses (`ac_pipeline::fanout`).
fn resolve_learner(state: &AppState, learner_id: &str) -> (LearnerProfile, DynamicStats) {
    if let Some(record) = state.learner_store.get(learner_id) {
        return (record.profile, record.dynamic_stats);
    }

    let profile = LearnerProfile {
        age_bucket: AgeBucket::From25To34,
        region: "unspecified".into(),
        education_tier: "unspecified".into(),
        guidance_preference: GuidancePreference::Balanced,
        interaction_style: InteractionStyle::Mixed,
        extra: Default::default(),
    };
    let dynamic_stats = DynamicStats {
        prior_knowledge_level: PriorKnowledgeLevel::Intermediate,
        pace: 0.0,
        engagement_trend: 0.0,
        environmental_sensitivity: 0.5,
        extra: Default::default(),
    };

    if state.config.compliance.anonymisation_enabled {
        let secret = std::env::var(&state.config.persistence.encryption_key_env).unwrap_or_default();
        let anonymised_id = ac_sessions::anonymise_learner_id(learner_id, secret.as_bytes());
        state.learner_store.upsert(LearnerRecord {
            learner_id: learner_id.to_string(),
            anonymised_id,
            profile: profile.clone(),
            dynamic_stats: dynamic_stats.clone(),
        });
    }

    (profile, dynamic_stats)
}

fn default_configuration() -> SessionConfiguration {
    SessionConfiguration {
        learning_domain: "general".into(),
        target_learning_event: ac_domain::model::LearningEvent::Mastery,
        adaptation_sensitivity: ac_domain::model::AdaptationSensitivity::Medium,
        difficulty: 0.5,
        support_level: "standard".into(),
    }
}
