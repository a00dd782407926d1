//! Duplex learner transport (spec §6): `connect` / `connection_established`,
//! `learning_data` / `adaptation_response`, `adaptation_request`,
//! `disconnect` / `disconnection_confirmed`, `error`.
//!
//! Mirrors the node WebSocket envelope's `#[serde(tag = "type")]` shape but
//! carries the adaptation core's own message kinds.

use ac_domain::model::{AdaptationCommand, InteractionSnapshot, SessionConfiguration, SessionSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Learner → Gateway: open a session.
    #[serde(rename = "connect")]
    Connect {
        learner_id: String,
        channel: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        configuration: Option<SessionConfiguration>,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_token: Option<String>,
    },

    /// Gateway → Learner: session resolved (new or resumed).
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        session_id: String,
        learner_id: String,
        is_new_session: bool,
        current_event: ac_domain::model::LearningEvent,
        progress: f64,
        server_time: DateTime<Utc>,
    },

    /// Learner → Gateway: one interaction snapshot to fold into the
    /// transition calculator.
    #[serde(rename = "learning_data")]
    LearningData {
        session_id: String,
        snapshot: InteractionSnapshot,
    },

    /// Gateway → Learner: streamed at the 5s cadence, or in reply to an
    /// `adaptation_request`.
    #[serde(rename = "adaptation_response")]
    AdaptationResponse {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        commands: Vec<AdaptationCommand>,
    },

    /// Learner → Gateway: ask for an immediate decision instead of waiting
    /// for the next streaming tick.
    #[serde(rename = "adaptation_request")]
    AdaptationRequest {
        session_id: String,
        request_id: String,
    },

    /// Learner → Gateway: close the session.
    #[serde(rename = "disconnect")]
    Disconnect {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Gateway → Learner: drain complete, session closed.
    #[serde(rename = "disconnection_confirmed")]
    DisconnectionConfirmed { summary: SessionSummary },

    /// Gateway → Learner: a stable, machine-readable error (spec §7).
    #[serde(rename = "error")]
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
}

/// Streaming cadence for unsolicited `adaptation_response` frames (spec §6).
pub const STREAMING_CADENCE_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_round_trips_through_json() {
        let msg = WsMessage::Connect {
            learner_id: "l-1".into(),
            channel: "web".into(),
            configuration: None,
            auth_token: Some("tok".into()),
        };
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"type\":\"connect\""));
        let back: WsMessage = serde_json::from_str(&text).unwrap();
        match back {
            WsMessage::Connect { learner_id, .. } => assert_eq!(learner_id, "l-1"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn error_message_omits_absent_session_id() {
        let msg = WsMessage::Error {
            code: "no_session".into(),
            message: "unknown session".into(),
            session_id: None,
        };
        let text = serde_json::to_string(&msg).unwrap();
        assert!(!text.contains("session_id"));
    }
}
