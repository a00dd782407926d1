//! Adaptation fan-out (spec §4.7): deliver sequenced [`AdaptationCommand`]s
//! to whatever duplex transport originated the session, and answer the
//! synchronous tool interface against the same per-session state.
//!
//! [`DuplexSink`] collapses the gateway's per-connection outbound channel
//! into an interface-style capability rather than depending on axum/ws
//! types directly — `ac-gateway` is the only crate that knows a session is
//! backed by a WebSocket. `ToolRequestRouter` is adapted from the node
//! gateway's `ToolRouter` (`crates/gateway/src/nodes/router.rs`): same
//! bounded-dispatch-with-timeout discipline, but retargeted from "forward
//! to a connected remote node over its own channel" to "run one step
//! in-process against the named session's pipeline core" — there is no
//! remote peer to await a reply from, so the oneshot-channel half of the
//! teacher's shape collapses into a direct `with_core` call under the same
//! per-tool budget.

use std::sync::Arc;

use ac_domain::model::{AdaptationCommand, CommandKind, LearnerProfile, LearningEvent};
use ac_domain::{Error, Result};
use ac_protocol::tools::{SignalResult as ToolSignalResult, ToolRequest, ToolResponse};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::pipeline::SessionPipelines;

/// Everything the consumer loop can push out through a [`DuplexSink`]: a
/// sequenced command, or an `error` frame for conditions the transport
/// layer needs to surface directly (persistence exhausted, forced drain).
#[derive(Debug, Clone)]
pub enum PipelineOutbound {
    Command(AdaptationCommand),
    Error { code: String, message: String },
}

/// A sink capable of delivering one sequenced command to whatever
/// transport is backing a session. Implementations are expected to be
/// cheap to clone (an `mpsc::Sender` handle, typically).
#[async_trait]
pub trait DuplexSink {
    async fn send(&self, command: AdaptationCommand) -> Result<()>;

    /// Deliver an out-of-band `error` frame (spec §4.6/§7 — e.g.
    /// persistence-retry exhaustion). Default no-op for sinks that only
    /// care about commands (tests, diagnostics).
    async fn send_error(&self, _code: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Bridges a [`DuplexSink`] to a plain `tokio::mpsc` channel, the shape
/// `ac-gateway`'s per-connection writer task actually drains (mirroring
/// the node gateway's `ws.rs` outbound-channel idiom).
#[derive(Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<PipelineOutbound>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<PipelineOutbound>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DuplexSink for ChannelSink {
    async fn send(&self, command: AdaptationCommand) -> Result<()> {
        self.tx
            .send(PipelineOutbound::Command(command))
            .await
            .map_err(|_| Error::Transport("outbound channel closed".into()))
    }

    async fn send_error(&self, code: &str, message: &str) -> Result<()> {
        self.tx
            .send(PipelineOutbound::Error { code: code.into(), message: message.into() })
            .await
            .map_err(|_| Error::Transport("outbound channel closed".into()))
    }
}

/// Test/diagnostic sink that records every command it receives instead of
/// delivering it anywhere.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<AdaptationCommand>>>,
    errors: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<AdaptationCommand> {
        self.sent.lock().clone()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().clone()
    }
}

#[async_trait]
impl DuplexSink for RecordingSink {
    async fn send(&self, command: AdaptationCommand) -> Result<()> {
        self.sent.lock().push(command);
        Ok(())
    }

    async fn send_error(&self, code: &str, message: &str) -> Result<()> {
        self.errors.lock().push((code.into(), message.into()));
        Ok(())
    }
}

/// Dispatches synchronous [`ToolRequest`]s (spec §6 "Tool interface")
/// against the named session's pipeline core, enforcing the per-tool
/// latency budget from spec §4.1.
pub struct ToolRequestRouter {
    pipelines: Arc<SessionPipelines>,
}

impl ToolRequestRouter {
    pub fn new(pipelines: Arc<SessionPipelines>) -> Self {
        Self { pipelines }
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        match self.handle(request).await {
            Ok(response) => response,
            Err(e) => ToolResponse::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        }
    }

    async fn handle(&self, request: ToolRequest) -> Result<ToolResponse> {
        let session_id = request.session_id().to_string();
        let budget_ms = request.budget_ms();
        let handle = self
            .pipelines
            .get(&session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;

        // Bands are read from config via the core's cached copy rather than
        // threaded through every call — cheap `Copy` values, no lock needed
        // beyond the one `with_core` already takes.
        match request {
            ToolRequest::ProcessLearnerModel { input, .. } => {
                let profile = default_profile();
                let level = ac_domain::model::PriorKnowledgeLevel::Intermediate;
                let (value, weight, degraded) = handle
                    .with_core(budget_ms, move |core| {
                        let band = core.bands.learner;
                        core.cache_learner(&input, &profile, level, band)
                    })
                    .await?;
                Ok(ToolResponse::ProcessLearnerModel {
                    session_id,
                    signal: ToolSignalResult { value, weight, degraded },
                })
            }
            ToolRequest::ProcessKnowledgeModel { input, .. } => {
                let (value, weight, degraded) = handle
                    .with_core(budget_ms, move |core| {
                        let band = core.bands.knowledge;
                        core.cache_knowledge(&input, band)
                    })
                    .await?;
                Ok(ToolResponse::ProcessKnowledgeModel {
                    session_id,
                    signal: ToolSignalResult { value, weight, degraded },
                })
            }
            ToolRequest::TrackEngagement { input, .. } => {
                let (value, weight, degraded) = handle
                    .with_core(budget_ms, move |core| {
                        let band = core.bands.engagement;
                        core.cache_engagement(&input, band)
                    })
                    .await?;
                Ok(ToolResponse::TrackEngagement {
                    session_id,
                    signal: ToolSignalResult { value, weight, degraded },
                })
            }
            ToolRequest::EvaluateAssessment { input, .. } => {
                let (value, weight, degraded) = handle
                    .with_core(budget_ms, move |core| {
                        let band = core.bands.assessment;
                        core.cache_assessment(&input, band)
                    })
                    .await?;
                Ok(ToolResponse::EvaluateAssessment {
                    session_id,
                    signal: ToolSignalResult { value, weight, degraded },
                })
            }
            ToolRequest::MakeTransitionDecision { .. } => {
                let profile = default_profile();
                let stats = default_stats();
                let (transition, command) = handle
                    .with_core(budget_ms, move |core| {
                        let outcome = core.step_from_cache(&profile, &stats, LearningEvent::Practice, 0.5);
                        let kind = outcome.decision.clone();
                        let command = core.seal_command(kind);
                        (outcome.transition, command)
                    })
                    .await?;
                let is_hold = matches!(command.kind, CommandKind::HoldEvent { .. });
                Ok(ToolResponse::MakeTransitionDecision {
                    session_id,
                    transition,
                    commands: if is_hold { vec![] } else { vec![command] },
                })
            }
        }
    }
}

/// The tool interface's four single-signal calls don't carry learner
/// profile/stats (spec §6 only shows raw model input blobs) — callers that
/// need profile-sensitive weighting use the duplex `learning_data` path
/// instead. These neutral defaults keep the tool-only path well-defined
/// without silently favouring any guidance/style bucket.
fn default_profile() -> LearnerProfile {
    LearnerProfile {
        age_bucket: ac_domain::model::AgeBucket::From25To34,
        region: "unspecified".into(),
        education_tier: "unspecified".into(),
        guidance_preference: ac_domain::model::GuidancePreference::Balanced,
        interaction_style: ac_domain::model::InteractionStyle::Mixed,
        extra: Default::default(),
    }
}

fn default_stats() -> ac_domain::model::DynamicStats {
    ac_domain::model::DynamicStats {
        prior_knowledge_level: ac_domain::model::PriorKnowledgeLevel::Intermediate,
        pace: 0.0,
        engagement_trend: 0.0,
        environmental_sensitivity: 0.5,
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ConnectRequest;
    use ac_domain::config::Config;
    use ac_domain::model::{
        AdaptationSensitivity, AssessmentModelInput, DynamicStats, PriorKnowledgeLevel,
        SessionConfiguration,
    };
    use ac_domain::clock::DeadlineMetrics;
    use ac_persist::{AssessmentStore, AuditSink, Cipher, EngagementStore};
    use ac_sessions::{LearnerRegistry, SessionStore};
    use tempfile::tempdir;

    fn test_env() -> (Arc<SessionPipelines>, tempfile::TempDir) {
        let config = Arc::new(Config::default());
        let dir = tempdir().unwrap();
        let registry = Arc::new(LearnerRegistry::new(config.pipeline.max_concurrent_learners));
        let store = Arc::new(SessionStore::new(dir.path()).unwrap());
        let audit = Arc::new(AuditSink::new(dir.path()).unwrap());
        let assessment_store = Arc::new(AssessmentStore::new(dir.path(), Cipher::from_secret(b"test")).unwrap());
        let engagement_store = Arc::new(EngagementStore::new(dir.path(), Cipher::from_secret(b"test")).unwrap());
        let metrics = Arc::new(DeadlineMetrics::default());
        (
            Arc::new(SessionPipelines::new(
                config,
                registry,
                store,
                audit,
                assessment_store,
                engagement_store,
                metrics,
            )),
            dir,
        )
    }

    fn connect_req(learner_id: &str) -> ConnectRequest {
        ConnectRequest {
            learner_id: learner_id.into(),
            channel: "web".into(),
            configuration: SessionConfiguration {
                learning_domain: "algebra".into(),
                target_learning_event: LearningEvent::Mastery,
                adaptation_sensitivity: AdaptationSensitivity::Medium,
                difficulty: 0.5,
                support_level: "standard".into(),
            },
            profile: default_profile(),
            dynamic_stats: DynamicStats {
                prior_knowledge_level: PriorKnowledgeLevel::Intermediate,
                pace: 0.0,
                engagement_trend: 0.0,
                environmental_sensitivity: 0.5,
                extra: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn unknown_session_yields_not_found_error_response() {
        let (pipelines, _dir) = test_env();
        let router = ToolRequestRouter::new(pipelines);
        let response = router
            .dispatch(ToolRequest::MakeTransitionDecision { session_id: "missing".into() })
            .await;
        match response {
            ToolResponse::Error { code, .. } => assert_eq!(code, "no_session"),
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cached_signal_then_transition_decision_round_trips() {
        let (pipelines, _dir) = test_env();
        let outcome = pipelines.connect(connect_req("l1"), RecordingSink::default()).unwrap();
        let router = ToolRequestRouter::new(pipelines);

        let signal_response = router
            .dispatch(ToolRequest::EvaluateAssessment {
                session_id: outcome.session_id.clone(),
                input: AssessmentModelInput {
                    competency_level: Some(0.9),
                    mean_skill_score: Some(0.8),
                    accuracy: Some(0.9),
                    consistency: Some(0.85),
                },
            })
            .await;
        assert!(matches!(signal_response, ToolResponse::EvaluateAssessment { .. }));

        let decision_response = router
            .dispatch(ToolRequest::MakeTransitionDecision { session_id: outcome.session_id })
            .await;
        assert!(matches!(decision_response, ToolResponse::MakeTransitionDecision { .. }));
    }
}
