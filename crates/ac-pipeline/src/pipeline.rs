//! Session Pipeline (spec §4.6): one bounded inbound queue and consumer
//! loop per active session, plus the manager that resolves a `connect` to a
//! new or resumed session and enforces the `(learner_id, channel)`
//! single-active-session invariant on top of the learner registry.
//!
//! Grounded on the gateway's `nodes/ws.rs` connection-registration plus
//! reader/writer task split: there, one task drains an mpsc outbound
//! channel into the socket while a reader loop dispatches inbound frames.
//! Here the direction is reversed — the consumer loop drains a bounded
//! *inbound* queue of [`InboundEvent`]s, and results go out through a
//! [`crate::fanout::DuplexSink`] instead of straight to a socket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ac_domain::clock::{Deadline, DeadlineMetrics, OpClass};
use ac_domain::config::Config;
use ac_domain::model::{
    AccessLevel, AdaptationCommand, AssessmentResultRow, DynamicStats, EngagementDataRow,
    InteractionSnapshot, LearnerProfile, LearningEvent, RowMetadata, SessionConfiguration,
    SessionCounters, SessionRecord, SessionSummary,
};
use ac_domain::trace::TraceEvent;
use ac_domain::{Error, Result};
use ac_persist::{AssessmentStore, AuditSink, EngagementStore};
use ac_sessions::{compute_session_key, LearnerHandle, LearnerRegistry, SessionStore};
use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::core::{event_changes, next_progress, PipelineCore};

/// Backoff delays between persistence-commit retries (spec §4.6/§7):
/// the initial attempt plus up to three retries at these delays before the
/// session is forced into `Draining` and an `error` frame is sent upstream.
const PERSIST_RETRY_DELAYS_MS: [u64; 3] = [10, 40, 160];

/// One interaction snapshot enqueued for the session's consumer loop.
pub struct InboundEvent {
    pub snapshot: InteractionSnapshot,
    pub profile: LearnerProfile,
    pub dynamic_stats: DynamicStats,
}

/// Lifecycle state of one session pipeline (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Connecting,
    Active,
    Draining,
    Closed,
}

/// Shared, lockable session state: everything the consumer loop and the
/// synchronous tool bypass both need to touch. A single `tokio::Mutex`
/// serialises the two paths, matching the spec's "single consumer" rule —
/// the tool bypass is a second, occasional consumer of the same resource,
/// not a second writer.
struct Shared {
    core: PipelineCore,
    state: PipelineState,
    session: SessionRecord,
}

/// A running session's queue, consumer task, and cancellation handle.
pub struct PipelineHandle {
    session_id: String,
    inbound_tx: mpsc::Sender<InboundEvent>,
    shared: Arc<AsyncMutex<Shared>>,
    cancel: CancellationToken,
    _learner_handle: LearnerHandle,
}

impl PipelineHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Back-pressure per spec §4.6: a full queue returns `Busy` immediately
    /// rather than blocking the caller.
    pub fn push_event(&self, event: InboundEvent) -> Result<()> {
        self.inbound_tx
            .try_send(event)
            .map_err(|_| Error::Busy(format!("session {} inbound queue full", self.session_id)))
    }

    pub fn state(&self) -> PipelineState {
        self.shared.try_lock().map(|s| s.state).unwrap_or(PipelineState::Active)
    }

    /// Begin a graceful drain: stop accepting new queue items, let the
    /// consumer finish what's already buffered up to the grace deadline.
    pub fn request_drain(&self) {
        self.cancel.cancel();
    }

    /// Run one tool-interface step directly against this session's core,
    /// bypassing the queue (§4.7). `f` is given exclusive access to the
    /// core and must be synchronous and side-effect-free beyond mutating
    /// it — persistence/audit/fanout happen in the caller, same as the
    /// queue-driven path.
    pub async fn with_core<F, T>(&self, budget_ms: u64, f: F) -> Result<T>
    where
        F: FnOnce(&mut PipelineCore) -> T,
    {
        let deadline = Deadline::start(OpClass::ToolTransitionDecision, budget_ms);
        deadline
            .run(async {
                let mut guard = self.shared.lock().await;
                f(&mut guard.core)
            })
            .await
    }
}

/// Everything a freshly resolved `connect` needs beyond the learner/channel
/// identity (spec §3 `SessionConfiguration`).
pub struct ConnectRequest {
    pub learner_id: String,
    pub channel: String,
    pub configuration: SessionConfiguration,
    pub profile: LearnerProfile,
    pub dynamic_stats: DynamicStats,
}

pub struct ConnectOutcome {
    pub session_id: String,
    pub is_new_session: bool,
    pub current_event: LearningEvent,
    pub progress: f64,
}

/// Owns every active [`PipelineHandle`] plus the indices needed to resolve
/// `connect` idempotently: `(learner_id, channel) -> session_id` and
/// `session_id -> handle`.
pub struct SessionPipelines {
    config: Arc<Config>,
    registry: Arc<LearnerRegistry>,
    store: Arc<SessionStore>,
    audit: Arc<AuditSink>,
    assessment_store: Arc<AssessmentStore>,
    engagement_store: Arc<EngagementStore>,
    metrics: Arc<DeadlineMetrics>,
    by_session: Arc<SyncMutex<HashMap<String, Arc<PipelineHandle>>>>,
    by_key: Arc<SyncMutex<HashMap<String, String>>>,
}

impl SessionPipelines {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<LearnerRegistry>,
        store: Arc<SessionStore>,
        audit: Arc<AuditSink>,
        assessment_store: Arc<AssessmentStore>,
        engagement_store: Arc<EngagementStore>,
        metrics: Arc<DeadlineMetrics>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            audit,
            assessment_store,
            engagement_store,
            metrics,
            by_session: Arc::new(SyncMutex::new(HashMap::new())),
            by_key: Arc::new(SyncMutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<PipelineHandle>> {
        self.by_session.lock().get(session_id).cloned()
    }

    /// Resolve a `connect` (spec §8): repeating it for an already-active
    /// `(learner_id, channel)` returns the existing session id; a different
    /// channel for a learner who already has an active session elsewhere
    /// fails with `AuthError`, since the registry allows at most one active
    /// session per learner at a time.
    pub fn connect<S>(&self, req: ConnectRequest, sink: S) -> Result<ConnectOutcome>
    where
        S: crate::fanout::DuplexSink + Send + Sync + 'static,
    {
        let key = compute_session_key(&req.learner_id, &req.channel);

        if let Some(existing_id) = self.by_key.lock().get(&key).cloned() {
            if let Some(handle) = self.get(&existing_id) {
                if handle.state() != PipelineState::Closed {
                    let session = self
                        .store
                        .get(&existing_id)
                        .ok_or_else(|| Error::Internal("session indexed but not in store".into()))?;
                    return Ok(ConnectOutcome {
                        session_id: existing_id,
                        is_new_session: false,
                        current_event: session.current_event,
                        progress: session.progress,
                    });
                }
            }
        }

        let learner_handle = self.registry.try_acquire(&req.learner_id).map_err(|_| {
            Error::Auth(format!(
                "learner {} already has an active session on another channel",
                req.learner_id
            ))
        })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = SessionRecord {
            session_id: session_id.clone(),
            learner_id: req.learner_id.clone(),
            channel: req.channel.clone(),
            created_at: now,
            last_event_at: now,
            configuration: req.configuration,
            current_event: LearningEvent::Onboarding,
            progress: 0.0,
            counters: Default::default(),
        };
        self.store.insert(session.clone());

        let core = PipelineCore::new(session_id.clone(), &self.config);
        let shared = Arc::new(AsyncMutex::new(Shared {
            core,
            state: PipelineState::Connecting,
            session,
        }));

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.pipeline.inbound_queue_capacity);
        let cancel = CancellationToken::new();

        let handle = Arc::new(PipelineHandle {
            session_id: session_id.clone(),
            inbound_tx,
            shared: shared.clone(),
            cancel: cancel.clone(),
            _learner_handle: learner_handle,
        });

        self.by_session.lock().insert(session_id.clone(), handle.clone());
        self.by_key.lock().insert(key, session_id.clone());

        shared.try_lock().expect("fresh mutex").state = PipelineState::Active;

        TraceEvent::SessionResolved {
            session_id: session_id.clone(),
            learner_id: req.learner_id.clone(),
            is_new: true,
        }
        .emit();

        spawn_consumer(
            handle.clone(),
            shared,
            inbound_rx,
            cancel,
            self.config.clone(),
            self.store.clone(),
            self.audit.clone(),
            self.assessment_store.clone(),
            self.engagement_store.clone(),
            self.metrics.clone(),
            sink,
            self.by_session.clone(),
            self.by_key.clone(),
        );

        Ok(ConnectOutcome {
            session_id,
            is_new_session: true,
            current_event: LearningEvent::Onboarding,
            progress: 0.0,
        })
    }

    pub fn active_session_ids(&self) -> Vec<String> {
        self.by_session.lock().keys().cloned().collect()
    }
}

/// The consumer loop (spec §4.6): dequeue → run one step → persist →
/// fan out → repeat, until cancelled or the channel closes, then drain up
/// to the grace deadline.
#[allow(clippy::too_many_arguments)]
fn spawn_consumer<S>(
    handle: Arc<PipelineHandle>,
    shared: Arc<AsyncMutex<Shared>>,
    mut inbound_rx: mpsc::Receiver<InboundEvent>,
    cancel: CancellationToken,
    config: Arc<Config>,
    store: Arc<SessionStore>,
    audit: Arc<AuditSink>,
    assessment_store: Arc<AssessmentStore>,
    engagement_store: Arc<EngagementStore>,
    metrics: Arc<DeadlineMetrics>,
    sink: S,
    by_session: Arc<SyncMutex<HashMap<String, Arc<PipelineHandle>>>>,
    by_key: Arc<SyncMutex<HashMap<String, String>>>,
) where
    S: crate::fanout::DuplexSink + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let end_to_end = config.pipeline.end_to_end_budget_ms;
        let calc_budget = config.pipeline.calculator_budget_ms;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                ev = inbound_rx.recv() => ev,
            };

            let Some(event) = next else { break };

            let deadline = Deadline::start(OpClass::EndToEnd, end_to_end);
            let session_id = handle.session_id().to_string();

            let (command, learner_id, new_event, progress, counters, engagement_row, assessment_row) = {
                let mut guard = shared.lock().await;
                let calc_deadline = Deadline::start(OpClass::CalculatorStep, calc_budget);
                let progress_before = guard.session.progress;
                let event_before = guard.session.current_event;
                let learner_id = guard.session.learner_id.clone();

                let outcome = guard.core.step_from_snapshot(
                    &event.snapshot,
                    &event.profile,
                    &event.dynamic_stats,
                    event_before,
                    progress_before,
                );

                metrics.record(OpClass::CalculatorStep, calc_deadline.elapsed());
                if calc_deadline.breached() {
                    TraceEvent::LatencyViolation {
                        session_id: Some(session_id.clone()),
                        op: OpClass::CalculatorStep.label().into(),
                        budget_ms: calc_budget,
                        observed_ms: calc_deadline.elapsed().as_millis() as u64,
                    }
                    .emit();
                }

                TraceEvent::TransitionComputed {
                    session_id: session_id.clone(),
                    value: outcome.transition.value,
                    confidence: outcome.transition.confidence,
                    stability: outcome.transition.stability,
                    degraded: false,
                }
                .emit();

                let new_event = event_changes(&outcome.decision).unwrap_or(event_before);
                let progress = next_progress(progress_before, &outcome, new_event != event_before);

                let now = Utc::now();
                let engagement_row = (!outcome.engagement.degraded).then(|| EngagementDataRow {
                    engagement_id: uuid::Uuid::new_v4().to_string(),
                    learner_id: learner_id.clone(),
                    session_id: session_id.clone(),
                    interaction: serde_json::to_value(&event.snapshot.engagement).unwrap_or_default(),
                    engagement_score: (outcome.engagement.value + 1.0) / 2.0,
                    timestamp: now,
                    metadata: RowMetadata {
                        data_type: "engagement_sample".into(),
                        access_level: AccessLevel::Educational,
                        retention_until: None,
                    },
                });
                let assessment_row = (!outcome.assessment.degraded).then(|| AssessmentResultRow {
                    assessment_id: uuid::Uuid::new_v4().to_string(),
                    learner_id: learner_id.clone(),
                    session_id: session_id.clone(),
                    assessment_type: "learning_data".into(),
                    result: serde_json::to_value(&event.snapshot.assessment).unwrap_or_default(),
                    timestamp: now,
                    metadata: RowMetadata {
                        data_type: "assessment_result".into(),
                        access_level: AccessLevel::Restricted,
                        retention_until: None,
                    },
                });

                let command = guard.core.seal_command(outcome.decision.clone());

                guard.session.current_event = new_event;
                guard.session.progress = progress;
                guard.session.counters.events_in += 1;
                guard.session.counters.adaptations_out += 1;
                let counters = guard.session.counters;

                (command, learner_id, new_event, progress, counters, engagement_row, assessment_row)
            };

            if let Some(row) = engagement_row {
                engagement_store.insert(row);
            }
            if let Some(row) = assessment_row {
                assessment_store.insert(row);
            }

            if !commit_with_retry(&store, &session_id, new_event, progress, counters).await {
                tracing::error!(session_id = %session_id, "persistence retries exhausted, closing session");
                let _ = sink
                    .send_error("persistence_error", "failed to persist session state after retries")
                    .await;
                let _ = audit.record(
                    Some(session_id.clone()),
                    Some(learner_id.clone()),
                    ac_domain::model::AuditEventKind::Error,
                    false,
                    serde_json::json!({ "action": "persist_retry_exhausted" }),
                );
                break;
            }

            TraceEvent::CommandEmitted {
                session_id: session_id.clone(),
                sequence: command.sequence,
                kind: format!("{:?}", command.kind),
            }
            .emit();

            if let Err(e) = sink.send(command).await {
                tracing::warn!(session_id = %session_id, error = %e, "fanout send failed");
            }

            metrics.record(OpClass::EndToEnd, deadline.elapsed());
            if deadline.breached() {
                TraceEvent::LatencyViolation {
                    session_id: Some(session_id.clone()),
                    op: OpClass::EndToEnd.label().into(),
                    budget_ms: end_to_end,
                    observed_ms: deadline.elapsed().as_millis() as u64,
                }
                .emit();
            }
        }

        drain_remaining(&shared, &mut inbound_rx, config.pipeline.drain_grace_ms).await;

        let summary = {
            let mut guard = shared.lock().await;
            guard.state = PipelineState::Closed;
            summarise(&guard.session)
        };
        store.remove(handle.session_id());
        if let Some(removed) = by_session.lock().remove(handle.session_id()) {
            by_key.lock().retain(|_, v| v != handle.session_id());
            drop(removed);
        }
        let _ = audit.record(
            Some(handle.session_id().to_string()),
            Some(summary.learner_id.clone()),
            ac_domain::model::AuditEventKind::Modify,
            true,
            serde_json::json!({ "action": "session_closed" }),
        );

        TraceEvent::SessionClosed {
            session_id: summary.session_id.clone(),
            total_events: summary.total_events,
            adaptations_out: summary.adaptations_out,
        }
        .emit();
    });
}

/// Commit the step's session-record mutation, retrying with backoff if the
/// store reports a miss (spec §4.6/§7). `SessionStore::update` only returns
/// `None` when the session has vanished from the in-memory map underneath
/// the consumer loop — the one failure mode this store can surface, and the
/// one retried here the same way a transient persistence-layer write
/// failure would be.
async fn commit_with_retry(
    store: &SessionStore,
    session_id: &str,
    new_event: LearningEvent,
    progress: f64,
    counters: SessionCounters,
) -> bool {
    let commit = |store: &SessionStore| {
        store
            .update(session_id, |rec| {
                rec.current_event = new_event;
                rec.progress = progress;
                rec.counters = counters;
            })
            .is_some()
    };

    if commit(store) {
        return true;
    }

    for (idx, delay_ms) in PERSIST_RETRY_DELAYS_MS.into_iter().enumerate() {
        TraceEvent::PersistenceRetry {
            session_id: session_id.to_string(),
            attempt: idx as u32 + 1,
            delay_ms,
        }
        .emit();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if commit(store) {
            return true;
        }
    }

    false
}

/// On cancellation, keep draining already-buffered events up to the grace
/// deadline; anything left after that is discarded with an audit entry
/// (spec §4.6 "Cancellation").
async fn drain_remaining(
    shared: &Arc<AsyncMutex<Shared>>,
    inbound_rx: &mut mpsc::Receiver<InboundEvent>,
    grace_ms: u64,
) {
    {
        let mut guard = shared.lock().await;
        guard.state = PipelineState::Draining;
    }

    let grace = Duration::from_millis(grace_ms);
    let drained = tokio::time::timeout(grace, async {
        let mut count = 0u32;
        while inbound_rx.try_recv().is_ok() {
            count += 1;
        }
        count
    })
    .await
    .unwrap_or(0);

    if drained > 0 {
        tracing::info!(discarded = drained, "drained remaining inbound events on close");
    }
}

fn summarise(session: &SessionRecord) -> SessionSummary {
    SessionSummary {
        session_id: session.session_id.clone(),
        learner_id: session.learner_id.clone(),
        started_at: session.created_at,
        ended_at: Utc::now(),
        total_events: session.counters.events_in,
        adaptations_out: session.counters.adaptations_out,
        help_requests: session.counters.help_requests,
        final_event: session.current_event,
        final_progress: session.progress,
    }
}

#[allow(dead_code)]
fn command_session(cmd: &AdaptationCommand) -> &str {
    &cmd.session_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::RecordingSink;
    use ac_domain::model::{AdaptationSensitivity, AgeBucket, GuidancePreference, InteractionStyle, PriorKnowledgeLevel};
    use tempfile::tempdir;

    fn test_config() -> Arc<Config> {
        let mut cfg = Config::default();
        cfg.pipeline.inbound_queue_capacity = 4;
        cfg.pipeline.drain_grace_ms = 50;
        Arc::new(cfg)
    }

    fn env(config: &Arc<Config>) -> (Arc<SessionPipelines>, Arc<LearnerRegistry>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let registry = Arc::new(LearnerRegistry::new(config.pipeline.max_concurrent_learners));
        let store = Arc::new(SessionStore::new(dir.path()).unwrap());
        let audit = Arc::new(AuditSink::new(dir.path()).unwrap());
        let assessment_store =
            Arc::new(AssessmentStore::new(dir.path(), ac_persist::Cipher::from_secret(b"test")).unwrap());
        let engagement_store =
            Arc::new(EngagementStore::new(dir.path(), ac_persist::Cipher::from_secret(b"test")).unwrap());
        let metrics = Arc::new(DeadlineMetrics::default());
        (
            Arc::new(SessionPipelines::new(
                config.clone(),
                registry.clone(),
                store,
                audit,
                assessment_store,
                engagement_store,
                metrics,
            )),
            registry,
            dir,
        )
    }

    #[allow(clippy::type_complexity)]
    fn env_with_stores(
        config: &Arc<Config>,
    ) -> (Arc<SessionPipelines>, Arc<AssessmentStore>, Arc<EngagementStore>, Arc<DeadlineMetrics>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let registry = Arc::new(LearnerRegistry::new(config.pipeline.max_concurrent_learners));
        let store = Arc::new(SessionStore::new(dir.path()).unwrap());
        let audit = Arc::new(AuditSink::new(dir.path()).unwrap());
        let assessment_store =
            Arc::new(AssessmentStore::new(dir.path(), ac_persist::Cipher::from_secret(b"test")).unwrap());
        let engagement_store =
            Arc::new(EngagementStore::new(dir.path(), ac_persist::Cipher::from_secret(b"test")).unwrap());
        let metrics = Arc::new(DeadlineMetrics::default());
        let pipelines = Arc::new(SessionPipelines::new(
            config.clone(),
            registry,
            store,
            audit,
            assessment_store.clone(),
            engagement_store.clone(),
            metrics.clone(),
        ));
        (pipelines, assessment_store, engagement_store, metrics, dir)
    }

    fn connect_req(learner_id: &str, channel: &str) -> ConnectRequest {
        ConnectRequest {
            learner_id: learner_id.into(),
            channel: channel.into(),
            configuration: SessionConfiguration {
                learning_domain: "algebra".into(),
                target_learning_event: LearningEvent::Mastery,
                adaptation_sensitivity: AdaptationSensitivity::Medium,
                difficulty: 0.5,
                support_level: "standard".into(),
            },
            profile: LearnerProfile {
                age_bucket: AgeBucket::From18To24,
                region: "na".into(),
                education_tier: "secondary".into(),
                guidance_preference: GuidancePreference::Balanced,
                interaction_style: InteractionStyle::Mixed,
                extra: Default::default(),
            },
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
    async fn repeat_connect_same_channel_is_idempotent() {
        let config = test_config();
        let (pipelines, _registry, _dir) = env(&config);

        let first = pipelines.connect(connect_req("l1", "web"), RecordingSink::default()).unwrap();
        let second = pipelines.connect(connect_req("l1", "web"), RecordingSink::default()).unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert!(!second.is_new_session);
    }

    #[tokio::test]
    async fn connect_different_channel_while_active_is_auth_error() {
        let config = test_config();
        let (pipelines, _registry, _dir) = env(&config);

        pipelines.connect(connect_req("l1", "web"), RecordingSink::default()).unwrap();
        let err = pipelines.connect(connect_req("l1", "mobile"), RecordingSink::default()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn full_queue_returns_busy() {
        let config = test_config();
        let (pipelines, _registry, _dir) = env(&config);
        let outcome = pipelines.connect(connect_req("l1", "web"), RecordingSink::default()).unwrap();
        let handle = pipelines.get(&outcome.session_id).unwrap();

        let mut busy = false;
        for _ in 0..16 {
            let event = InboundEvent {
                snapshot: InteractionSnapshot {
                    session_id: outcome.session_id.clone(),
                    timestamp: Utc::now(),
                    learner: Default::default(),
                    knowledge: Default::default(),
                    engagement: Default::default(),
                    assessment: Default::default(),
                    environment: None,
                },
                profile: connect_req("l1", "web").profile,
                dynamic_stats: connect_req("l1", "web").dynamic_stats,
            };
            if handle.push_event(event).is_err() {
                busy = true;
                break;
            }
        }
        assert!(busy, "expected the bounded inbound queue to eventually report Busy");
    }

    #[tokio::test]
    async fn learning_data_populates_engagement_and_metrics() {
        let config = test_config();
        let (pipelines, _assessment_store, engagement_store, metrics, _dir) = env_with_stores(&config);
        let outcome = pipelines.connect(connect_req("l1", "web"), RecordingSink::default()).unwrap();
        let handle = pipelines.get(&outcome.session_id).unwrap();

        let event = InboundEvent {
            snapshot: InteractionSnapshot {
                session_id: outcome.session_id.clone(),
                timestamp: Utc::now(),
                learner: Default::default(),
                knowledge: Default::default(),
                engagement: ac_domain::model::EngagementModelInput {
                    engagement_score: Some(0.8),
                    attention_level: Some(0.7),
                    intrinsic_motivation: Some(0.6),
                    task_persistence: Some(0.9),
                },
                assessment: Default::default(),
                environment: None,
            },
            profile: connect_req("l1", "web").profile,
            dynamic_stats: connect_req("l1", "web").dynamic_stats,
        };
        handle.push_event(event).unwrap();

        // The consumer loop runs on its own spawned task; give it a beat.
        for _ in 0..50 {
            if !engagement_store.for_learner("l1").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(engagement_store.for_learner("l1").len(), 1);
        assert!(!metrics.snapshot().is_empty());
    }
}
