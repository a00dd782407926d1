//! Data-model entities from spec §3 that are not protocol-specific.
//!
//! `ac-protocol` maps these to/from wire messages; `ac-signals` consumes
//! the `*Input` blobs and produces [`TransitionState`] updates;
//! `ac-sessions`/`ac-persist` own the lifecycle of [`LearnerRecord`] and
//! [`SessionRecord`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Learning event (GLOSSARY)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The five ordered pedagogical stages. Ordering is load-bearing: the
/// Decision Policy only moves adjacent to this order (plus `terminate`
/// from `Mastery`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningEvent {
    Onboarding,
    Introduction,
    Practice,
    Application,
    Mastery,
}

impl LearningEvent {
    const ORDER: [LearningEvent; 5] = [
        LearningEvent::Onboarding,
        LearningEvent::Introduction,
        LearningEvent::Practice,
        LearningEvent::Application,
        LearningEvent::Mastery,
    ];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|e| *e == self).expect("exhaustive")
    }

    /// The next event, or `self` unchanged if already `Mastery`.
    pub fn advance(self) -> LearningEvent {
        Self::ORDER.get(self.index() + 1).copied().unwrap_or(self)
    }

    /// The previous event, clamped at `Onboarding`.
    pub fn remediate(self) -> LearningEvent {
        self.index()
            .checked_sub(1)
            .map(|i| Self::ORDER[i])
            .unwrap_or(LearningEvent::Onboarding)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Learner profile / dynamic stats (§3 LearnerRecord, E.4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse age band used both as a static profile attribute and as an
/// anonymisation bucket (Registry §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBucket {
    Under18,
    From18To24,
    From25To34,
    From35To49,
    From50Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidancePreference {
    Minimal,
    Balanced,
    Thorough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStyle {
    Exploratory,
    Structured,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorKnowledgeLevel {
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl PriorKnowledgeLevel {
    /// Base weight for the learner-model signal (§4.3 Learner extractor).
    pub fn base_weight(self) -> f64 {
        match self {
            PriorKnowledgeLevel::Novice => 0.40,
            PriorKnowledgeLevel::Beginner => 0.35,
            PriorKnowledgeLevel::Intermediate => 0.30,
            PriorKnowledgeLevel::Advanced | PriorKnowledgeLevel::Expert => 0.25,
        }
    }
}

/// Static learner attributes. Demographics are already coarse at intake;
/// the Registry's anonymisation step further generalises them on egress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub age_bucket: AgeBucket,
    pub region: String,
    pub education_tier: String,
    pub guidance_preference: GuidancePreference,
    pub interaction_style: InteractionStyle,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Moving-average / derived stats updated as sessions progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicStats {
    pub prior_knowledge_level: PriorKnowledgeLevel,
    pub pace: f64,
    pub engagement_trend: f64,
    /// Learner-specific environmental sensitivity in `[0,1]`, used to scale
    /// the calculator's environmental-factor term ε (§4.4).
    pub environmental_sensitivity: f64,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// At most one active record per `learner_id` (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerRecord {
    pub learner_id: String,
    /// Deterministic function of `learner_id` + a process secret (§4.2).
    pub anonymised_id: String,
    pub profile: LearnerProfile,
    pub dynamic_stats: DynamicStats,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session configuration / record (§3 SessionRecord)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationSensitivity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfiguration {
    pub learning_domain: String,
    pub target_learning_event: LearningEvent,
    pub adaptation_sensitivity: AdaptationSensitivity,
    /// `[0, 1]`.
    pub difficulty: f64,
    pub support_level: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    pub events_in: u64,
    pub adaptations_out: u64,
    pub help_requests: u64,
}

/// At most one active `SessionRecord` per `(learner_id, channel)` (§3).
/// The latency histogram named by spec §3 is runtime-only pipeline state
/// (see `ac_domain::clock::LatencyHistogram`) and is not part of the
/// persisted row — it is not serializable and is not one of the
/// `learning_sessions` persistence columns in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub learner_id: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    pub configuration: SessionConfiguration,
    pub current_event: LearningEvent,
    /// `[0, 1]`.
    pub progress: f64,
    pub counters: SessionCounters,
}

impl SessionRecord {
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let secs = now
            .signed_duration_since(self.last_event_at)
            .num_seconds()
            .max(0);
        Duration::from_secs(secs as u64)
    }
}

/// Produced on `disconnect`/timeout/shutdown (E.3, E.4), returned in
/// `disconnection_confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub learner_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_events: u64,
    pub adaptations_out: u64,
    pub help_requests: u64,
    pub final_event: LearningEvent,
    pub final_progress: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signal extractor inputs (§4.3) — raw model-input blobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerModelInput {
    pub readiness: Option<f64>,
    pub preferences: Option<f64>,
    pub engagement_trend: Option<f64>,
    pub pace: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeModelInput {
    pub prerequisite_completion: Option<f64>,
    pub path_complexity: Option<f64>,
    pub competency_gaps: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementModelInput {
    pub engagement_score: Option<f64>,
    pub attention_level: Option<f64>,
    pub intrinsic_motivation: Option<f64>,
    pub task_persistence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentModelInput {
    pub competency_level: Option<f64>,
    pub mean_skill_score: Option<f64>,
    pub accuracy: Option<f64>,
    pub consistency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentTag {
    Optimal,
    Standard,
    Noisy,
    Distracted,
    Mobile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentContext {
    pub session_duration_minutes: f64,
    pub wall_hour: u8,
    pub environment_tag: EnvironmentTag,
}

/// §3 InteractionSnapshot. Blobs are opaque to the core except through the
/// Signal Extractors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSnapshot {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub learner: LearnerModelInput,
    pub knowledge: KnowledgeModelInput,
    pub engagement: EngagementModelInput,
    pub assessment: AssessmentModelInput,
    pub environment: Option<EnvironmentContext>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transition state (§3 TransitionState)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelWeights {
    pub w_learner: f64,
    pub w_knowledge: f64,
    pub w_engagement: f64,
    pub w_assessment: f64,
}

impl ModelWeights {
    pub fn sum(&self) -> f64 {
        self.w_learner + self.w_knowledge + self.w_engagement + self.w_assessment
    }
}

/// Owned by its `SessionRecord`; mutated only inside the Transition
/// Calculator under the pipeline's serialisation discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionState {
    pub session_id: String,
    /// `[0, 1]`.
    pub value: f64,
    /// `[0, 1]`.
    pub previous_value: f64,
    /// `[-1, 1]`.
    pub integration: f64,
    /// `[-0.5, 0.5]`.
    pub noise: f64,
    /// `[0.1, 1.0]`.
    pub alpha: f64,
    /// `[0, 0.5]`.
    pub beta: f64,
    pub weights: ModelWeights,
    /// `[0, 1]`.
    pub confidence: f64,
    /// `[0, 1]`.
    pub stability: f64,
    pub updated_at: DateTime<Utc>,
}

impl TransitionState {
    /// A fresh state for a newly connected session: `value = previous_value
    /// = 0.5` (neutral prior), confidence/stability at their
    /// boundary-condition defaults (§8 "calculator with α=0, β=0").
    pub fn initial(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            value: 0.5,
            previous_value: 0.5,
            integration: 0.0,
            noise: 0.0,
            alpha: 0.3,
            beta: 0.1,
            weights: ModelWeights::default(),
            confidence: 0.5,
            stability: 1.0,
            updated_at: now,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adaptation commands (§3 AdaptationCommand)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyDirection {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    AdvanceEvent { to: LearningEvent },
    HoldEvent { reason: String },
    Remediate { to: LearningEvent },
    IncreaseSupport,
    DecreaseSupport,
    AdjustDifficulty { direction: DifficultyDirection },
    OfferHelp,
    Terminate,
}

/// Every command references an existing `SessionRecord`; commands are
/// totally ordered per session via `sequence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationCommand {
    pub session_id: String,
    pub sequence: u64,
    pub kind: CommandKind,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub issued_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit records (§3 AuditRecord)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Access,
    Modify,
    Encrypt,
    Decrypt,
    Anonymise,
    Auth,
    Error,
}

/// Append-only; never mutated; retention governed by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub session_id: Option<String>,
    pub learner_id: Option<String>,
    pub event_kind: AuditEventKind,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// Small bounded metadata map (E.4).
    #[serde(default)]
    pub detail: serde_json::Value,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence rows beyond `learning_sessions`/`learner_models` (§6
// "Persistence layout"): assessment_results, engagement_data,
// performance_metrics.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Educational,
    Restricted,
    Confidential,
}

/// Carried by every row in the three tables below (§6: "payloads carry
/// metadata (data_type, access_level, retention_until)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMetadata {
    pub data_type: String,
    pub access_level: AccessLevel,
    pub retention_until: Option<DateTime<Utc>>,
}

/// `assessment_results` row: one `evaluate_assessment` outcome.
/// Learner-identifying — encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResultRow {
    pub assessment_id: String,
    pub learner_id: String,
    pub session_id: String,
    pub assessment_type: String,
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub metadata: RowMetadata,
}

/// `engagement_data` row: one `track_engagement` interaction sample.
/// Learner-identifying — encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementDataRow {
    pub engagement_id: String,
    pub learner_id: String,
    pub session_id: String,
    pub interaction: serde_json::Value,
    pub engagement_score: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: RowMetadata,
}

/// `performance_metrics` row: server-level operational metric, keyed by
/// `server_id` rather than `learner_id` — not learner-identifying, so it
/// is the one table in §6 that is not encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetricRow {
    pub metric_id: String,
    pub server_id: String,
    pub metric_type: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: RowMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_event_ordering() {
        assert!(LearningEvent::Onboarding < LearningEvent::Mastery);
        assert_eq!(LearningEvent::Mastery.advance(), LearningEvent::Mastery);
        assert_eq!(LearningEvent::Onboarding.remediate(), LearningEvent::Onboarding);
        assert_eq!(LearningEvent::Practice.advance(), LearningEvent::Application);
        assert_eq!(LearningEvent::Practice.remediate(), LearningEvent::Introduction);
    }

    #[test]
    fn weight_sum() {
        let w = ModelWeights {
            w_learner: 0.35,
            w_knowledge: 0.25,
            w_engagement: 0.20,
            w_assessment: 0.20,
        };
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn initial_transition_state_is_neutral() {
        let ts = TransitionState::initial("s1", Utc::now());
        assert_eq!(ts.value, 0.5);
        assert_eq!(ts.previous_value, 0.5);
        assert_eq!(ts.stability, 1.0);
    }
}
