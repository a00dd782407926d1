//! Per-session step logic (spec §4.6): dequeue → extractors → calculator →
//! policy → counters/progress update. Kept synchronous and side-effect-free
//! with respect to I/O — the caller (`pipeline.rs`) is responsible for
//! acquiring the learner handle, persisting the result, and fanning the
//! resulting commands out.
//!
//! One `PipelineCore` is held per active session behind a `tokio::Mutex` so
//! both the queue-driven consumer loop and the synchronous tool-interface
//! bypass (§4.7) serialise on the same state, matching the ownership rule
//! that a `SessionRecord` is mutated by exactly one path at a time.

use ac_domain::config::{Config, SignalBandsConfig};
use ac_domain::model::{
    AdaptationCommand, AssessmentModelInput, CommandKind, DynamicStats, EngagementModelInput,
    EnvironmentContext, InteractionSnapshot, KnowledgeModelInput, LearnerModelInput,
    LearnerProfile, ModelWeights, PriorKnowledgeLevel, TransitionState,
};
use ac_signals::calculator::{SignalInputs, TransitionCalculator};
use ac_signals::policy::{self, DecisionInput, PolicyHistory};
use ac_signals::{extractors, SignalResult};
use chrono::{DateTime, Utc};

/// Per-model weight bands from config, bundled for convenience.
#[derive(Debug, Clone, Copy)]
pub struct WeightBands {
    pub learner: ac_domain::config::Band,
    pub knowledge: ac_domain::config::Band,
    pub engagement: ac_domain::config::Band,
    pub assessment: ac_domain::config::Band,
}

impl From<&SignalBandsConfig> for WeightBands {
    fn from(cfg: &SignalBandsConfig) -> Self {
        Self {
            learner: cfg.weight_learner_range,
            knowledge: cfg.weight_knowledge_range,
            engagement: cfg.weight_engagement_range,
            assessment: cfg.weight_assessment_range,
        }
    }
}

/// Weight for a non-learner extractor: the band midpoint, pulled toward the
/// band's lower bound when the extractor was degraded (missing inputs), so
/// an unreliable signal contributes less to the integration term. The
/// learner-model weight alone has an explicit derivation (§4.3); spec.md
/// gives only bands for the other three, so this is the one place this
/// system picks a concrete value within a declared band (recorded in
/// DESIGN.md).
fn midpoint_weight(band: ac_domain::config::Band, degraded: bool) -> f64 {
    let mid = (band.lo + band.hi) / 2.0;
    if degraded {
        band.clamp(mid - 0.25 * (band.hi - band.lo))
    } else {
        band.clamp(mid)
    }
}

/// The four raw model inputs a `learning_data` event carries, already
/// extracted to signals.
pub struct StepSignals {
    pub learner: SignalResult,
    pub knowledge: SignalResult,
    pub engagement: SignalResult,
    pub assessment: SignalResult,
}

impl StepSignals {
    pub fn from_snapshot(snapshot: &InteractionSnapshot) -> Self {
        Self {
            learner: extractors::extract_learner_signal(&snapshot.learner),
            knowledge: extractors::extract_knowledge_signal(&snapshot.knowledge),
            engagement: extractors::extract_engagement_signal(&snapshot.engagement),
            assessment: extractors::extract_assessment_signal(&snapshot.assessment),
        }
    }

    fn weights(&self, profile: &LearnerProfile, level: PriorKnowledgeLevel, bands: WeightBands) -> ModelWeights {
        ModelWeights {
            w_learner: extractors::learner_weight(profile, level, bands.learner),
            w_knowledge: midpoint_weight(bands.knowledge, self.knowledge.degraded),
            w_engagement: midpoint_weight(bands.engagement, self.engagement.degraded),
            w_assessment: midpoint_weight(bands.assessment, self.assessment.degraded),
        }
    }

    fn into_calculator_inputs(self) -> SignalInputs {
        SignalInputs {
            learner: self.learner,
            knowledge: self.knowledge,
            engagement: self.engagement,
            assessment: self.assessment,
        }
    }
}

/// Cache of the most recent per-model signal pushed through the tool
/// interface (§6 `process_learner_model` etc.), consumed and cleared by the
/// next `make_transition_decision` call or the next `learning_data` event
/// that supersedes it.
#[derive(Debug, Clone, Default)]
pub struct CachedSignals {
    pub learner: Option<SignalResult>,
    pub knowledge: Option<SignalResult>,
    pub engagement: Option<SignalResult>,
    pub assessment: Option<SignalResult>,
}

impl CachedSignals {
    fn take_or_default(&mut self) -> (StepSignals, bool) {
        let any_cached = self.learner.is_some()
            || self.knowledge.is_some()
            || self.engagement.is_some()
            || self.assessment.is_some();
        let signals = StepSignals {
            learner: self.learner.take().unwrap_or(SignalResult { value: 0.0, degraded: true }),
            knowledge: self.knowledge.take().unwrap_or(SignalResult { value: 0.0, degraded: true }),
            engagement: self.engagement.take().unwrap_or(SignalResult { value: 0.0, degraded: true }),
            assessment: self.assessment.take().unwrap_or(SignalResult { value: 0.0, degraded: true }),
        };
        (signals, any_cached)
    }
}

/// Everything one session's step logic needs that isn't already inside
/// `ac_domain::model::SessionRecord`/`TransitionState`.
pub struct PipelineCore {
    pub session_id: String,
    pub calculator: TransitionCalculator,
    pub bands: WeightBands,
    pub transition: TransitionState,
    pub history: PolicyHistory,
    pub update_tick: u64,
    pub command_sequence: u64,
    pub cached_signals: CachedSignals,
}

/// Output of one `step()`: the new transition state and the policy's
/// decision, ready for the caller to persist and fan out.
pub struct StepOutcome {
    pub transition: TransitionState,
    pub decision: CommandKind,
    /// Extracted engagement/assessment signals, carried out alongside the
    /// transition so the caller can populate the `engagement_data` /
    /// `assessment_results` persistence rows (§6) without re-running the
    /// extractors.
    pub engagement: SignalResult,
    pub assessment: SignalResult,
}

impl PipelineCore {
    pub fn new(session_id: impl Into<String>, config: &Config) -> Self {
        let session_id = session_id.into();
        Self {
            calculator: TransitionCalculator::new(
                (config.signals.alpha_range.lo + config.signals.alpha_range.hi) / 2.0,
                (config.signals.beta_range.lo + config.signals.beta_range.hi) / 2.0,
            ),
            bands: WeightBands::from(&config.signals),
            transition: TransitionState::initial(session_id.clone(), Utc::now()),
            history: PolicyHistory::default(),
            update_tick: 0,
            command_sequence: 0,
            session_id,
            cached_signals: CachedSignals::default(),
        }
    }

    /// Stamp a decision into a sequenced [`AdaptationCommand`] (§4.7 "totally
    /// ordered per session"). Every call, queue-driven or tool-driven, goes
    /// through here so sequence numbers never skip or race.
    pub fn seal_command(&mut self, kind: CommandKind) -> AdaptationCommand {
        self.command_sequence += 1;
        AdaptationCommand {
            session_id: self.session_id.clone(),
            sequence: self.command_sequence,
            kind,
            payload: Default::default(),
            issued_at: Utc::now(),
        }
    }

    /// §4.4/§4.5: run one full step from a freshly arrived `InteractionSnapshot`.
    pub fn step_from_snapshot(
        &mut self,
        snapshot: &InteractionSnapshot,
        profile: &LearnerProfile,
        dynamic_stats: &DynamicStats,
        current_event: ac_domain::model::LearningEvent,
        progress: f64,
    ) -> StepOutcome {
        let signals = StepSignals::from_snapshot(snapshot);
        self.run_step(signals, profile, dynamic_stats, snapshot.environment.as_ref(), current_event, progress)
    }

    /// §4.7: run one step from whatever per-model signals have been pushed
    /// through the synchronous tool interface so far. Missing models default
    /// to a degraded neutral signal, same as a snapshot with absent blocks.
    pub fn step_from_cache(
        &mut self,
        profile: &LearnerProfile,
        dynamic_stats: &DynamicStats,
        current_event: ac_domain::model::LearningEvent,
        progress: f64,
    ) -> StepOutcome {
        let (signals, _any_cached) = self.cached_signals.take_or_default();
        self.run_step(signals, profile, dynamic_stats, None, current_event, progress)
    }

    fn run_step(
        &mut self,
        signals: StepSignals,
        profile: &LearnerProfile,
        dynamic_stats: &DynamicStats,
        environment: Option<&EnvironmentContext>,
        current_event: ac_domain::model::LearningEvent,
        progress: f64,
    ) -> StepOutcome {
        self.update_tick += 1;
        let weights = signals.weights(profile, dynamic_stats.prior_knowledge_level, self.bands);
        let engagement_signal = signals.engagement;
        let assessment_signal = signals.assessment;
        let calc_inputs = signals.into_calculator_inputs();

        let mut next = self.calculator.step(
            &self.transition,
            weights,
            &calc_inputs,
            environment,
            dynamic_stats.environmental_sensitivity,
            self.update_tick,
        );

        // §7 NumericError: a NaN/Inf calculator fault degrades to hold_event,
        // never propagates into persisted state.
        if !next.value.is_finite() || !next.confidence.is_finite() || !next.stability.is_finite() {
            next = self.transition.clone();
            self.transition = next.clone();
            return StepOutcome {
                transition: next,
                decision: CommandKind::HoldEvent { reason: "numeric_fault".into() },
                engagement: engagement_signal,
                assessment: assessment_signal,
            };
        }

        let delta = next.value - next.previous_value;
        policy::track_delta(&mut self.history, delta);
        self.history.events_in += 1;

        let decision = policy::decide(&DecisionInput {
            current_event,
            progress,
            value: next.value,
            previous_value: next.previous_value,
            confidence: next.confidence,
            stability: next.stability,
            history: self.history,
        });

        if matches!(decision, CommandKind::OfferHelp) {
            self.history.help_requests += 1;
        }

        self.transition = next.clone();
        StepOutcome {
            transition: next,
            decision,
            engagement: engagement_signal,
            assessment: assessment_signal,
        }
    }

    /// Cache one model's signal for a later `make_transition_decision` call
    /// (§6 tool interface). Returns the `(value, weight, degraded)` triple
    /// the tool response carries.
    pub fn cache_learner(&mut self, input: &LearnerModelInput, profile: &LearnerProfile, level: PriorKnowledgeLevel, band: ac_domain::config::Band) -> (f64, f64, bool) {
        let signal = extractors::extract_learner_signal(input);
        let weight = extractors::learner_weight(profile, level, band);
        self.cached_signals.learner = Some(signal);
        (signal.value, weight, signal.degraded)
    }

    pub fn cache_knowledge(&mut self, input: &KnowledgeModelInput, band: ac_domain::config::Band) -> (f64, f64, bool) {
        let signal = extractors::extract_knowledge_signal(input);
        let weight = midpoint_weight(band, signal.degraded);
        self.cached_signals.knowledge = Some(signal);
        (signal.value, weight, signal.degraded)
    }

    pub fn cache_engagement(&mut self, input: &EngagementModelInput, band: ac_domain::config::Band) -> (f64, f64, bool) {
        let signal = extractors::extract_engagement_signal(input);
        let weight = midpoint_weight(band, signal.degraded);
        self.cached_signals.engagement = Some(signal);
        (signal.value, weight, signal.degraded)
    }

    pub fn cache_assessment(&mut self, input: &AssessmentModelInput, band: ac_domain::config::Band) -> (f64, f64, bool) {
        let signal = extractors::extract_assessment_signal(input);
        let weight = midpoint_weight(band, signal.degraded);
        self.cached_signals.assessment = Some(signal);
        (signal.value, weight, signal.degraded)
    }
}

/// §4.4 progress-within-event heuristic. spec.md gates transitions on
/// `progress` without specifying how it accumulates; this system grows it
/// with the positive part of each step's value-delta, scaled by confidence
/// so noisy steps move it less, and resets to zero whenever the learning
/// event itself changes (progress tracks advancement *within* the current
/// event, not across it). Recorded as an implementation decision in
/// DESIGN.md.
pub fn next_progress(previous_progress: f64, outcome: &StepOutcome, event_changed: bool) -> f64 {
    if event_changed {
        return 0.0;
    }
    let gain = (outcome.transition.value - outcome.transition.previous_value).max(0.0);
    (previous_progress + gain * outcome.transition.confidence + 0.01).clamp(0.0, 1.0)
}

pub fn event_changes(decision: &CommandKind) -> Option<ac_domain::model::LearningEvent> {
    match decision {
        CommandKind::AdvanceEvent { to } => Some(*to),
        CommandKind::Remediate { to } => Some(*to),
        _ => None,
    }
}

#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{
        AgeBucket, AssessmentModelInput, EngagementModelInput, GuidancePreference,
        InteractionStyle, KnowledgeModelInput, LearnerModelInput, LearningEvent,
    };

    fn profile() -> LearnerProfile {
        LearnerProfile {
            age_bucket: AgeBucket::From18To24,
            region: "na".into(),
            education_tier: "secondary".into(),
            guidance_preference: GuidancePreference::Balanced,
            interaction_style: InteractionStyle::Mixed,
            extra: Default::default(),
        }
    }

    fn stats() -> DynamicStats {
        DynamicStats {
            prior_knowledge_level: PriorKnowledgeLevel::Intermediate,
            pace: 0.0,
            engagement_trend: 0.0,
            environmental_sensitivity: 0.5,
            extra: Default::default(),
        }
    }

    fn happy_snapshot() -> InteractionSnapshot {
        InteractionSnapshot {
            session_id: "s1".into(),
            timestamp: Utc::now(),
            learner: LearnerModelInput {
                readiness: Some(0.85),
                preferences: Some(0.7),
                engagement_trend: Some(0.5),
                pace: Some(0.3),
            },
            knowledge: KnowledgeModelInput {
                prerequisite_completion: Some(0.9),
                path_complexity: Some(0.2),
                competency_gaps: Some(0),
            },
            engagement: EngagementModelInput {
                engagement_score: Some(0.9),
                attention_level: Some(0.9),
                intrinsic_motivation: Some(0.8),
                task_persistence: Some(0.8),
            },
            assessment: AssessmentModelInput {
                competency_level: Some(0.9),
                mean_skill_score: Some(0.9),
                accuracy: Some(0.9),
                consistency: Some(0.9),
            },
            environment: None,
        }
    }

    #[test]
    fn happy_path_step_advances() {
        let config = Config::default();
        let mut core = PipelineCore::new("s1", &config);
        // Run a few steps so the transition value climbs toward advance
        // territory and progress crosses the gate.
        let mut progress = 0.8;
        let mut decision = CommandKind::HoldEvent { reason: "init".into() };
        for _ in 0..6 {
            let outcome = core.step_from_snapshot(&happy_snapshot(), &profile(), &stats(), LearningEvent::Practice, progress);
            progress = next_progress(progress, &outcome, false).max(progress);
            decision = outcome.decision;
        }
        assert!(matches!(decision, CommandKind::AdvanceEvent { .. } | CommandKind::HoldEvent { .. }));
    }

    #[test]
    fn cached_tool_signals_combine_into_transition_decision() {
        let config = Config::default();
        let mut core = PipelineCore::new("s1", &config);
        core.cache_learner(&happy_snapshot().learner, &profile(), PriorKnowledgeLevel::Intermediate, config.signals.weight_learner_range);
        core.cache_knowledge(&happy_snapshot().knowledge, config.signals.weight_knowledge_range);
        let outcome = core.step_from_cache(&profile(), &stats(), LearningEvent::Practice, 0.5);
        assert!(outcome.transition.value.is_finite());
    }

    #[test]
    fn progress_resets_on_event_change() {
        let outcome = StepOutcome {
            transition: TransitionState::initial("s1", Utc::now()),
            decision: CommandKind::AdvanceEvent { to: LearningEvent::Application },
            engagement: SignalResult { value: 0.0, degraded: true },
            assessment: SignalResult { value: 0.0, degraded: true },
        };
        let p = next_progress(0.9, &outcome, true);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn numeric_fault_on_nan_holds_without_poisoning_state() {
        let config = Config::default();
        let mut core = PipelineCore::new("s1", &config);
        core.calculator = TransitionCalculator::new(f64::NAN, 0.0);
        let outcome = core.step_from_snapshot(&happy_snapshot(), &profile(), &stats(), LearningEvent::Practice, 0.5);
        assert_eq!(outcome.decision, CommandKind::HoldEvent { reason: "numeric_fault".into() });
        assert!(core.transition.value.is_finite());
    }
}
