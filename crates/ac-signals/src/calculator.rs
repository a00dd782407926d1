//! Transition Calculator (spec §4.4): the learning equation
//! `value' = clamp(value + α·Δ + β·ε, 0, 1)`.
//!
//! Grounded on `LearningEquationCalculator.calculate_learning_equation` and
//! its `_calculate_environmental_factors` / `_calculate_transition_confidence`
//! / `_calculate_stability_metric` helpers. `ε` additionally folds in a
//! deterministic jitter term seeded from the session ID and an update
//! counter, so environmental noise is reproducible under replay (spec §8
//! "deterministic replay") rather than drawn from a live RNG.

use ac_domain::model::{EnvironmentContext, EnvironmentTag, ModelWeights, TransitionState};
use chrono::Utc;

use crate::extractors::normalise_weights;
use crate::SignalResult;

pub struct SignalInputs {
    pub learner: SignalResult,
    pub knowledge: SignalResult,
    pub engagement: SignalResult,
    pub assessment: SignalResult,
}

impl SignalInputs {
    pub fn any_degraded(&self) -> bool {
        self.learner.degraded || self.knowledge.degraded || self.engagement.degraded || self.assessment.degraded
    }
}

/// §4.4: `α ∈ [0.1, 1.0]`, `β ∈ [0, 0.5]`.
pub struct TransitionCalculator {
    pub alpha: f64,
    pub beta: f64,
}

impl TransitionCalculator {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Advance `state` by one interaction snapshot. `update_tick` is the
    /// session's monotonically increasing event counter, used only to seed
    /// the deterministic jitter term.
    pub fn step(
        &self,
        state: &TransitionState,
        weights: ModelWeights,
        signals: &SignalInputs,
        environment: Option<&EnvironmentContext>,
        sensitivity: f64,
        update_tick: u64,
    ) -> TransitionState {
        let weights = normalise_weights(weights);

        let integration = (weights.w_learner * signals.learner.value
            + weights.w_knowledge * signals.knowledge.value
            + weights.w_engagement * signals.engagement.value
            + weights.w_assessment * signals.assessment.value)
            .clamp(-1.0, 1.0);

        let noise = environmental_factor(environment, sensitivity, &state.session_id, update_tick);

        let adaptation_term = self.alpha * integration;
        let noise_term = self.beta * noise;

        let new_value = (state.value + adaptation_term + noise_term).clamp(0.0, 1.0);

        let confidence = transition_confidence(integration, noise, self.alpha);
        let stability = stability_metric(state.value, new_value, adaptation_term);

        TransitionState {
            session_id: state.session_id.clone(),
            value: new_value,
            previous_value: state.value,
            integration,
            noise,
            alpha: self.alpha,
            beta: self.beta,
            weights,
            confidence,
            stability,
            updated_at: Utc::now(),
        }
    }
}

fn fatigue_factor(session_duration_minutes: f64) -> f64 {
    const OPTIMAL: f64 = 25.0;
    if session_duration_minutes <= OPTIMAL {
        0.1 * (session_duration_minutes / OPTIMAL - 0.5)
    } else {
        (-0.02 * (session_duration_minutes - OPTIMAL)).max(-0.5)
    }
}

fn time_factor(wall_hour: u8) -> f64 {
    match wall_hour {
        9 | 10 | 11 | 14 | 15 | 16 => 0.2,
        0..=5 | 22 | 23 => -0.2,
        _ => 0.0,
    }
}

fn environment_factor(tag: EnvironmentTag) -> f64 {
    match tag {
        EnvironmentTag::Optimal => 0.3,
        EnvironmentTag::Standard => 0.0,
        EnvironmentTag::Noisy => -0.2,
        EnvironmentTag::Distracted => -0.3,
        EnvironmentTag::Mobile => -0.1,
    }
}

/// Small deterministic jitter in `[-1, 1]`, stable for a given
/// `(session_id, tick)` pair so replaying the same event sequence
/// reproduces the same ε.
fn deterministic_jitter(session_id: &str, tick: u64) -> f64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    session_id.hash(&mut hasher);
    tick.hash(&mut hasher);
    let bits = hasher.finish();
    // Map the top 32 bits onto [-1, 1].
    ((bits >> 32) as f64 / u32::MAX as f64) * 2.0 - 1.0
}

/// §4.4 ε(t): base environmental signal scaled by the learner's
/// environmental sensitivity, plus a small deterministic jitter, clamped
/// to `[-0.5, 0.5]`.
fn environmental_factor(
    environment: Option<&EnvironmentContext>,
    sensitivity: f64,
    session_id: &str,
    update_tick: u64,
) -> f64 {
    let base = match environment {
        Some(env) => {
            0.4 * fatigue_factor(env.session_duration_minutes)
                + 0.3 * time_factor(env.wall_hour)
                + 0.3 * environment_factor(env.environment_tag)
        }
        None => 0.0,
    };
    let jitter = 0.05 * deterministic_jitter(session_id, update_tick);
    (base * sensitivity + jitter).clamp(-0.5, 0.5)
}

fn transition_confidence(integration: f64, noise: f64, alpha: f64) -> f64 {
    let signal_strength = integration.abs();
    let noise_level = noise.abs();

    let mut confidence = 0.5 * signal_strength + 0.3 * (1.0 - noise_level) + 0.2 * alpha;
    if signal_strength > 0.7 {
        confidence += 0.1;
    }
    if noise_level > 0.3 {
        confidence -= 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

fn stability_metric(previous: f64, new_value: f64, adaptation_term: f64) -> f64 {
    let change = (new_value - previous).abs();
    let mut stability = if change < 0.1 {
        1.0
    } else if change < 0.3 {
        0.8
    } else if change < 0.5 {
        0.6
    } else {
        0.4
    };
    if adaptation_term.abs() > 0.5 {
        stability *= 0.8;
    }
    stability.clamp(0.0, 1.0)
}
