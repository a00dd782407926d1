//! Signal Extractors (spec §4.3): turn each model's raw input blob into a
//! normalised signal in `[-1, 1]` plus the weight it contributes to the
//! Transition Calculator's integration term.
//!
//! Formulas and defaults are grounded on the original learning-equation
//! calculator's `_extract_*_signal` methods; missing fields fall back to
//! the neutral point of their native range (`0.5` for `[0,1]`-scaled
//! inputs that get centred in the formula, `0.0` for inputs already
//! centred, `0` for counts) and mark the result `degraded`.

use ac_domain::config::Band;
use ac_domain::model::{
    AssessmentModelInput, EngagementModelInput, GuidancePreference, InteractionStyle,
    KnowledgeModelInput, LearnerModelInput, LearnerProfile, ModelWeights, PriorKnowledgeLevel,
};

use crate::SignalResult;

fn clamp_signal(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

/// §4.3 Learner extractor.
pub fn extract_learner_signal(input: &LearnerModelInput) -> SignalResult {
    let mut degraded = false;
    let mut take = |v: Option<f64>, default: f64| {
        degraded |= v.is_none();
        v.unwrap_or(default)
    };

    let readiness = take(input.readiness, 0.5);
    let preferences = take(input.preferences, 0.5);
    let engagement_trend = take(input.engagement_trend, 0.0);
    let pace = take(input.pace, 0.0);

    let value = 0.4 * (readiness - 0.5) * 2.0
        + 0.3 * (preferences - 0.5) * 2.0
        + 0.2 * engagement_trend
        + 0.1 * pace;

    SignalResult {
        value: clamp_signal(value),
        degraded,
    }
}

/// §4.3 Knowledge extractor.
pub fn extract_knowledge_signal(input: &KnowledgeModelInput) -> SignalResult {
    let mut degraded = false;
    let prereq = input.prerequisite_completion.unwrap_or_else(|| {
        degraded = true;
        0.5
    });
    let complexity = input.path_complexity.unwrap_or_else(|| {
        degraded = true;
        0.5
    });
    let gaps = input.competency_gaps.unwrap_or_else(|| {
        degraded = true;
        0
    });

    let value = 0.5 * (prereq - 0.5) * 2.0 + 0.3 * ((1.0 - complexity) - 0.5) * 2.0
        - 0.2 * (0.1 * gaps as f64).min(1.0);

    SignalResult {
        value: clamp_signal(value),
        degraded,
    }
}

/// §4.3 Engagement extractor.
pub fn extract_engagement_signal(input: &EngagementModelInput) -> SignalResult {
    let mut degraded = false;
    let mut take = |v: Option<f64>| {
        degraded |= v.is_none();
        v.unwrap_or(0.5)
    };

    let engagement = take(input.engagement_score);
    let attention = take(input.attention_level);
    let intrinsic = take(input.intrinsic_motivation);
    let persistence = take(input.task_persistence);

    let value = 0.4 * (engagement - 0.5) * 2.0
        + 0.3 * (attention - 0.5) * 2.0
        + 0.2 * (intrinsic - 0.5) * 2.0
        + 0.1 * (persistence - 0.5) * 2.0;

    SignalResult {
        value: clamp_signal(value),
        degraded,
    }
}

/// §4.3 Assessment extractor.
pub fn extract_assessment_signal(input: &AssessmentModelInput) -> SignalResult {
    let mut degraded = false;
    let mut take = |v: Option<f64>| {
        degraded |= v.is_none();
        v.unwrap_or(0.5)
    };

    let competency = take(input.competency_level);
    let skill = take(input.mean_skill_score);
    let accuracy = take(input.accuracy);
    let consistency = take(input.consistency);

    let value = 0.4 * (competency - 0.5) * 2.0
        + 0.3 * (skill - 0.5) * 2.0
        + 0.2 * (accuracy - 0.5) * 2.0
        + 0.1 * (consistency - 0.5) * 2.0;

    SignalResult {
        value: clamp_signal(value),
        degraded,
    }
}

/// §4.3 Learner-model weight: base weight by prior-knowledge level, adjusted
/// by guidance preference and interaction style, clamped to `weight_range`.
pub fn learner_weight(profile: &LearnerProfile, level: PriorKnowledgeLevel, weight_range: Band) -> f64 {
    let guidance_adjustment = match profile.guidance_preference {
        GuidancePreference::Thorough => 0.05,
        GuidancePreference::Balanced => 0.0,
        GuidancePreference::Minimal => -0.03,
    };
    let style_adjustment = match profile.interaction_style {
        InteractionStyle::Structured => 0.02,
        InteractionStyle::Mixed => 0.01,
        InteractionStyle::Exploratory => -0.02,
    };

    weight_range.clamp(level.base_weight() + guidance_adjustment + style_adjustment)
}

/// Normalise four model weights so they sum to `1.0`, matching the
/// calculator's renormalisation when configured bands don't already
/// agree on a partition (E.7).
pub fn normalise_weights(weights: ModelWeights) -> ModelWeights {
    let total = weights.sum();
    if total <= f64::EPSILON {
        return ModelWeights {
            w_learner: 0.25,
            w_knowledge: 0.25,
            w_engagement: 0.25,
            w_assessment: 0.25,
        };
    }
    if (total - 1.0).abs() <= 0.01 {
        return weights;
    }
    ModelWeights {
        w_learner: weights.w_learner / total,
        w_knowledge: weights.w_knowledge / total,
        w_engagement: weights.w_engagement / total,
        w_assessment: weights.w_assessment / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{AgeBucket, PriorKnowledgeLevel};

    #[test]
    fn neutral_input_yields_zero_learner_signal() {
        let input = LearnerModelInput {
            readiness: Some(0.5),
            preferences: Some(0.5),
            engagement_trend: Some(0.0),
            pace: Some(0.0),
        };
        let result = extract_learner_signal(&input);
        assert!((result.value).abs() < 1e-9);
        assert!(!result.degraded);
    }

    #[test]
    fn missing_fields_mark_degraded() {
        let result = extract_learner_signal(&LearnerModelInput::default());
        assert!(result.degraded);
    }

    #[test]
    fn high_readiness_yields_positive_signal() {
        let input = LearnerModelInput {
            readiness: Some(1.0),
            preferences: Some(0.5),
            engagement_trend: Some(0.0),
            pace: Some(0.0),
        };
        let result = extract_learner_signal(&input);
        assert!(result.value > 0.0);
    }

    #[test]
    fn knowledge_gaps_penalise_signal() {
        let no_gaps = extract_knowledge_signal(&KnowledgeModelInput {
            prerequisite_completion: Some(0.8),
            path_complexity: Some(0.3),
            competency_gaps: Some(0),
        });
        let with_gaps = extract_knowledge_signal(&KnowledgeModelInput {
            prerequisite_completion: Some(0.8),
            path_complexity: Some(0.3),
            competency_gaps: Some(5),
        });
        assert!(with_gaps.value < no_gaps.value);
    }

    #[test]
    fn learner_weight_clamped_to_range() {
        let profile = LearnerProfile {
            age_bucket: AgeBucket::From25To34,
            region: "na".into(),
            education_tier: "secondary".into(),
            guidance_preference: GuidancePreference::Thorough,
            interaction_style: InteractionStyle::Structured,
            extra: Default::default(),
        };
        let band = Band::new(0.25, 0.40);
        let w = learner_weight(&profile, PriorKnowledgeLevel::Advanced, band);
        assert!(band.contains(w));
        // 0.25 base + 0.05 + 0.02 = 0.32, within range and not clamped.
        assert!((w - 0.32).abs() < 1e-9);
    }

    #[test]
    fn learner_weight_clamps_at_upper_bound() {
        let profile = LearnerProfile {
            age_bucket: AgeBucket::Under18,
            region: "na".into(),
            education_tier: "primary".into(),
            guidance_preference: GuidancePreference::Thorough,
            interaction_style: InteractionStyle::Structured,
            extra: Default::default(),
        };
        let band = Band::new(0.25, 0.40);
        // 0.40 base + 0.05 + 0.02 = 0.47, clamped to 0.40.
        let w = learner_weight(&profile, PriorKnowledgeLevel::Novice, band);
        assert_eq!(w, 0.40);
    }

    #[test]
    fn normalise_weights_is_noop_when_already_summing_to_one() {
        let w = ModelWeights {
            w_learner: 0.35,
            w_knowledge: 0.25,
            w_engagement: 0.20,
            w_assessment: 0.20,
        };
        let n = normalise_weights(w);
        assert!((n.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalise_weights_rescales_when_off() {
        let w = ModelWeights {
            w_learner: 0.4,
            w_knowledge: 0.4,
            w_engagement: 0.4,
            w_assessment: 0.4,
        };
        let n = normalise_weights(w);
        assert!((n.sum() - 1.0).abs() < 1e-9);
        assert!((n.w_learner - 0.25).abs() < 1e-9);
    }
}
