//! Decision Policy (spec §4.5): seven ordered, short-circuiting rules that
//! turn a freshly computed [`TransitionState`] into zero or more
//! [`CommandKind`]s.
//!
//! Grounded in spirit on the gateway's `ResetReason`/`LifecycleManager`
//! short-circuit evaluation style (`should_reset` returns on the first
//! applicable rule) — here generalised to a priority-ordered rule list
//! instead of two checks.

use ac_domain::model::{CommandKind, DifficultyDirection, LearningEvent};

/// Rolling counters the policy needs beyond the latest `TransitionState`
/// (spec §4.5 rule 4: "help-rate > 0.2, or |Δ| < 0.05 for 3 consecutive
/// updates").
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyHistory {
    pub help_requests: u64,
    pub events_in: u64,
    pub consecutive_small_deltas: u32,
}

impl PolicyHistory {
    pub fn help_rate(&self) -> f64 {
        if self.events_in == 0 {
            0.0
        } else {
            self.help_requests as f64 / self.events_in as f64
        }
    }
}

pub struct DecisionInput {
    pub current_event: LearningEvent,
    pub progress: f64,
    pub value: f64,
    pub previous_value: f64,
    pub confidence: f64,
    pub stability: f64,
    pub history: PolicyHistory,
}

/// Evaluate the seven ordered rules, returning the first that fires.
/// Always returns exactly one command — rule 7 (hold) is the default.
pub fn decide(input: &DecisionInput) -> CommandKind {
    let delta = input.value - input.previous_value;

    // Rule 1: low confidence always wins, regardless of value.
    if input.confidence < 0.35 {
        return CommandKind::HoldEvent {
            reason: "low_confidence".into(),
        };
    }

    // Rule 2: mastery. Beats rule 5 (help offer) by being checked first.
    // A mastery session holds in place until progress actually reaches
    // 1.0 — the gate alone (progress >= 0.8) only arms the terminate,
    // it doesn't fire it.
    if input.value >= 0.85 && input.stability >= 0.6 && input.progress >= 0.8 {
        if input.current_event == LearningEvent::Mastery {
            if input.progress >= 1.0 {
                return CommandKind::Terminate;
            }
        } else {
            return CommandKind::AdvanceEvent {
                to: input.current_event.advance(),
            };
        }
    }

    // Rule 3: struggling. Beats rule 6 (difficulty decrease) by being
    // checked first.
    if input.value <= 0.25 && input.current_event != LearningEvent::Onboarding {
        return CommandKind::Remediate {
            to: input.current_event.remediate(),
        };
    }

    // Rule 4: help offer — excessive help-seeking or a plateau.
    if input.history.help_rate() > 0.2 || input.history.consecutive_small_deltas >= 3 {
        return CommandKind::OfferHelp;
    }

    // Rule 5 / 6: difficulty adjustment. Mutually exclusive by construction
    // (delta can't be both > 0.15 and < -0.15).
    if delta > 0.15 {
        return CommandKind::AdjustDifficulty {
            direction: DifficultyDirection::Increase,
        };
    }
    if delta < -0.15 {
        return CommandKind::AdjustDifficulty {
            direction: DifficultyDirection::Decrease,
        };
    }

    // Rule 7: default — hold.
    CommandKind::HoldEvent {
        reason: "steady_state".into(),
    }
}

/// Update the plateau counter for rule 4, given the latest `Δ`.
pub fn track_delta(history: &mut PolicyHistory, delta: f64) {
    if delta.abs() < 0.05 {
        history.consecutive_small_deltas += 1;
    } else {
        history.consecutive_small_deltas = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DecisionInput {
        DecisionInput {
            current_event: LearningEvent::Practice,
            progress: 0.5,
            value: 0.5,
            previous_value: 0.5,
            confidence: 0.9,
            stability: 0.9,
            history: PolicyHistory::default(),
        }
    }

    #[test]
    fn low_confidence_holds_regardless_of_value() {
        let mut input = base();
        input.confidence = 0.2;
        input.value = 0.95;
        input.progress = 0.95;
        assert_eq!(
            decide(&input),
            CommandKind::HoldEvent { reason: "low_confidence".into() }
        );
    }

    #[test]
    fn mastery_conditions_advance() {
        let mut input = base();
        input.value = 0.9;
        input.stability = 0.7;
        input.progress = 0.85;
        assert_eq!(
            decide(&input),
            CommandKind::AdvanceEvent { to: LearningEvent::Application }
        );
    }

    #[test]
    fn mastery_at_top_event_terminates_once_progress_completes() {
        let mut input = base();
        input.current_event = LearningEvent::Mastery;
        input.value = 0.9;
        input.stability = 0.7;
        input.progress = 1.0;
        assert_eq!(decide(&input), CommandKind::Terminate);
    }

    #[test]
    fn mastery_at_top_event_holds_until_progress_completes() {
        let mut input = base();
        input.current_event = LearningEvent::Mastery;
        input.value = 0.9;
        input.stability = 0.7;
        input.progress = 0.85;
        assert_eq!(
            decide(&input),
            CommandKind::HoldEvent { reason: "steady_state".into() }
        );
    }

    #[test]
    fn low_value_remediates() {
        let mut input = base();
        input.value = 0.2;
        assert_eq!(
            decide(&input),
            CommandKind::Remediate { to: LearningEvent::Introduction }
        );
    }

    #[test]
    fn onboarding_cannot_remediate_further() {
        let mut input = base();
        input.current_event = LearningEvent::Onboarding;
        input.value = 0.1;
        assert_eq!(
            decide(&input),
            CommandKind::HoldEvent { reason: "steady_state".into() }
        );
    }

    #[test]
    fn excessive_help_requests_offer_help() {
        let mut input = base();
        input.history.help_requests = 3;
        input.history.events_in = 10;
        assert_eq!(decide(&input), CommandKind::OfferHelp);
    }

    #[test]
    fn plateau_offers_help() {
        let mut input = base();
        input.history.consecutive_small_deltas = 3;
        assert_eq!(decide(&input), CommandKind::OfferHelp);
    }

    #[test]
    fn positive_delta_increases_difficulty() {
        let mut input = base();
        input.previous_value = 0.3;
        input.value = 0.5;
        assert_eq!(
            decide(&input),
            CommandKind::AdjustDifficulty { direction: DifficultyDirection::Increase }
        );
    }

    #[test]
    fn negative_delta_decreases_difficulty() {
        let mut input = base();
        input.previous_value = 0.5;
        input.value = 0.3;
        assert_eq!(
            decide(&input),
            CommandKind::AdjustDifficulty { direction: DifficultyDirection::Decrease }
        );
    }

    #[test]
    fn steady_state_holds() {
        let input = base();
        assert_eq!(
            decide(&input),
            CommandKind::HoldEvent { reason: "steady_state".into() }
        );
    }

    #[test]
    fn track_delta_resets_on_large_change() {
        let mut history = PolicyHistory { consecutive_small_deltas: 2, ..Default::default() };
        track_delta(&mut history, 0.3);
        assert_eq!(history.consecutive_small_deltas, 0);
    }
}
