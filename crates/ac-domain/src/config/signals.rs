use serde::{Deserialize, Serialize};

/// One `[lo, hi]` band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Band {
    pub lo: f64,
    pub hi: f64,
}

impl Band {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.lo, self.hi)
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }
}

/// Learning-equation parameter bands (spec §6 "learning-equation parameter
/// bands"; defaults taken from the original implementation's weight
/// defaults, see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBandsConfig {
    #[serde(default = "d_alpha")]
    pub alpha_range: Band,
    #[serde(default = "d_beta")]
    pub beta_range: Band,
    #[serde(default = "d_w_learner")]
    pub weight_learner_range: Band,
    #[serde(default = "d_w_knowledge")]
    pub weight_knowledge_range: Band,
    #[serde(default = "d_w_engagement")]
    pub weight_engagement_range: Band,
    #[serde(default = "d_w_assessment")]
    pub weight_assessment_range: Band,
}

impl Default for SignalBandsConfig {
    fn default() -> Self {
        Self {
            alpha_range: d_alpha(),
            beta_range: d_beta(),
            weight_learner_range: d_w_learner(),
            weight_knowledge_range: d_w_knowledge(),
            weight_engagement_range: d_w_engagement(),
            weight_assessment_range: d_w_assessment(),
        }
    }
}

fn d_alpha() -> Band {
    Band::new(0.1, 1.0)
}
fn d_beta() -> Band {
    Band::new(0.0, 0.5)
}
fn d_w_learner() -> Band {
    Band::new(0.25, 0.40)
}
fn d_w_knowledge() -> Band {
    Band::new(0.20, 0.35)
}
fn d_w_engagement() -> Band {
    Band::new(0.15, 0.30)
}
fn d_w_assessment() -> Band {
    Band::new(0.20, 0.35)
}
