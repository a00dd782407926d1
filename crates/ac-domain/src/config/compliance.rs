use serde::{Deserialize, Serialize};

/// FERPA-adjacent compliance knobs (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Gates anonymisation and audit strictness.
    #[serde(default)]
    pub ferpa_compliance_enabled: bool,
    #[serde(default = "d_true")]
    pub anonymisation_enabled: bool,
    #[serde(default = "d_true")]
    pub audit_logging_enabled: bool,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            ferpa_compliance_enabled: false,
            anonymisation_enabled: true,
            audit_logging_enabled: true,
        }
    }
}

fn d_true() -> bool {
    true
}
