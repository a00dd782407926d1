use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistence layout knobs (spec §6 "Persistence layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "d_location")]
    pub location: PathBuf,
    /// Enables an in-memory read-through cache in front of the file tables.
    #[serde(default = "d_cache_enabled")]
    pub cache_enabled: bool,
    /// Environment variable holding the base64 AES-256-GCM key used to
    /// encrypt learner-identifying rows at rest.
    #[serde(default = "d_key_env")]
    pub encryption_key_env: String,
    #[serde(default = "d_retention_days")]
    pub data_retention_days: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            location: d_location(),
            cache_enabled: d_cache_enabled(),
            encryption_key_env: d_key_env(),
            data_retention_days: d_retention_days(),
        }
    }
}

fn d_location() -> PathBuf {
    PathBuf::from("./data")
}
fn d_cache_enabled() -> bool {
    true
}
fn d_key_env() -> String {
    "ADC_ENCRYPTION_KEY".into()
}
fn d_retention_days() -> u32 {
    365
}
