use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            host: d_host(),
            port: d_port(),
            cors: CorsConfig::default(),
            auth: AuthConfig::default(),
            debug: false,
        }
    }
}

fn d_name() -> String {
    "adaptation-core".into()
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    7400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_origins(),
        }
    }
}

fn d_origins() -> Vec<String> {
    vec!["*".into()]
}

/// Credential/audit boundary (spec §6 "auth_token_ttl_hours").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the bearer token clients must present.
    /// If unset, the gateway runs unauthenticated (dev mode).
    #[serde(default = "d_token_env")]
    pub token_env: String,
    #[serde(default = "d_ttl")]
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: d_token_env(),
            token_ttl_hours: d_ttl(),
        }
    }
}

fn d_token_env() -> String {
    "ADC_API_TOKEN".into()
}
fn d_ttl() -> u64 {
    24
}
