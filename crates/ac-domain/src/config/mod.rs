mod compliance;
mod persistence;
mod pipeline;
mod server;
mod signals;

pub use compliance::*;
pub use persistence::*;
pub use pipeline::*;
pub use server::*;
pub use signals::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Snapshot taken at startup (spec §6 "Configuration"). Loaded once from
/// TOML, validated, then wrapped in `Arc` and handed to every component —
/// nothing mutates it after boot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub signals: SignalBandsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

impl Config {
    /// Apply the `ADC_*` environment-variable overrides named in spec §6:
    /// server name, maximum learners, debug flag, compliance flag,
    /// persistence location, cache flag.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ADC_SERVER_NAME") {
            self.server.name = v;
        }
        if let Ok(v) = std::env::var("ADC_MAX_LEARNERS") {
            if let Ok(n) = v.parse() {
                self.pipeline.max_concurrent_learners = n;
            }
        }
        if let Ok(v) = std::env::var("ADC_DEBUG") {
            self.server.debug = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("ADC_FERPA_COMPLIANCE") {
            self.compliance.ferpa_compliance_enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("ADC_PERSISTENCE_LOCATION") {
            self.persistence.location = v.into();
        }
        if let Ok(v) = std::env::var("ADC_CACHE_ENABLED") {
            self.persistence.cache_enabled = parse_bool(&v);
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means the configuration is safe to boot with.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.pipeline.max_concurrent_learners == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pipeline.max_concurrent_learners".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.pipeline.inbound_queue_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pipeline.inbound_queue_capacity".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.pipeline.calculator_budget_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "pipeline.calculator_budget_ms".into(),
                message: "a zero budget will report every calculator step as a latency violation".into(),
            });
        }
        if self.pipeline.end_to_end_budget_ms < self.pipeline.calculator_budget_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "pipeline.end_to_end_budget_ms".into(),
                message: "end-to-end budget is smaller than the calculator budget it contains".into(),
            });
        }

        // Signal bands: lo <= hi, and within the outer bounds the spec cites.
        check_band(&mut errors, "signals.alpha_range", self.signals.alpha_range, 0.0, 1.0);
        check_band(&mut errors, "signals.beta_range", self.signals.beta_range, 0.0, 1.0);
        check_band(
            &mut errors,
            "signals.weight_learner_range",
            self.signals.weight_learner_range,
            0.0,
            1.0,
        );
        check_band(
            &mut errors,
            "signals.weight_knowledge_range",
            self.signals.weight_knowledge_range,
            0.0,
            1.0,
        );
        check_band(
            &mut errors,
            "signals.weight_engagement_range",
            self.signals.weight_engagement_range,
            0.0,
            1.0,
        );
        check_band(
            &mut errors,
            "signals.weight_assessment_range",
            self.signals.weight_assessment_range,
            0.0,
            1.0,
        );

        if self.persistence.location.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "persistence.location".into(),
                message: "must not be empty".into(),
            });
        }

        if self.compliance.ferpa_compliance_enabled && !self.compliance.anonymisation_enabled {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "compliance.anonymisation_enabled".into(),
                message: "FERPA compliance requires anonymisation to be enabled".into(),
            });
        }
        if self.compliance.ferpa_compliance_enabled && !self.compliance.audit_logging_enabled {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "compliance.audit_logging_enabled".into(),
                message: "FERPA compliance requires audit logging to be enabled".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        if std::env::var(&self.server.auth.token_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.auth.token_env".into(),
                message: format!(
                    "{} is not set — the gateway will run unauthenticated",
                    self.server.auth.token_env
                ),
            });
        }

        errors
    }
}

fn check_band(errors: &mut Vec<ConfigError>, field: &str, band: Band, lo: f64, hi: f64) {
    if band.lo > band.hi {
        errors.push(ConfigError {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: format!("lo ({}) must not exceed hi ({})", band.lo, band.hi),
        });
    }
    if band.lo < lo || band.hi > hi {
        errors.push(ConfigError {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: format!("band [{}, {}] falls outside the expected [{lo}, {hi}] range", band.lo, band.hi),
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn port_zero_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "server.port").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn max_learners_zero_is_error() {
        let mut cfg = Config::default();
        cfg.pipeline.max_concurrent_learners = 0;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "pipeline.max_concurrent_learners")
                .unwrap()
                .severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn inverted_band_is_error() {
        let mut cfg = Config::default();
        cfg.signals.alpha_range = Band::new(0.9, 0.1);
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "signals.alpha_range").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn ferpa_without_anonymisation_is_error() {
        let mut cfg = Config::default();
        cfg.compliance.ferpa_compliance_enabled = true;
        cfg.compliance.anonymisation_enabled = false;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "compliance.anonymisation_enabled")
                .unwrap()
                .severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.cors.allowed_origins")
                .unwrap()
                .severity,
            ConfigSeverity::Warning
        );
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, cfg.server.port);
    }

    #[test]
    fn env_overrides_applied() {
        std::env::set_var("ADC_SERVER_NAME", "test-server");
        std::env::set_var("ADC_MAX_LEARNERS", "128");
        std::env::set_var("ADC_DEBUG", "true");
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.server.name, "test-server");
        assert_eq!(cfg.pipeline.max_concurrent_learners, 128);
        assert!(cfg.server.debug);
        std::env::remove_var("ADC_SERVER_NAME");
        std::env::remove_var("ADC_MAX_LEARNERS");
        std::env::remove_var("ADC_DEBUG");
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");
    }
}
