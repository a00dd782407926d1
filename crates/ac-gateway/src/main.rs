use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use ac_domain::clock::DeadlineMetrics;
use ac_domain::config::{Config, ConfigSeverity};
use ac_gateway::cli::{Cli, Command, ConfigCommand};
use ac_gateway::state::AppState;
use ac_gateway::{api, pruning};
use ac_persist::{AssessmentStore, AuditSink, Cipher, EngagementStore, LearnerStore, PerformanceStore};
use ac_pipeline::{SessionPipelines, ToolRequestRouter};
use ac_sessions::{LearnerRegistry, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = ac_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = ac_gateway::cli::load_config()?;
            let passed = ac_gateway::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ac_gateway::cli::load_config()?;
            let valid = ac_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = ac_gateway::cli::load_config()?;
            ac_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("adaptation-core {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "adaptation-core exited with an error");
    }
    result
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ac_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway server with the given configuration snapshot (spec §6
/// "Configuration" — loaded once at startup, never mutated).
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!(name = %config.server.name, "adaptation-core starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Persistence layer (spec §6 "Persistence layout") ─────────────
    // `Cipher` is re-derived per table from the same secret — key derivation
    // is a deterministic hash (see `ac_persist::crypto`), so this yields
    // the same AES-256-GCM key every time without needing `Cipher: Clone`.
    let encryption_key = std::env::var(&config.persistence.encryption_key_env).unwrap_or_else(|_| {
        tracing::warn!(
            env_var = %config.persistence.encryption_key_env,
            "no encryption key set — learner rows will be encrypted with a process-default key"
        );
        "adaptation-core-dev-default".into()
    });
    let cipher_for = |key: &str| Cipher::from_secret(key.as_bytes());

    let session_store = Arc::new(
        SessionStore::new(&config.persistence.location).context("initializing session store")?,
    );
    let learner_store = Arc::new(
        LearnerStore::new(&config.persistence.location, cipher_for(&encryption_key))
            .context("initializing learner store")?,
    );
    let assessment_store = Arc::new(
        AssessmentStore::new(&config.persistence.location, cipher_for(&encryption_key))
            .context("initializing assessment store")?,
    );
    let engagement_store = Arc::new(
        EngagementStore::new(&config.persistence.location, cipher_for(&encryption_key))
            .context("initializing engagement store")?,
    );
    let performance_store = Arc::new(
        PerformanceStore::new(&config.persistence.location).context("initializing performance store")?,
    );
    let audit = {
        let mut sink = AuditSink::new(&config.persistence.location).context("initializing audit sink")?;
        if config.compliance.anonymisation_enabled {
            sink = sink.with_anonymisation(encryption_key.as_bytes().to_vec());
        }
        Arc::new(sink)
    };
    tracing::info!(path = %config.persistence.location.display(), "persistence layer ready");

    // ── Learner registry + session pipelines (spec §4.2, §4.6) ───────
    let registry = Arc::new(LearnerRegistry::new(config.pipeline.max_concurrent_learners));
    let metrics = Arc::new(DeadlineMetrics::default());
    let pipelines = Arc::new(SessionPipelines::new(
        config.clone(),
        registry.clone(),
        session_store.clone(),
        audit.clone(),
        assessment_store.clone(),
        engagement_store.clone(),
        metrics.clone(),
    ));
    let router = Arc::new(ToolRequestRouter::new(pipelines.clone()));
    tracing::info!(
        max_concurrent_learners = config.pipeline.max_concurrent_learners,
        "learner registry + session pipelines ready"
    );

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.auth.token_env;
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(
                    env_var = %env_var,
                    "API bearer-token auth DISABLED — set {env_var} to enable"
                );
                None
            }
        }
    };

    let state = AppState {
        config: config.clone(),
        registry,
        session_store,
        pipelines,
        router,
        audit,
        learner_store,
        assessment_store,
        engagement_store,
        performance_store,
        metrics,
        api_token_hash,
    };

    // ── Background sweeps: idle-session drain, registry pruning, flush ──
    pruning::spawn(state.clone());

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router(state.clone()).with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "adaptation-core listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
