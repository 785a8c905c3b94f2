//! Bot factory daemon entry point.
//!
//! Binary name: `bfy`
//!
//! Loads `config.toml` from the data directory, opens the SQLite stores,
//! hydrates governance state, starts the configured bot fleet, and runs
//! until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use botfoundry_core::event::EventBus;
use botfoundry_core::factory::{start_bots, FactoryServices};
use botfoundry_core::governance::GovernanceManager;
use botfoundry_core::knowledge::MemoryKnowledgeStore;
use botfoundry_infra::analysis::PrAnalysisClient;
use botfoundry_infra::config::load_factory_config;
use botfoundry_infra::knowledge::KnowledgeClient;
use botfoundry_infra::sqlite::{
    default_database_url, DatabasePool, SqliteGovernanceRepo, SqliteStateStore, SqliteXpLedger,
};
use botfoundry_types::bot::BotKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let enable_otel = std::env::var("BOTFOUNDRY_OTEL").is_ok_and(|v| v == "1");
    botfoundry_observe::tracing_setup::init_tracing(enable_otel)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let data_dir = data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;
    let config = load_factory_config(&data_dir).await;

    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(default_database_url);
    let pool = DatabasePool::new(&database_url).await?;

    let bus = Arc::new(EventBus::new(
        config.subscriber_queue_capacity,
        config.event_history_cap,
    ));
    let knowledge: Arc<dyn botfoundry_core::knowledge::KnowledgeStore> =
        match std::env::var("BOTFOUNDRY_KNOWLEDGE_URL") {
            Ok(url) => Arc::new(KnowledgeClient::new(url, env_token("BOTFOUNDRY_KNOWLEDGE_TOKEN"))),
            // Without a knowledge service the factory still runs; precedent
            // lookup degrades to the process-local store.
            Err(_) => Arc::new(MemoryKnowledgeStore::new()),
        };
    let analyzer_url = std::env::var("BOTFOUNDRY_ANALYZER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8088".to_string());
    let analysis = Arc::new(PrAnalysisClient::new(
        analyzer_url,
        env_token("BOTFOUNDRY_ANALYZER_TOKEN"),
    ));

    // The manager applies one approval policy; it comes from the PR review
    // bot's config entry when one exists.
    let policy = config
        .bots
        .iter()
        .find(|b| b.kind == BotKind::PrReview)
        .map(|b| b.approval_policy)
        .unwrap_or_default();

    let governance = Arc::new(GovernanceManager::new(
        bus.clone(),
        knowledge.clone(),
        Arc::new(SqliteGovernanceRepo::new(pool.clone())),
        policy,
    ));
    governance
        .hydrate()
        .await
        .map_err(|e| anyhow::anyhow!("governance hydration failed: {e}"))?;

    let services = FactoryServices {
        bus,
        state: Arc::new(SqliteStateStore::new(pool.clone())),
        governance,
        analysis,
        knowledge,
        ledger: Arc::new(SqliteXpLedger::new(pool)),
    };

    let orchestrator = start_bots(&config, &services).await?;
    tracing::info!(
        bots = config.bots.len(),
        data_dir = %data_dir.display(),
        "factory running"
    );

    shutdown_signal().await;
    tracing::info!("shutdown requested, stopping fleet");
    orchestrator.shutdown().await;
    botfoundry_observe::tracing_setup::shutdown_tracing();
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var("BOTFOUNDRY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".botfoundry")
        })
}

fn env_token(var: &str) -> SecretString {
    SecretString::from(std::env::var(var).unwrap_or_default())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
