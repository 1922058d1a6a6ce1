use anyhow::Context;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use withdrawal_review::api::{create_router, AppState};
use withdrawal_review::auth::{AccessGate, RoleRequirements};
use withdrawal_review::config::{load_config, AppConfig, LoggingConfig};
use withdrawal_review::db::client::DBClient;
use withdrawal_review::db::{MemoryWithdrawalStore, PgWithdrawalStore, WithdrawalStore};
use withdrawal_review::risk::HeuristicRiskEvaluator;
use withdrawal_review::workflow::WithdrawalWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("Withdrawal Review")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Risk-scored withdrawal review service")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("CONFIG_FILE")
                .help("Path to configuration file")
                .default_value("config.toml")
                .value_parser(clap::value_parser!(String)),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .context("missing --config")?;
    let config = load_config(Some(&config_path))
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_tracing(&config.logging);
    info!("Starting withdrawal review service");

    let store = connect_store(&config).await?;
    let evaluator = Arc::new(HeuristicRiskEvaluator::from_config(
        &config.risk,
        &config.workflow,
    ));
    let gate = AccessGate::new(RoleRequirements::from_config(&config.access)?);
    let workflow = WithdrawalWorkflow::new(
        store,
        evaluator,
        gate,
        config.workflow.clone(),
        &config.risk,
    );

    let app = create_router(AppState {
        workflow: Arc::new(workflow),
    });

    let listener = tokio::net::TcpListener::bind(config.server.host.as_str()).await?;
    info!("Listening on {}", config.server.host);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down withdrawal review service");
            }
        })
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WithdrawalStore>> {
    match config.database.get_db_url() {
        Some(database_url) => {
            let client = DBClient::new(&config.database, &database_url).await?;
            info!("Running database migrations");
            client.run_migrations().await?;
            Ok(Arc::new(PgWithdrawalStore::new(
                client.pool.as_ref().clone(),
            )))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data will not survive a restart");
            Ok(Arc::new(MemoryWithdrawalStore::new()))
        }
    }
}
