use config::{Config, Environment, File};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workflow::models::Chain;

/// Loads configuration from a given config file or environment variables.
pub fn load_config(config_file_path: Option<&Path>) -> anyhow::Result<AppConfig> {
    // Load .env file if it exists, ignore if not present
    dotenv().ok();

    let mut settings = Config::builder();

    if let Some(path) = config_file_path {
        settings = settings.add_source(File::from(path).required(true));
    }

    settings = settings.add_source(
        Environment::with_prefix("WITHDRAWAL_REVIEW")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("workflow.deferred_chains")
            .with_list_parse_key("access.submit")
            .with_list_parse_key("access.list")
            .with_list_parse_key("access.get")
            .with_list_parse_key("access.audit_trail")
            .with_list_parse_key("access.approve")
            .with_list_parse_key("access.reject")
            .with_list_parse_key("access.complete")
            .try_parsing(true),
    );

    let app_config = settings.build()?.try_deserialize::<AppConfig>()?;

    Ok(app_config)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 10 }
    }
}

impl DatabaseConfig {
    /// `DATABASE_URL`, if set and non-empty. Without it the service runs on
    /// the in-memory store.
    pub fn get_db_url(&self) -> Option<String> {
        std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Risk scores strictly below this may be auto-approved.
    pub auto_approve_risk_threshold: f64,
    /// Amounts at or above this always go to manual review.
    pub large_transaction_threshold: Decimal,
    /// Chains whose submissions wait in QUEUED for extra confirmations.
    pub deferred_chains: Vec<Chain>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_approve_risk_threshold: 0.5,
            large_transaction_threshold: Decimal::from(10_000),
            deferred_chains: Vec::new(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub large_amount_threshold: Decimal,
    pub daily_limit: Decimal,
    pub high_frequency_count: u32,
    pub window_hours: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            large_amount_threshold: Decimal::from(10_000),
            daily_limit: Decimal::from(50_000),
            high_frequency_count: 3,
            window_hours: 24,
        }
    }
}

/// Acceptable role names per operation, e.g. `["SUPPORT", "admin:MODERATOR"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub submit: Vec<String>,
    pub list: Vec<String>,
    pub get: Vec<String>,
    pub audit_trail: Vec<String>,
    pub approve: Vec<String>,
    pub reject: Vec<String>,
    pub complete: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        let reviewers = || vec!["SUPPORT".to_string(), "admin:MODERATOR".to_string()];
        Self {
            submit: vec!["USER".to_string()],
            list: reviewers(),
            get: reviewers(),
            audit_trail: reviewers(),
            approve: reviewers(),
            reject: reviewers(),
            complete: vec!["SUPER_ADMIN".to_string(), "admin:SUPER_ADMIN".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String, // "debug" | "info" | "warn" | "error"
    pub format: String, // "pretty" | "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
