use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::workflow::models::{Chain, RequesterHistory};

pub mod heuristic;

pub use heuristic::HeuristicRiskEvaluator;

/// Everything a risk policy may look at for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInput {
    pub user_id: String,
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: Chain,
    pub history: RequesterHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Conceptually in [0, 1]; higher is riskier.
    pub risk_score: f64,
    pub is_new_address: bool,
    pub flags: Vec<String>,
    /// Processing should wait in QUEUED (e.g. for extra confirmations).
    pub defer: bool,
}

/// Pluggable scoring policy.
///
/// Called before the request is persisted and never while a request lock is
/// held. Must be deterministic for a given input and must not make unbounded
/// external calls.
#[async_trait]
pub trait RiskEvaluator: Send + Sync {
    async fn evaluate(&self, input: &RiskInput) -> Result<RiskAssessment, WorkflowError>;
}
