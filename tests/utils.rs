#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use mockall::mock;
use rust_decimal::Decimal;
use std::sync::Arc;

use withdrawal_review::api::{create_router, AppState};
use withdrawal_review::auth::{
    AccessGate, ConsoleRole, PlatformRole, Principal, Role, RoleRequirements,
};
use withdrawal_review::config::{RiskConfig, WorkflowConfig};
use withdrawal_review::db::MemoryWithdrawalStore;
use withdrawal_review::error::WorkflowError;
use withdrawal_review::risk::{HeuristicRiskEvaluator, RiskAssessment, RiskEvaluator, RiskInput};
use withdrawal_review::workflow::models::Chain;
use withdrawal_review::workflow::{SubmitWithdrawal, WithdrawalWorkflow};

pub const EVM_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
pub const BTC_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

mock! {
    pub Evaluator {}

    #[async_trait]
    impl RiskEvaluator for Evaluator {
        async fn evaluate(&self, input: &RiskInput) -> Result<RiskAssessment, WorkflowError>;
    }
}

pub fn assessment(risk_score: f64, is_new_address: bool, defer: bool) -> RiskAssessment {
    RiskAssessment {
        risk_score,
        is_new_address,
        flags: Vec::new(),
        defer,
    }
}

/// Evaluator that returns `result` for every submission.
pub fn evaluator_returning(result: RiskAssessment) -> MockEvaluator {
    let mut evaluator = MockEvaluator::new();
    evaluator
        .expect_evaluate()
        .returning(move |_| Ok(result.clone()));
    evaluator
}

pub fn user(id: &str) -> Principal {
    Principal::new(id, format!("{id}-name"), Role::Platform(PlatformRole::User))
}

pub fn support() -> Principal {
    Principal::new("support-1", "sam", Role::Platform(PlatformRole::Support)).with_ip("10.1.1.1")
}

pub fn moderator() -> Principal {
    Principal::new("mod-1", "maya", Role::Console(ConsoleRole::Moderator))
}

pub fn super_admin() -> Principal {
    Principal::new("root-1", "rita", Role::Platform(PlatformRole::SuperAdmin))
}

pub fn submission(user_id: &str, amount: i64) -> SubmitWithdrawal {
    SubmitWithdrawal {
        user_id: user_id.to_string(),
        username: format!("{user_id}-name"),
        wallet_address: EVM_ADDRESS.to_string(),
        amount: Decimal::from(amount),
        chain: Chain::Eth,
    }
}

pub fn create_workflow(
    store: Arc<MemoryWithdrawalStore>,
    evaluator: Arc<dyn RiskEvaluator>,
    config: WorkflowConfig,
) -> WithdrawalWorkflow {
    WithdrawalWorkflow::new(
        store,
        evaluator,
        AccessGate::new(RoleRequirements::standard()),
        config,
        &RiskConfig::default(),
    )
}

/// Workflow over a fresh memory store with the heuristic policy.
pub fn create_test_workflow() -> (Arc<WithdrawalWorkflow>, Arc<MemoryWithdrawalStore>) {
    let store = Arc::new(MemoryWithdrawalStore::new());
    let config = WorkflowConfig::default();
    let evaluator = Arc::new(HeuristicRiskEvaluator::from_config(
        &RiskConfig::default(),
        &config,
    ));
    let workflow = create_workflow(store.clone(), evaluator, config);
    (Arc::new(workflow), store)
}

pub fn create_test_app() -> (Router, Arc<MemoryWithdrawalStore>) {
    let (workflow, store) = create_test_workflow();
    (create_router(AppState { workflow }), store)
}
