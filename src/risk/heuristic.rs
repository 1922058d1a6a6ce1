use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::{RiskAssessment, RiskEvaluator, RiskInput};
use crate::config::{RiskConfig, WorkflowConfig};
use crate::error::WorkflowError;
use crate::workflow::models::Chain;

const NEW_ADDRESS_WEIGHT: f64 = 0.30;
const LARGE_AMOUNT_WEIGHT: f64 = 0.25;
const HIGH_FREQUENCY_WEIGHT: f64 = 0.20;
const ROUND_NUMBER_WEIGHT: f64 = 0.10;
const DAILY_LIMIT_WEIGHT: f64 = 0.15;

/// Additive flag-based scoring, capped at 1.0.
#[derive(Debug, Clone)]
pub struct HeuristicRiskEvaluator {
    config: RiskConfig,
    deferred_chains: Vec<Chain>,
}

impl HeuristicRiskEvaluator {
    pub fn new(config: RiskConfig, deferred_chains: Vec<Chain>) -> Self {
        Self {
            config,
            deferred_chains,
        }
    }

    pub fn from_config(risk: &RiskConfig, workflow: &WorkflowConfig) -> Self {
        Self::new(risk.clone(), workflow.deferred_chains.clone())
    }

    pub fn assess(&self, input: &RiskInput) -> RiskAssessment {
        let mut score = 0.0;
        let mut flags = Vec::new();

        let is_new_address = input.history.completed_to_address == 0;
        if is_new_address {
            score += NEW_ADDRESS_WEIGHT;
            flags.push("NEW_WALLET_ADDRESS".to_string());
        }

        if input.amount >= self.config.large_amount_threshold {
            score += LARGE_AMOUNT_WEIGHT;
            flags.push("LARGE_AMOUNT".to_string());
        }

        if input.history.recent_requests >= u64::from(self.config.high_frequency_count) {
            score += HIGH_FREQUENCY_WEIGHT;
            flags.push("HIGH_FREQUENCY_WITHDRAWALS".to_string());
        }

        let thousand = Decimal::from(1_000);
        if input.amount >= Decimal::from(5_000) && (input.amount % thousand).is_zero() {
            score += ROUND_NUMBER_WEIGHT;
            flags.push("ROUND_NUMBER_AMOUNT".to_string());
        }

        if input.history.recent_volume + input.amount > self.config.daily_limit {
            score += DAILY_LIMIT_WEIGHT;
            flags.push("DAILY_LIMIT_EXCEEDED".to_string());
        }

        let risk_score = f64::min(score, 1.0);
        debug!(
            "Risk assessment for user {}: score={:.2}, flags={}",
            input.user_id,
            risk_score,
            flags.join(",")
        );

        RiskAssessment {
            risk_score,
            is_new_address,
            flags,
            defer: self.deferred_chains.contains(&input.chain),
        }
    }
}

#[async_trait]
impl RiskEvaluator for HeuristicRiskEvaluator {
    async fn evaluate(&self, input: &RiskInput) -> Result<RiskAssessment, WorkflowError> {
        Ok(self.assess(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::models::RequesterHistory;

    fn input(amount: i64, history: RequesterHistory) -> RiskInput {
        RiskInput {
            user_id: "user-1".into(),
            wallet_address: "0x52908400098527886E0F7030069857D2E4169EE7".into(),
            amount: Decimal::from(amount),
            chain: Chain::Eth,
            history,
        }
    }

    fn seen_address() -> RequesterHistory {
        RequesterHistory {
            completed_to_address: 2,
            ..Default::default()
        }
    }

    #[test]
    fn known_address_small_amount_scores_zero() {
        let evaluator = HeuristicRiskEvaluator::new(RiskConfig::default(), vec![]);
        let assessment = evaluator.assess(&input(50, seen_address()));
        assert_eq!(assessment.risk_score, 0.0);
        assert!(!assessment.is_new_address);
        assert!(assessment.flags.is_empty());
        assert!(!assessment.defer);
    }

    #[test]
    fn flags_accumulate_and_cap() {
        let evaluator = HeuristicRiskEvaluator::new(RiskConfig::default(), vec![]);
        let history = RequesterHistory {
            completed_to_address: 0,
            recent_requests: 5,
            recent_volume: Decimal::from(45_000),
        };
        let assessment = evaluator.assess(&input(20_000, history));
        assert_eq!(
            assessment.flags,
            vec![
                "NEW_WALLET_ADDRESS",
                "LARGE_AMOUNT",
                "HIGH_FREQUENCY_WITHDRAWALS",
                "ROUND_NUMBER_AMOUNT",
                "DAILY_LIMIT_EXCEEDED",
            ]
        );
        assert!((assessment.risk_score - 1.0).abs() < 1e-9);
        assert!(assessment.is_new_address);
    }

    #[test]
    fn deferred_chain_requests_queueing() {
        let evaluator = HeuristicRiskEvaluator::new(RiskConfig::default(), vec![Chain::Btc]);
        let mut btc = input(50, seen_address());
        btc.chain = Chain::Btc;
        assert!(evaluator.assess(&btc).defer);
        assert!(!evaluator.assess(&input(50, seen_address())).defer);
    }
}
