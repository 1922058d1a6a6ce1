//! Withdrawal review state machine.
//!
//! ```text
//! PENDING --> APPROVED --> COMPLETED
//!    |  \        ^
//!    |   `-> QUEUED
//!    v           |
//! REJECTED <-----'
//! ```
//!
//! Risk is evaluated and stored with the request before any transition is
//! attempted, so a crash part-way through `submit` leaves the request in
//! PENDING. Every transition commits together with exactly one audit entry.

pub mod models;
pub mod validation;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLogEntry, NewAuditEntry};
use crate::auth::{AccessGate, Operation, Principal};
use crate::config::{RiskConfig, WorkflowConfig};
use crate::db::WithdrawalStore;
use crate::error::WorkflowError;
use crate::risk::{RiskAssessment, RiskEvaluator, RiskInput};
use models::{
    Chain, NewWithdrawal, Page, PageWindow, StatusChange, WithdrawalFilter, WithdrawalRequest,
};

/// A user's request to move funds off-platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitWithdrawal {
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: Chain,
}

pub struct WithdrawalWorkflow {
    store: Arc<dyn WithdrawalStore>,
    evaluator: Arc<dyn RiskEvaluator>,
    gate: AccessGate,
    config: WorkflowConfig,
    history_window: Duration,
}

impl WithdrawalWorkflow {
    pub fn new(
        store: Arc<dyn WithdrawalStore>,
        evaluator: Arc<dyn RiskEvaluator>,
        gate: AccessGate,
        config: WorkflowConfig,
        risk: &RiskConfig,
    ) -> Self {
        Self {
            store,
            evaluator,
            gate,
            config,
            history_window: Duration::hours(risk.window_hours),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Scores and persists a new request, then applies the automatic
    /// transition it qualifies for.
    ///
    /// The request is stored in PENDING before auto-approval or queueing is
    /// attempted. If that follow-up transition fails the error is returned but
    /// the PENDING request stays persisted and reviewable.
    pub async fn submit(
        &self,
        principal: Option<&Principal>,
        command: SubmitWithdrawal,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        self.gate.authorize(principal, Operation::Submit)?;

        validation::validate_amount(command.amount)?;
        validation::validate_address(command.chain, &command.wallet_address)?;

        let since = Utc::now() - self.history_window;
        let history = self
            .store
            .requester_history(&command.user_id, &command.wallet_address, since)
            .await?;

        let assessment = self
            .evaluator
            .evaluate(&RiskInput {
                user_id: command.user_id.clone(),
                wallet_address: command.wallet_address.clone(),
                amount: command.amount,
                chain: command.chain,
                history,
            })
            .await?;

        let request = self
            .store
            .insert(NewWithdrawal {
                user_id: command.user_id,
                username: command.username,
                wallet_address: command.wallet_address,
                amount: command.amount,
                chain: command.chain,
                risk_score: assessment.risk_score,
                is_new_address: assessment.is_new_address,
            })
            .await?;

        if self.is_auto_approvable(&request, &assessment) {
            let threshold = self.config.auto_approve_risk_threshold;
            let (approved, _) = self
                .store
                .transition(request.id, &StatusChange::AutoApprove, &|current| {
                    NewAuditEntry::system(current.id, AuditAction::AutoApproved)
                        .meta("amount", current.amount.to_string())
                        .meta("threshold", threshold)
                        .meta("riskScore", current.risk_score)
                })
                .await
                .map_err(|err| left_pending(request.id, "auto-approve", err))?;

            info!(
                "Auto-approved withdrawal: id={} amount={} riskScore={:.2}",
                approved.id, approved.amount, approved.risk_score
            );
            return Ok(approved);
        }

        if assessment.defer {
            let (queued, _) = self
                .store
                .transition(request.id, &StatusChange::Queue, &|current| {
                    NewAuditEntry::system(current.id, AuditAction::Queued)
                        .reason("awaiting confirmations")
                        .meta("chain", current.chain.as_str())
                        .meta("riskScore", current.risk_score)
                })
                .await
                .map_err(|err| left_pending(request.id, "queue", err))?;

            info!("Withdrawal queued: id={} chain={}", queued.id, queued.chain);
            return Ok(queued);
        }

        info!(
            "Withdrawal request created: id={} amount={} status=PENDING riskScore={:.2} flags={}",
            request.id,
            request.amount,
            request.risk_score,
            assessment.flags.join(",")
        );
        Ok(request)
    }

    fn is_auto_approvable(&self, request: &WithdrawalRequest, assessment: &RiskAssessment) -> bool {
        assessment.risk_score < self.config.auto_approve_risk_threshold
            && !assessment.is_new_address
            && request.amount < self.config.large_transaction_threshold
    }

    pub async fn approve(
        &self,
        principal: Option<&Principal>,
        request_id: Uuid,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        self.gate.authorize(principal, Operation::Approve)?;
        let reviewer = principal.ok_or(WorkflowError::Unauthenticated)?;

        let change = StatusChange::Approve {
            reviewer_id: reviewer.id.clone(),
        };
        let result = self
            .store
            .transition(request_id, &change, &|current| {
                NewAuditEntry::by(reviewer, current.id, AuditAction::Approved)
                    .meta("amount", current.amount.to_string())
                    .meta("chain", current.chain.as_str())
                    .meta("walletAddress", current.wallet_address.clone())
                    .meta("riskScore", current.risk_score)
            })
            .await;

        let (approved, _) = log_refusal(result, request_id, "approve", reviewer)?;
        info!(
            "Withdrawal APPROVED: id={} by admin={}",
            approved.id, reviewer.username
        );
        Ok(approved)
    }

    pub async fn reject(
        &self,
        principal: Option<&Principal>,
        request_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        self.gate.authorize(principal, Operation::Reject)?;
        let reviewer = principal.ok_or(WorkflowError::Unauthenticated)?;
        validation::validate_reason(reason)?;

        let reason = reason.trim().to_string();
        let change = StatusChange::Reject {
            reviewer_id: reviewer.id.clone(),
            reason: reason.clone(),
        };
        let result = self
            .store
            .transition(request_id, &change, &|current| {
                NewAuditEntry::by(reviewer, current.id, AuditAction::Rejected)
                    .reason(reason.clone())
                    .meta("amount", current.amount.to_string())
                    .meta("chain", current.chain.as_str())
                    .meta("walletAddress", current.wallet_address.clone())
                    .meta("riskScore", current.risk_score)
            })
            .await;

        let (rejected, _) = log_refusal(result, request_id, "reject", reviewer)?;
        info!(
            "Withdrawal REJECTED: id={} by admin={} reason=\"{}\"",
            rejected.id, reviewer.username, reason
        );
        Ok(rejected)
    }

    /// Settlement callback once funds have actually moved.
    pub async fn complete(
        &self,
        principal: Option<&Principal>,
        request_id: Uuid,
        tx_hash: &str,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        self.gate.authorize(principal, Operation::Complete)?;
        validation::validate_tx_hash(tx_hash)?;

        let tx_hash = tx_hash.trim().to_string();
        let change = StatusChange::Complete {
            tx_hash: tx_hash.clone(),
        };
        let (completed, _) = self
            .store
            .transition(request_id, &change, &|current| {
                NewAuditEntry::system(current.id, AuditAction::Completed)
                    .meta("txHash", tx_hash.clone())
                    .meta("amount", current.amount.to_string())
                    .meta("chain", current.chain.as_str())
            })
            .await?;

        info!("Withdrawal COMPLETED: id={} txHash={}", completed.id, tx_hash);
        Ok(completed)
    }

    pub async fn list(
        &self,
        principal: Option<&Principal>,
        filter: &WithdrawalFilter,
    ) -> Result<Page<WithdrawalRequest>, WorkflowError> {
        self.gate.authorize(principal, Operation::List)?;
        self.store.list(filter, self.page_window(filter)).await
    }

    pub async fn get(
        &self,
        principal: Option<&Principal>,
        request_id: Uuid,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        self.gate.authorize(principal, Operation::Get)?;
        self.store
            .get(request_id)
            .await?
            .ok_or(WorkflowError::NotFound(request_id))
    }

    /// Full audit trail of a request, oldest first.
    pub async fn audit_trail(
        &self,
        principal: Option<&Principal>,
        request_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        self.gate.authorize(principal, Operation::AuditTrail)?;
        if self.store.get(request_id).await?.is_none() {
            return Err(WorkflowError::NotFound(request_id));
        }
        self.store.history(request_id).await
    }

    fn page_window(&self, filter: &WithdrawalFilter) -> PageWindow {
        let max = self.config.max_page_size.max(1);
        PageWindow {
            page: filter.page.unwrap_or(1).max(1),
            limit: filter
                .limit
                .unwrap_or(self.config.default_page_size)
                .clamp(1, max),
        }
    }
}

fn left_pending(request_id: Uuid, action: &str, err: WorkflowError) -> WorkflowError {
    warn!(
        "Failed to {} withdrawal {}, request left in PENDING: {}",
        action, request_id, err
    );
    err
}

fn log_refusal<T>(
    result: Result<T, WorkflowError>,
    request_id: Uuid,
    action: &str,
    reviewer: &Principal,
) -> Result<T, WorkflowError> {
    if let Err(WorkflowError::InvalidStateTransition { from, to }) = &result {
        warn!(
            "Refused {} on withdrawal {} by {}: {} -> {}",
            action,
            request_id,
            reviewer.username,
            from,
            to
        );
    }
    result
}
