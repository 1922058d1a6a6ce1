use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Eth,
    Bsc,
    Polygon,
    Sol,
    Btc,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Bsc => "BSC",
            Chain::Polygon => "POLYGON",
            Chain::Sol => "SOL",
            Chain::Btc => "BTC",
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, Chain::Eth | Chain::Bsc | Chain::Polygon)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(Chain::Eth),
            "BSC" => Ok(Chain::Bsc),
            "POLYGON" => Ok(Chain::Polygon),
            "SOL" => Ok(Chain::Sol),
            "BTC" => Ok(Chain::Btc),
            other => Err(WorkflowError::validation(format!(
                "unsupported chain: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Queued,
    Completed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Rejected => "REJECTED",
            WithdrawalStatus::Queued => "QUEUED",
            WithdrawalStatus::Completed => "COMPLETED",
        }
    }

    /// The only legal edges of the review state machine.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Queued)
                | (Queued, Approved)
                | (Queued, Rejected)
                | (Approved, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Rejected | WithdrawalStatus::Completed)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(WithdrawalStatus::Pending),
            "APPROVED" => Ok(WithdrawalStatus::Approved),
            "REJECTED" => Ok(WithdrawalStatus::Rejected),
            "QUEUED" => Ok(WithdrawalStatus::Queued),
            "COMPLETED" => Ok(WithdrawalStatus::Completed),
            other => Err(WorkflowError::validation(format!(
                "unknown withdrawal status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: Chain,
    pub status: WithdrawalStatus,
    pub risk_score: f64,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub is_new_address: bool,
    pub auto_approved: bool,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated submission together with its risk result, ready to persist
/// in PENDING.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawal {
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: Chain,
    pub risk_score: f64,
    pub is_new_address: bool,
}

impl NewWithdrawal {
    pub fn into_request(self, id: Uuid, now: DateTime<Utc>) -> WithdrawalRequest {
        WithdrawalRequest {
            id,
            user_id: self.user_id,
            username: self.username,
            wallet_address: self.wallet_address,
            amount: self.amount,
            chain: self.chain,
            status: WithdrawalStatus::Pending,
            risk_score: self.risk_score,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            is_new_address: self.is_new_address,
            auto_approved: false,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A requested status change. Applied under the per-request lock, against
/// whatever state the store holds at that moment.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    AutoApprove,
    Queue,
    Approve { reviewer_id: String },
    Reject { reviewer_id: String, reason: String },
    Complete { tx_hash: String },
}

impl StatusChange {
    pub fn target(&self) -> WithdrawalStatus {
        match self {
            StatusChange::AutoApprove | StatusChange::Approve { .. } => WithdrawalStatus::Approved,
            StatusChange::Queue => WithdrawalStatus::Queued,
            StatusChange::Reject { .. } => WithdrawalStatus::Rejected,
            StatusChange::Complete { .. } => WithdrawalStatus::Completed,
        }
    }

    /// Compute the next version of `current`, or refuse the edge.
    pub fn apply(
        &self,
        current: &WithdrawalRequest,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, WorkflowError> {
        let target = self.target();
        // Auto-approval is only ever decided straight out of PENDING.
        let legal = match self {
            StatusChange::AutoApprove => current.status == WithdrawalStatus::Pending,
            _ => current.status.can_transition_to(target),
        };
        if !legal {
            return Err(WorkflowError::InvalidStateTransition {
                from: current.status,
                to: target,
            });
        }

        let mut next = current.clone();
        next.status = target;
        next.updated_at = now;

        match self {
            StatusChange::AutoApprove => {
                next.auto_approved = true;
            }
            StatusChange::Queue => {}
            StatusChange::Approve { reviewer_id } => {
                next.reviewed_by = Some(reviewer_id.clone());
                next.reviewed_at = Some(now);
            }
            StatusChange::Reject {
                reviewer_id,
                reason,
            } => {
                next.reviewed_by = Some(reviewer_id.clone());
                next.reviewed_at = Some(now);
                next.rejection_reason = Some(reason.clone());
            }
            StatusChange::Complete { tx_hash } => {
                next.tx_hash = Some(tx_hash.clone());
            }
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
    pub user_id: Option<String>,
    pub chain: Option<Chain>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl WithdrawalFilter {
    pub fn matches(&self, request: &WithdrawalRequest) -> bool {
        self.status.map_or(true, |s| s == request.status)
            && self
                .user_id
                .as_deref()
                .map_or(true, |u| u == request.user_id)
            && self.chain.map_or(true, |c| c == request.chain)
    }
}

/// Resolved 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Prior activity of a requester, used as risk input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequesterHistory {
    /// COMPLETED withdrawals by this user to the same address.
    pub completed_to_address: u64,
    /// Requests created within the look-back window.
    pub recent_requests: u64,
    /// Sum of non-rejected amounts within the look-back window.
    pub recent_volume: Decimal,
}
