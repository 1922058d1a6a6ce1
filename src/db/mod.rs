pub mod client;
pub mod database;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::{AuditLog, AuditLogEntry, NewAuditEntry};
use crate::error::WorkflowError;
use crate::workflow::models::{
    NewWithdrawal, Page, PageWindow, RequesterHistory, StatusChange, WithdrawalFilter,
    WithdrawalRequest,
};

pub use database::PgWithdrawalStore;
pub use memory::MemoryWithdrawalStore;

/// Builds the audit entry for a transition from the locked, pre-change row.
pub type AuditFn<'a> = &'a (dyn Fn(&WithdrawalRequest) -> NewAuditEntry + Send + Sync);

/// Persistence for withdrawal requests and their audit trail.
///
/// `transition` is the only way to change a stored request. Implementations
/// must hold an exclusive per-request lock (or row lock) from the moment they
/// read the current status until the new status and its audit entry are both
/// committed, and must commit neither if either write fails.
#[async_trait]
pub trait WithdrawalStore: AuditLog {
    /// Persist a new request in PENDING.
    async fn insert(&self, new: NewWithdrawal) -> Result<WithdrawalRequest, WorkflowError>;

    async fn transition(
        &self,
        id: Uuid,
        change: &StatusChange,
        audit: AuditFn<'_>,
    ) -> Result<(WithdrawalRequest, AuditLogEntry), WorkflowError>;

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, WorkflowError>;

    /// Matching requests, oldest first.
    async fn list(
        &self,
        filter: &WithdrawalFilter,
        window: PageWindow,
    ) -> Result<Page<WithdrawalRequest>, WorkflowError>;

    async fn requester_history(
        &self,
        user_id: &str,
        wallet_address: &str,
        since: DateTime<Utc>,
    ) -> Result<RequesterHistory, WorkflowError>;
}
