use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{AuditFn, WithdrawalStore};
use crate::audit::{AuditLog, AuditLogEntry, NewAuditEntry};
use crate::error::WorkflowError;
use crate::workflow::models::{
    NewWithdrawal, Page, PageWindow, RequesterHistory, StatusChange, WithdrawalFilter,
    WithdrawalRequest, WithdrawalStatus,
};

/// Append-only, in-process audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<HashMap<Uuid, Vec<AuditLogEntry>>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditLog {
    /// Make every subsequent `record` fail as if storage were down.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, WorkflowError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WorkflowError::StorageUnavailable(
                "audit log rejected write".to_string(),
            ));
        }

        let mut entries = self.entries.lock().await;
        let chain = entries.entry(entry.withdrawal_request_id).or_default();
        let previous_hash = chain
            .last()
            .map(|last| last.entry_hash.clone())
            .unwrap_or_default();
        let sealed = entry.seal(Uuid::new_v4(), &previous_hash, Utc::now());
        chain.push(sealed.clone());
        Ok(sealed)
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn history(
        &self,
        withdrawal_request_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&withdrawal_request_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-process store. Each request sits behind its own mutex, which is held
/// across the whole read-decide-audit-write sequence of a transition.
#[derive(Debug, Default)]
pub struct MemoryWithdrawalStore {
    requests: RwLock<HashMap<Uuid, Arc<Mutex<WithdrawalRequest>>>>,
    audit: MemoryAuditLog,
}

impl MemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audit_log(&self) -> &MemoryAuditLog {
        &self.audit
    }

    async fn slot(&self, id: Uuid) -> Option<Arc<Mutex<WithdrawalRequest>>> {
        self.requests.read().await.get(&id).cloned()
    }

    async fn snapshot(&self) -> Vec<WithdrawalRequest> {
        let slots: Vec<_> = self.requests.read().await.values().cloned().collect();
        let mut requests = Vec::with_capacity(slots.len());
        for slot in slots {
            requests.push(slot.lock().await.clone());
        }
        requests
    }
}

#[async_trait]
impl AuditLog for MemoryWithdrawalStore {
    async fn history(
        &self,
        withdrawal_request_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        self.audit.history(withdrawal_request_id).await
    }
}

#[async_trait]
impl WithdrawalStore for MemoryWithdrawalStore {
    async fn insert(&self, new: NewWithdrawal) -> Result<WithdrawalRequest, WorkflowError> {
        let request = new.into_request(Uuid::new_v4(), Utc::now());
        self.requests
            .write()
            .await
            .insert(request.id, Arc::new(Mutex::new(request.clone())));
        Ok(request)
    }

    async fn transition(
        &self,
        id: Uuid,
        change: &StatusChange,
        audit: AuditFn<'_>,
    ) -> Result<(WithdrawalRequest, AuditLogEntry), WorkflowError> {
        let slot = self.slot(id).await.ok_or(WorkflowError::NotFound(id))?;
        let mut current = slot.lock().await;

        let next = change.apply(&*current, Utc::now())?;
        let logged = self.audit.record(audit(&*current)).await?;
        *current = next.clone();

        Ok((next, logged))
    }

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, WorkflowError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &WithdrawalFilter,
        window: PageWindow,
    ) -> Result<Page<WithdrawalRequest>, WorkflowError> {
        let mut matching: Vec<_> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|request| filter.matches(request))
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit as usize)
            .collect();

        Ok(Page {
            data,
            total,
            page: window.page,
            limit: window.limit,
        })
    }

    async fn requester_history(
        &self,
        user_id: &str,
        wallet_address: &str,
        since: DateTime<Utc>,
    ) -> Result<RequesterHistory, WorkflowError> {
        let mut history = RequesterHistory::default();

        for request in self.snapshot().await {
            if request.user_id != user_id {
                continue;
            }
            if request.wallet_address == wallet_address
                && request.status == WithdrawalStatus::Completed
            {
                history.completed_to_address += 1;
            }
            if request.created_at >= since {
                history.recent_requests += 1;
                if request.status != WithdrawalStatus::Rejected {
                    history.recent_volume += request.amount;
                }
            }
        }

        Ok(history)
    }
}
