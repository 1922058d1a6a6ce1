//! Append-only audit trail for withdrawal review.
//!
//! Entries are sealed into a per-request hash chain when they are written:
//! `entry_hash = sha256(previous_hash | request | actor | action | reason |
//! metadata | ip | created_at)`, where the first entry of a request chains
//! from the empty string. Stores never expose update or delete.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Approved,
    Rejected,
    AutoApproved,
    Queued,
    Completed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Approved => "APPROVED",
            AuditAction::Rejected => "REJECTED",
            AuditAction::AutoApproved => "AUTO_APPROVED",
            AuditAction::Queued => "QUEUED",
            AuditAction::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(AuditAction::Approved),
            "REJECTED" => Ok(AuditAction::Rejected),
            "AUTO_APPROVED" => Ok(AuditAction::AutoApproved),
            "QUEUED" => Ok(AuditAction::Queued),
            "COMPLETED" => Ok(AuditAction::Completed),
            other => Err(WorkflowError::StorageUnavailable(format!(
                "corrupt audit action in storage: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub withdrawal_request_id: Uuid,
    pub admin_id: Option<String>,
    pub admin_username: Option<String>,
    pub action: AuditAction,
    pub reason: Option<String>,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub previous_hash: String,
    pub entry_hash: String,
    pub created_at: DateTime<Utc>,
}

/// An audit entry that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub withdrawal_request_id: Uuid,
    pub admin_id: Option<String>,
    pub admin_username: Option<String>,
    pub action: AuditAction,
    pub reason: Option<String>,
    pub metadata: Map<String, Value>,
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    /// Entry for a system-initiated action; no actor is recorded.
    pub fn system(withdrawal_request_id: Uuid, action: AuditAction) -> Self {
        Self {
            withdrawal_request_id,
            admin_id: None,
            admin_username: None,
            action,
            reason: None,
            metadata: Map::new(),
            ip_address: None,
        }
    }

    pub fn by(principal: &Principal, withdrawal_request_id: Uuid, action: AuditAction) -> Self {
        Self {
            admin_id: Some(principal.id.clone()),
            admin_username: Some(principal.username.clone()),
            ip_address: principal.ip_address.clone(),
            ..Self::system(withdrawal_request_id, action)
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Fix the entry's identity and timestamp and chain it to `previous_hash`.
    ///
    /// Timestamps are truncated to microseconds so the hash survives a round
    /// trip through Postgres.
    pub fn seal(self, id: Uuid, previous_hash: &str, now: DateTime<Utc>) -> AuditLogEntry {
        let mut entry = AuditLogEntry {
            id,
            withdrawal_request_id: self.withdrawal_request_id,
            admin_id: self.admin_id,
            admin_username: self.admin_username,
            action: self.action,
            reason: self.reason,
            metadata: Value::Object(self.metadata),
            ip_address: self.ip_address,
            previous_hash: previous_hash.to_string(),
            entry_hash: String::new(),
            created_at: now.trunc_subsecs(6),
        };
        entry.entry_hash = entry_hash(&entry);
        entry
    }
}

pub fn entry_hash(entry: &AuditLogEntry) -> String {
    let request_id = entry.withdrawal_request_id.to_string();
    let metadata = entry.metadata.to_string();
    let created_at = entry.created_at.to_rfc3339();

    let fields: [&str; 9] = [
        &entry.previous_hash,
        &request_id,
        entry.admin_id.as_deref().unwrap_or(""),
        entry.admin_username.as_deref().unwrap_or(""),
        entry.action.as_str(),
        entry.reason.as_deref().unwrap_or(""),
        &metadata,
        entry.ip_address.as_deref().unwrap_or(""),
        &created_at,
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

/// Check that `entries` (oldest first) form an unbroken chain for a single
/// request.
pub fn verify_chain(entries: &[AuditLogEntry]) -> bool {
    let mut previous = String::new();
    for entry in entries {
        if entry.previous_hash != previous || entry.entry_hash != entry_hash(entry) {
            return false;
        }
        previous = entry.entry_hash.clone();
    }
    true
}

/// Read side of the audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Every entry for a request, oldest first.
    async fn history(&self, withdrawal_request_id: Uuid)
        -> Result<Vec<AuditLogEntry>, WorkflowError>;
}
