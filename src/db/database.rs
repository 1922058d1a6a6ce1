use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{AuditFn, WithdrawalStore};
use crate::audit::{AuditLog, AuditLogEntry, NewAuditEntry};
use crate::error::WorkflowError;
use crate::workflow::models::{
    NewWithdrawal, Page, PageWindow, RequesterHistory, StatusChange, WithdrawalFilter,
    WithdrawalRequest,
};

const WITHDRAWAL_COLUMNS: &str = r#"
    id, user_id, username, wallet_address, amount, chain, status, risk_score,
    rejection_reason, reviewed_by, reviewed_at, is_new_address, auto_approved,
    tx_hash, created_at, updated_at
"#;

const AUDIT_COLUMNS: &str = r#"
    id, withdrawal_request_id, admin_id, admin_username, action, reason,
    metadata, ip_address, previous_hash, entry_hash, created_at
"#;

#[derive(Debug, FromRow)]
pub struct WithdrawalRow {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: String,
    pub status: String, // "PENDING", "APPROVED", etc.
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

impl TryFrom<WithdrawalRow> for WithdrawalRequest {
    type Error = WorkflowError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |e: WorkflowError| {
            WorkflowError::StorageUnavailable(format!("corrupt withdrawal row {id}: {e}"))
        };
        let chain = row.chain.parse().map_err(corrupt)?;
        let status = row.status.parse().map_err(corrupt)?;

        Ok(WithdrawalRequest {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            wallet_address: row.wallet_address,
            amount: row.amount,
            chain,
            status,
            risk_score: row.risk_score,
            rejection_reason: row.rejection_reason,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            is_new_address: row.is_new_address,
            auto_approved: row.auto_approved,
            tx_hash: row.tx_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct AuditRow {
    pub id: Uuid,
    pub withdrawal_request_id: Uuid,
    pub admin_id: Option<String>,
    pub admin_username: Option<String>,
    pub action: String,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub previous_hash: String,
    pub entry_hash: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = WorkflowError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: row.id,
            withdrawal_request_id: row.withdrawal_request_id,
            admin_id: row.admin_id,
            admin_username: row.admin_username,
            action: row.action.parse()?,
            reason: row.reason,
            metadata: row.metadata,
            ip_address: row.ip_address,
            previous_hash: row.previous_hash,
            entry_hash: row.entry_hash,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_withdrawal(
    conn: &mut PgConnection,
    request: &WithdrawalRequest,
) -> Result<WithdrawalRow, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO withdrawal_requests (
            id, user_id, username, wallet_address, amount, chain, status, risk_score,
            is_new_address, auto_approved, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
        RETURNING {WITHDRAWAL_COLUMNS}
        "#
    );

    sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(request.id)
        .bind(&request.user_id)
        .bind(&request.username)
        .bind(&request.wallet_address)
        .bind(request.amount)
        .bind(request.chain.as_str())
        .bind(request.status.as_str())
        .bind(request.risk_score)
        .bind(request.is_new_address)
        .bind(request.auto_approved)
        .bind(request.created_at)
        .fetch_one(conn)
        .await
}

/// Read a request and hold its row lock until the enclosing transaction ends.
pub async fn lock_withdrawal(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<WithdrawalRow>, sqlx::Error> {
    let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn update_withdrawal(
    conn: &mut PgConnection,
    request: &WithdrawalRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET status = $1, rejection_reason = $2, reviewed_by = $3, reviewed_at = $4,
            auto_approved = $5, tx_hash = $6, updated_at = $7
        WHERE id = $8
        "#,
    )
    .bind(request.status.as_str())
    .bind(&request.rejection_reason)
    .bind(&request.reviewed_by)
    .bind(request.reviewed_at)
    .bind(request.auto_approved)
    .bind(&request.tx_hash)
    .bind(request.updated_at)
    .bind(request.id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Append one audit entry, chained to the latest entry of the same request.
///
/// Callers must already hold the request's row lock so the chain cannot fork.
pub async fn record_audit_entry(
    conn: &mut PgConnection,
    entry: NewAuditEntry,
) -> Result<AuditLogEntry, WorkflowError> {
    let previous_hash: Option<String> = sqlx::query_scalar(
        r#"
        SELECT entry_hash FROM withdrawal_audit_logs
        WHERE withdrawal_request_id = $1
        ORDER BY seq DESC
        LIMIT 1
        "#,
    )
    .bind(entry.withdrawal_request_id)
    .fetch_optional(&mut *conn)
    .await?;

    let sealed = entry.seal(
        Uuid::new_v4(),
        previous_hash.as_deref().unwrap_or(""),
        Utc::now(),
    );

    sqlx::query(
        r#"
        INSERT INTO withdrawal_audit_logs (
            id, withdrawal_request_id, admin_id, admin_username, action, reason,
            metadata, ip_address, previous_hash, entry_hash, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(sealed.id)
    .bind(sealed.withdrawal_request_id)
    .bind(&sealed.admin_id)
    .bind(&sealed.admin_username)
    .bind(sealed.action.as_str())
    .bind(&sealed.reason)
    .bind(&sealed.metadata)
    .bind(&sealed.ip_address)
    .bind(&sealed.previous_hash)
    .bind(&sealed.entry_hash)
    .bind(sealed.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(sealed)
}

pub async fn fetch_audit_entries(
    pool: &PgPool,
    withdrawal_request_id: Uuid,
) -> Result<Vec<AuditRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM withdrawal_audit_logs WHERE withdrawal_request_id = $1 ORDER BY seq ASC"
    );
    sqlx::query_as::<_, AuditRow>(&sql)
        .bind(withdrawal_request_id)
        .fetch_all(pool)
        .await
}

/// Postgres-backed store. Transitions run in one transaction under
/// `SELECT ... FOR UPDATE`.
#[derive(Debug, Clone)]
pub struct PgWithdrawalStore {
    pool: PgPool,
}

impl PgWithdrawalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgWithdrawalStore {
    async fn history(
        &self,
        withdrawal_request_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        fetch_audit_entries(&self.pool, withdrawal_request_id)
            .await?
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect()
    }
}

#[async_trait]
impl WithdrawalStore for PgWithdrawalStore {
    async fn insert(&self, new: NewWithdrawal) -> Result<WithdrawalRequest, WorkflowError> {
        let request = new.into_request(Uuid::new_v4(), Utc::now().trunc_subsecs(6));
        let mut conn = self.pool.acquire().await?;
        insert_withdrawal(&mut *conn, &request).await?.try_into()
    }

    async fn transition(
        &self,
        id: Uuid,
        change: &StatusChange,
        audit: AuditFn<'_>,
    ) -> Result<(WithdrawalRequest, AuditLogEntry), WorkflowError> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        let current: WithdrawalRequest = lock_withdrawal(&mut *tx, id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?
            .try_into()?;

        let next = change.apply(&current, Utc::now().trunc_subsecs(6))?;
        update_withdrawal(&mut *tx, &next).await?;
        let logged = record_audit_entry(&mut *tx, audit(&current)).await?;

        tx.commit().await?;
        debug!("Committed {} -> {} for withdrawal {}", current.status, next.status, id);

        Ok((next, logged))
    }

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, WorkflowError> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1");
        sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(WithdrawalRequest::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &WithdrawalFilter,
        window: PageWindow,
    ) -> Result<Page<WithdrawalRequest>, WorkflowError> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR user_id = $2)
              AND ($3::text IS NULL OR chain = $3)
        "#;

        let status = filter.status.map(|s| s.as_str());
        let chain = filter.chain.map(|c| c.as_str());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM withdrawal_requests {WHERE}"
        ))
        .bind(status)
        .bind(filter.user_id.as_deref())
        .bind(chain)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests {WHERE} ORDER BY created_at ASC, id ASC LIMIT $4 OFFSET $5"
        );
        let data = sqlx::query_as::<_, WithdrawalRow>(&sql)
            .bind(status)
            .bind(filter.user_id.as_deref())
            .bind(chain)
            .bind(i64::from(window.limit))
            .bind(window.offset() as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WithdrawalRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            data,
            total: total as u64,
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
        let (completed_to_address, recent_requests, recent_volume): (i64, i64, Decimal) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE wallet_address = $2 AND status = 'COMPLETED'),
                    COUNT(*) FILTER (WHERE created_at >= $3),
                    COALESCE(SUM(amount) FILTER (WHERE created_at >= $3 AND status <> 'REJECTED'), 0)
                FROM withdrawal_requests
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .bind(wallet_address)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(RequesterHistory {
            completed_to_address: completed_to_address as u64,
            recent_requests: recent_requests as u64,
            recent_volume,
        })
    }
}
