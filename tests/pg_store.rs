//! Postgres adapter tests. Run with a scratch database:
//! `DATABASE_URL=postgres://... cargo test --test pg_store -- --ignored`

mod utils;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use utils::{support, EVM_ADDRESS};
use withdrawal_review::audit::{verify_chain, AuditAction, AuditLog, NewAuditEntry};
use withdrawal_review::config::DatabaseConfig;
use withdrawal_review::db::client::DBClient;
use withdrawal_review::db::{PgWithdrawalStore, WithdrawalStore};
use withdrawal_review::error::WorkflowError;
use withdrawal_review::workflow::models::{
    Chain, NewWithdrawal, PageWindow, StatusChange, WithdrawalFilter, WithdrawalStatus,
};

async fn create_test_store() -> PgWithdrawalStore {
    dotenv::dotenv().ok();
    let database_url = DatabaseConfig::default()
        .get_db_url()
        .expect("DATABASE_URL must be set for Postgres tests");
    let client = DBClient::new(&DatabaseConfig { max_connections: 5 }, &database_url)
        .await
        .expect("Failed to connect to test database");
    client
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    PgWithdrawalStore::new(client.pool.as_ref().clone())
}

fn new_withdrawal(user_id: &str) -> NewWithdrawal {
    NewWithdrawal {
        user_id: user_id.to_string(),
        username: "pg-tester".to_string(),
        wallet_address: EVM_ADDRESS.to_string(),
        amount: Decimal::new(12_345, 2),
        chain: Chain::Polygon,
        risk_score: 0.3,
        is_new_address: true,
    }
}

#[tokio::test]
#[ignore]
async fn test_transition_commits_status_and_audit_together() {
    let store = create_test_store().await;
    let user_id = format!("pg-{}", uuid::Uuid::new_v4());
    let request = store.insert(new_withdrawal(&user_id)).await.unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);

    let reviewer = support();
    let change = StatusChange::Approve {
        reviewer_id: reviewer.id.clone(),
    };
    let (approved, entry) = store
        .transition(request.id, &change, &|current| {
            NewAuditEntry::by(&reviewer, current.id, AuditAction::Approved)
                .meta("amount", current.amount.to_string())
        })
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(entry.previous_hash, "");

    let complete = StatusChange::Complete {
        tx_hash: "0xbeef".to_string(),
    };
    store
        .transition(request.id, &complete, &|current| {
            NewAuditEntry::system(current.id, AuditAction::Completed).meta("txHash", "0xbeef")
        })
        .await
        .unwrap();

    let stored = store.get(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, WithdrawalStatus::Completed);
    assert_eq!(stored.amount, Decimal::new(12_345, 2));

    let history = store.history(request.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], entry);
    assert!(verify_chain(&history));

    let since = Utc::now() - Duration::hours(24);
    let requester = store
        .requester_history(&user_id, EVM_ADDRESS, since)
        .await
        .unwrap();
    assert_eq!(requester.completed_to_address, 1);
    assert_eq!(requester.recent_requests, 1);
}

#[tokio::test]
#[ignore]
async fn test_illegal_transition_rolls_back() {
    let store = create_test_store().await;
    let user_id = format!("pg-{}", uuid::Uuid::new_v4());
    let request = store.insert(new_withdrawal(&user_id)).await.unwrap();

    let err = store
        .transition(
            request.id,
            &StatusChange::Complete {
                tx_hash: "0x1".to_string(),
            },
            &|current| NewAuditEntry::system(current.id, AuditAction::Completed),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidStateTransition {
            from: WithdrawalStatus::Pending,
            to: WithdrawalStatus::Completed,
        }
    ));
    assert!(store.history(request.id).await.unwrap().is_empty());

    let page = store
        .list(
            &WithdrawalFilter {
                user_id: Some(user_id),
                ..Default::default()
            },
            PageWindow { page: 1, limit: 10 },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].status, WithdrawalStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn test_row_lock_serialises_competing_reviews() {
    let store = Arc::new(create_test_store().await);
    let user_id = format!("pg-{}", uuid::Uuid::new_v4());
    let request = store.insert(new_withdrawal(&user_id)).await.unwrap();
    let id = request.id;

    let mut handles = Vec::new();
    for n in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let reviewer_id = format!("reviewer-{n}");
            store
                .transition(
                    id,
                    &StatusChange::Approve {
                        reviewer_id: reviewer_id.clone(),
                    },
                    &|current| NewAuditEntry::system(current.id, AuditAction::Approved),
                )
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(matches!(err, WorkflowError::InvalidStateTransition { .. })),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.history(id).await.unwrap().len(), 1);
}
