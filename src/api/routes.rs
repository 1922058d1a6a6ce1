use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::workflow::WithdrawalWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WithdrawalWorkflow>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/withdrawals", post(handlers::handle_submit_withdrawal))
        .route("/admin/withdrawals", get(handlers::handle_list_withdrawals))
        .route("/admin/withdrawals/{id}", get(handlers::handle_get_withdrawal))
        .route(
            "/admin/withdrawals/{id}/audit-log",
            get(handlers::handle_get_audit_log),
        )
        .route(
            "/admin/withdrawals/{id}/approve",
            post(handlers::handle_approve_withdrawal),
        )
        .route(
            "/admin/withdrawals/{id}/reject",
            post(handlers::handle_reject_withdrawal),
        )
        .route(
            "/admin/withdrawals/{id}/complete",
            post(handlers::handle_complete_withdrawal),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
