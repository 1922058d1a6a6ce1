//! Thin HTTP adapter over [`WithdrawalWorkflow`](crate::workflow::WithdrawalWorkflow).
//!
//! Callers are authenticated upstream; the gateway forwards the resolved
//! identity in `x-principal-*` headers.

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::{create_router, AppState};
