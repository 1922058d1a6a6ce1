use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::{Principal, Role};
use crate::error::WorkflowError;
use crate::workflow::models::Chain;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_NAME_HEADER: &str = "x-principal-name";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWithdrawalBody {
    pub wallet_address: String,
    pub amount: Decimal,
    pub chain: Chain,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBody {
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Resolve the caller from gateway headers. No `x-principal-id` means an
/// anonymous caller.
pub fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let id = header(PRINCIPAL_ID_HEADER)?;
    let username = header(PRINCIPAL_NAME_HEADER).unwrap_or(id);

    Some(Principal {
        id: id.to_string(),
        username: username.to_string(),
        role: header(PRINCIPAL_ROLE_HEADER)
            .map(|role| role.parse::<Role>().unwrap_or(Role::Unknown)),
        // First hop in the chain is the original client.
        ip_address: header(FORWARDED_FOR_HEADER)
            .and_then(|chain| chain.split(',').next())
            .map(|ip| ip.trim().to_string()),
    })
}

#[derive(Debug)]
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            WorkflowError::Unauthenticated => StatusCode::UNAUTHORIZED,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
