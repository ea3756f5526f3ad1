use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::LedgerError;
use crate::ledger::Transfer;

use super::state::AppState;
use super::types::{ApiResponse, HealthResponse, StateQuery, TransferAck, error_codes};

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn reject(e: &LedgerError) -> ApiError {
    let code = match e {
        LedgerError::UnknownBank(_) => error_codes::UNKNOWN_BANK,
        LedgerError::NegativeAmount(_) => error_codes::INVALID_PARAMETER,
        _ => error_codes::INTERNAL_ERROR,
    };
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse::<()>::error(code, e.to_string())))
}

/// POST /api/v1/transfer
///
/// An unknown bank means bootstrap data and upstream disagree. It is logged
/// as an error but surfaced to the caller as a rejected transfer.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Transfer>,
) -> Result<Json<ApiResponse<TransferAck>>, ApiError> {
    match state.ledger.apply(&req) {
        Ok(()) => Ok(Json(ApiResponse::success(TransferAck {
            transactions: state.ledger.transactions(),
        }))),
        Err(e) => {
            if e.is_fatal() {
                error!(target: "LEDGER", code = e.code(), "Transfer rejected: {}", e);
            } else {
                warn!(target: "LEDGER", code = e.code(), "Transfer rejected: {}", e);
            }
            Err(reject(&e))
        }
    }
}

/// GET /api/v1/state?accounts=true
///
/// Plain-text dump of bank (and optionally account) balances.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> Result<String, ApiError> {
    let mut out = Vec::new();
    state
        .ledger
        .print_state(query.accounts, &mut out)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(
                    error_codes::INTERNAL_ERROR,
                    e.to_string(),
                )),
            )
        })?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// GET /api/v1/health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        banks: state.ledger.bank_count(),
        transactions: state.ledger.transactions(),
    }))
}
