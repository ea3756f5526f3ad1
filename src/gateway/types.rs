//! API request/response types and error codes

use serde::{Deserialize, Serialize};

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Transfer accepted
#[derive(Debug, Serialize)]
pub struct TransferAck {
    /// Ledger-wide count of applied transfers after this one
    pub transactions: u64,
}

/// Query for the state dump
#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    #[serde(default)]
    pub accounts: bool,
}

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: i64,
    pub banks: usize,
    pub transactions: u64,
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;

    // Resource errors (4xxx)
    pub const UNKNOWN_BANK: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_data() {
        let json = serde_json::to_string(&ApiResponse::<()>::error(4001, "Unknown bank")).unwrap();
        assert_eq!(json, r#"{"code":4001,"msg":"Unknown bank"}"#);
    }

    #[test]
    fn test_success_response() {
        let json =
            serde_json::to_string(&ApiResponse::success(TransferAck { transactions: 3 })).unwrap();
        assert_eq!(json, r#"{"code":0,"msg":"ok","data":{"transactions":3}}"#);
    }
}
