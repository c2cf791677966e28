//! Protocol-level and registration-time errors.
//!
//! # Design Decisions
//! - Handlers and middleware fail with [`RpcError`], which is exactly the
//!   `error` member of a response envelope
//! - Internal faults are generalized to [`ErrorCode::Internal`] before they
//!   reach the wire; the detail only goes to the log
//! - Registration errors are synchronous and fatal at startup

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::di::ContainerError;

/// The fixed set of error codes produced by the dispatcher itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::Internal => -32603,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::Internal => "Internal error",
        }
    }
}

/// JSON-RPC error object.
///
/// Handlers return this directly; application errors may use any code
/// outside the reserved `-32768..=-32000` range via [`RpcError::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request() -> Self {
        ErrorCode::InvalidRequest.into()
    }

    pub fn method_not_found() -> Self {
        ErrorCode::MethodNotFound.into()
    }

    pub fn invalid_params() -> Self {
        ErrorCode::InvalidParams.into()
    }

    pub fn internal() -> Self {
        ErrorCode::Internal.into()
    }

    /// Attach structured detail to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns true if this error carries the given dispatcher code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.code()
    }
}

impl From<ErrorCode> for RpcError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }
}

/// Failure registering a method with a registry.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("method name is empty")]
    EmptyMethodName,

    #[error("method `{0}` was declared without a handler")]
    MissingHandler(String),

    #[error("resolution service rejected the handler provider: {0}")]
    RegistryUnavailable(#[from] ContainerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::invalid_request().code, -32600);
        assert_eq!(RpcError::method_not_found().code, -32601);
        assert_eq!(RpcError::invalid_params().code, -32602);
        assert_eq!(RpcError::internal().code, -32603);
        assert!(RpcError::internal().is(ErrorCode::Internal));
    }

    #[test]
    fn test_error_serialization_omits_empty_data() {
        let value = serde_json::to_value(RpcError::method_not_found()).unwrap();
        assert_eq!(value, json!({"code": -32601, "message": "Method not found"}));

        let value = serde_json::to_value(RpcError::new(42, "boom").with_data(json!([1]))).unwrap();
        assert_eq!(value, json!({"code": 42, "message": "boom", "data": [1]}));
    }
}
