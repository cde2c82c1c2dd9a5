use serde::{Deserialize, Serialize};

/// Standard error response body.
///
/// `{"error": {"type": "...", "message": "...", "param": ..., "code": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error type classification (e.g., "invalid_request_error", "authentication_error")
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Parameter that caused the error (null if not applicable)
    pub param: Option<String>,
    /// Machine-readable error code
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with the default "invalid_request_error" type.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_type("invalid_request_error", code, message)
    }

    /// Create an error response pointing at the request parameter that caused it.
    pub fn with_param(
        code: impl Into<String>,
        message: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        let mut response = Self::new(code, message);
        response.error.param = Some(param.into());
        response
    }

    /// Create an error response with an explicit error type.
    ///
    /// Types used by this service:
    /// - "invalid_request_error" - malformed request or state
    /// - "authentication_error" - sign-in could not be completed
    /// - "permission_error" - identity verified but access denied by policy
    /// - "not_found_error" - resource not found
    /// - "service_unavailable_error" - provider not initialized
    /// - "server_error" - internal or upstream failure
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                param: None,
                code: Some(code.into()),
            },
        }
    }
}
