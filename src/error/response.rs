//! Boundary Responses
//!
//! Maps [`AuthError`] to the status code and JSON body an HTTP route returns.

use serde::Serialize;
use serde_json::{json, Value};

use super::AuthError;

/// Messages shown at the HTTP boundary.
pub mod messages {
    pub const TOKEN_REFRESH_FAILED: &str = "Token refresh failed - please sign in again";
    pub const AUTHENTICATION_FAILED: &str = "Authentication failed - please sign in again";
    pub const NO_SESSION: &str = "No valid session or access token";
    pub const API_REQUEST_FAILED: &str = "Failed to fetch data from CloudPrinter";
    pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";
    pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";
}

/// Status code and JSON body for a failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub body: Value,
}

impl ErrorResponse {
    /// Whether the front end must force a fresh login.
    pub fn requires_reauth(&self) -> bool {
        self.body
            .get("requiresReauth")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl AuthError {
    /// Build the boundary response for this error.
    ///
    /// `expose_details` controls whether upstream bodies and internal messages
    /// are included; keep it off outside development.
    pub fn to_response(&self, expose_details: bool) -> ErrorResponse {
        if self.needs_reauth() {
            return ErrorResponse {
                status: 401,
                body: json!({
                    "error": messages::AUTHENTICATION_FAILED,
                    "message": super::get_user_message(self),
                    "requiresReauth": true,
                }),
            };
        }

        match self {
            AuthError::UpstreamError { status, details } => {
                let mut body = json!({
                    "error": messages::API_REQUEST_FAILED,
                    "status": status,
                });
                if expose_details {
                    body["details"] = Value::String(details.clone());
                }
                ErrorResponse {
                    status: *status,
                    body,
                }
            }
            other => {
                let message = if expose_details {
                    other.to_string()
                } else {
                    messages::UNEXPECTED_ERROR.to_string()
                };
                ErrorResponse {
                    status: 500,
                    body: json!({
                        "error": messages::INTERNAL_SERVER_ERROR,
                        "message": message,
                    }),
                }
            }
        }
    }
}
