//! Error Types
//!
//! Tagged error taxonomy for the token lifecycle and its HTTP boundary mapping.

mod response;

pub use response::{messages, ErrorResponse};

use std::time::Duration;
use thiserror::Error;

/// Root error type for the CloudPrinter OAuth2 integration.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The refresh exchange was rejected, failed on the network, or returned
    /// an unusable body. The record it was attempted from must be persisted
    /// as failed.
    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String, status: Option<u16> },

    /// The record is already marked as failed; only a new login helps.
    #[error("Token refresh failed - please sign in again")]
    ReauthRequired,

    /// The upstream resource rejected the request even after a refresh.
    #[error("Authentication failed - please sign in again")]
    AuthenticationFailed,

    /// Non-401 failure from the protected resource.
    #[error("CloudPrinter API request failed with status {status}")]
    UpstreamError { status: u16, details: String },

    #[error("No valid session for principal: {principal}")]
    SessionNotFound { principal: String },

    #[error("Authorization code exchange failed: {message}")]
    CodeExchangeFailed { message: String, status: Option<u16> },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RefreshFailed { .. } => "AUTH_REFRESH_FAILED",
            Self::ReauthRequired => "AUTH_REAUTH_REQUIRED",
            Self::AuthenticationFailed => "AUTH_AUTHENTICATION_FAILED",
            Self::UpstreamError { .. } => "AUTH_UPSTREAM",
            Self::SessionNotFound { .. } => "AUTH_NO_SESSION",
            Self::CodeExchangeFailed { .. } => "AUTH_CODE_EXCHANGE",
            Self::Configuration(_) => "AUTH_CONFIG",
            Self::Network(_) => "AUTH_NETWORK",
            Self::Protocol(_) => "AUTH_PROTOCOL",
            Self::Storage(_) => "AUTH_STORAGE",
        }
    }

    /// Check if the principal has to sign in again before any further call.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::RefreshFailed { .. }
                | Self::ReauthRequired
                | Self::AuthenticationFailed
                | Self::SessionNotFound { .. }
                | Self::CodeExchangeFailed { .. }
        )
    }

    /// HTTP status the boundary answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            e if e.needs_reauth() => 401,
            Self::UpstreamError { status, .. } => *status,
            _ => 500,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Environment variable not set: {name}")]
    MissingEnvVar { name: String },
}

/// Network/transport error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("HTTP client initialization failed: {message}")]
    ClientInit { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Session storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },
}

/// Result type for token lifecycle operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// OAuth2 error object returned by the token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Summarize a failed token-endpoint response for logs and error messages.
///
/// The body is opaque; when it happens to be an OAuth2 error object its code
/// and description are used, otherwise only the status is reported.
pub fn describe_token_failure(status: u16, body: &str) -> String {
    match parse_error_response(body) {
        Some(OAuth2ErrorResponse {
            error,
            error_description: Some(description),
            ..
        }) => format!("HTTP {}: {} ({})", status, error, description),
        Some(OAuth2ErrorResponse { error, .. }) => format!("HTTP {}: {}", status, error),
        None => format!("HTTP {}", status),
    }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &AuthError) -> String {
    match error {
        AuthError::RefreshFailed { .. } | AuthError::ReauthRequired => {
            messages::TOKEN_REFRESH_FAILED.to_string()
        }
        AuthError::AuthenticationFailed | AuthError::CodeExchangeFailed { .. } => {
            messages::AUTHENTICATION_FAILED.to_string()
        }
        AuthError::SessionNotFound { .. } => messages::NO_SESSION.to_string(),
        AuthError::UpstreamError { .. } => messages::API_REQUEST_FAILED.to_string(),
        AuthError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        _ => "An unexpected error occurred".to_string(),
    }
}
