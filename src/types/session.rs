//! Session Types
//!
//! Sanitized session view handed to callers. Never carries token values.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::types::{TokenRecord, TokenStatus};

/// Error flag set on a session whose token refresh failed.
pub const REFRESH_ACCESS_TOKEN_ERROR: &str = "RefreshAccessTokenError";

/// What a caller may know about a principal's session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub principal: String,
    pub status: TokenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub requires_reauth: bool,
}

impl SessionView {
    /// Build the view of a stored record.
    pub fn from_record(principal: impl Into<String>, record: &TokenRecord) -> Self {
        let failed = record.is_refresh_failed();
        Self {
            principal: principal.into(),
            status: record.status,
            expires_at: Utc
                .timestamp_millis_opt(record.access_token_expires_at as i64)
                .single(),
            error: failed.then(|| REFRESH_ACCESS_TOKEN_ERROR.to_string()),
            requires_reauth: failed,
        }
    }
}
