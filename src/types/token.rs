//! Token Types
//!
//! Persisted token state for one principal and the token endpoint response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ProtocolError;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Token response from the authorization server.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    fn expires_at(&self, issued_at: u64) -> Result<u64, ProtocolError> {
        if self.access_token.is_empty() {
            return Err(ProtocolError::MissingField {
                field: "access_token".to_string(),
            });
        }
        let expires_in = self.expires_in.ok_or_else(|| ProtocolError::MissingField {
            field: "expires_in".to_string(),
        })?;
        expires_in
            .checked_mul(1000)
            .and_then(|ms| issued_at.checked_add(ms))
            .ok_or_else(|| ProtocolError::InvalidResponse {
                message: format!("expires_in out of range: {}", expires_in),
            })
    }

    /// Refresh token carried by the response, ignoring empty strings.
    fn usable_refresh_token(&self) -> Option<String> {
        self.refresh_token
            .as_ref()
            .filter(|token| !token.is_empty())
            .cloned()
    }
}

/// Lifecycle status of a [`TokenRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Valid,
    /// Terminal: a refresh failed and the record must not be used again.
    RefreshFailed,
}

/// Persisted auth state for one principal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds after which `access_token` must not be used.
    pub access_token_expires_at: u64,
    pub status: TokenStatus,
    /// Epoch milliseconds at which `access_token` was issued.
    pub issued_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRecord {
    /// Build the initial record from an authorization-code exchange response.
    pub fn from_response(response: &TokenResponse, issued_at: u64) -> Result<Self, ProtocolError> {
        let access_token_expires_at = response.expires_at(issued_at)?;

        Ok(Self {
            access_token: response.access_token.clone(),
            refresh_token: response.usable_refresh_token(),
            access_token_expires_at,
            status: TokenStatus::Valid,
            issued_at,
            scope: response.scope.clone(),
        })
    }

    /// Build the successor of this record from a refresh response.
    ///
    /// The previous refresh token is kept when the response carries none.
    pub fn apply_refresh(
        &self,
        response: &TokenResponse,
        issued_at: u64,
    ) -> Result<Self, ProtocolError> {
        let access_token_expires_at = response.expires_at(issued_at)?;

        Ok(Self {
            access_token: response.access_token.clone(),
            refresh_token: response
                .usable_refresh_token()
                .or_else(|| self.refresh_token.clone()),
            access_token_expires_at,
            status: TokenStatus::Valid,
            issued_at,
            scope: response.scope.clone().or_else(|| self.scope.clone()),
        })
    }

    /// Copy of this record flagged as terminally failed.
    pub fn mark_refresh_failed(&self) -> Self {
        Self {
            status: TokenStatus::RefreshFailed,
            ..self.clone()
        }
    }

    /// Whether a refresh has failed on this record.
    pub fn is_refresh_failed(&self) -> bool {
        self.status == TokenStatus::RefreshFailed
    }

    /// Whether the access token is past its expiry at `now` (epoch ms).
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.access_token_expires_at
    }

    /// Whether the access token may be sent as is at `now`.
    pub fn is_usable_at(&self, now: u64) -> bool {
        !self.is_refresh_failed() && !self.is_expired_at(now)
    }

    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn remaining_lifetime_ms(&self, now: u64) -> u64 {
        self.access_token_expires_at.saturating_sub(now)
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("status", &self.status)
            .field("issued_at", &self.issued_at)
            .field("scope", &self.scope)
            .finish()
    }
}
