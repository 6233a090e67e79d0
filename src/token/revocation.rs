//! Token Revocation
//!
//! RFC 7009 revocation of a principal's tokens at sign-out.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::HttpTransport;
use crate::error::{describe_token_failure, AuthError, ConfigurationError, ProtocolError};
use crate::types::AuthConfig;

/// Which token is being revoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Token revoker interface.
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    /// Revoke a token at the provider.
    async fn revoke(&self, token: &str, hint: TokenTypeHint) -> Result<(), AuthError>;
}

/// Revoker posting to the configured revocation endpoint.
pub struct DefaultTokenRevoker<T: HttpTransport> {
    config: AuthConfig,
    transport: Arc<T>,
}

impl<T: HttpTransport> DefaultTokenRevoker<T> {
    /// Create new token revoker.
    pub fn new(config: AuthConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl<T: HttpTransport> TokenRevoker for DefaultTokenRevoker<T> {
    async fn revoke(&self, token: &str, hint: TokenTypeHint) -> Result<(), AuthError> {
        let endpoint = self
            .config
            .provider
            .revocation_endpoint
            .as_deref()
            .ok_or_else(|| ConfigurationError::MissingField {
                field: "revocation_endpoint".to_string(),
            })?;

        let request = self.config.form_request(
            endpoint,
            vec![
                ("token", token.to_string()),
                ("token_type_hint", hint.as_str().to_string()),
            ],
        );

        let response = self.transport.send(request).await?;

        // RFC 7009: 200 even for unknown tokens
        if !response.is_success() {
            return Err(ProtocolError::InvalidResponse {
                message: describe_token_failure(response.status, &response.body),
            }
            .into());
        }

        Ok(())
    }
}
