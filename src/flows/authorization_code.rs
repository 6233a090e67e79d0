//! Authorization Code Flow
//!
//! RFC 6749 Section 4.1 - the login that creates a principal's first record.

use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use std::sync::Arc;
use url::Url;

use crate::core::HttpTransport;
use crate::error::{describe_token_failure, AuthError, ConfigurationError};
use crate::types::{now_ms, AuthConfig, CallbackParams, GrantType, TokenRecord, TokenResponse};

/// Authorization Code Flow interface.
#[async_trait]
pub trait AuthorizationCodeFlow: Send + Sync {
    /// Build authorization URL for user redirect.
    fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError>;

    /// Exchange authorization code for the first token record.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenRecord, AuthError>;

    /// Validate a callback against the expected state and exchange its code.
    async fn handle_callback(
        &self,
        callback: &CallbackParams,
        expected_state: &str,
        redirect_uri: &str,
    ) -> Result<TokenRecord, AuthError> {
        let code = callback.authorization_code(expected_state)?;
        self.exchange_code(code, redirect_uri).await
    }
}

/// Generate an unguessable `state` value for the authorization request.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Authorization Code Flow implementation.
pub struct AuthorizationCodeFlowImpl<T: HttpTransport> {
    config: AuthConfig,
    transport: Arc<T>,
}

impl<T: HttpTransport> AuthorizationCodeFlowImpl<T> {
    /// Create new Authorization Code Flow.
    pub fn new(config: AuthConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl<T: HttpTransport> AuthorizationCodeFlow for AuthorizationCodeFlowImpl<T> {
    fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.config.provider.authorization_endpoint).map_err(|_| {
            ConfigurationError::InvalidEndpoint {
                url: self.config.provider.authorization_endpoint.clone(),
            }
        })?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.credentials.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", state);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenRecord, AuthError> {
        let request = self.config.form_request(
            &self.config.provider.token_endpoint,
            vec![
                ("grant_type", GrantType::AuthorizationCode.as_str().to_string()),
                ("code", code.to_string()),
                ("redirect_uri", redirect_uri.to_string()),
            ],
        );

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(AuthError::CodeExchangeFailed {
                message: describe_token_failure(response.status, &response.body),
                status: Some(response.status),
            });
        }

        let token_response: TokenResponse = response.parse_json()?;
        Ok(TokenRecord::from_response(&token_response, now_ms())?)
    }
}
