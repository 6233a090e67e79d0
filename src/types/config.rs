//! Configuration Types
//!
//! Provider endpoints, client credentials, and client-wide settings.

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::{encode_form, HttpMethod, HttpRequest};

/// Default timeout applied to every network call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Scope requested at login.
pub const DEFAULT_SCOPE: &str = "read-write";

pub const AUTHORIZE_PATH: &str = "/cloudauth/2.0/oauth2/authorize";
pub const TOKEN_PATH: &str = "/cloudauth/2.0/oauth2/token";
pub const REVOKE_PATH: &str = "/cloudauth/2.0/oauth2/revoke";

/// Client configuration for the CloudPrinter OAuth2 provider.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Provider configuration.
    pub provider: ProviderConfig,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Scope requested at login.
    pub scope: String,
    /// Timeout for token exchanges and upstream requests.
    pub timeout: Duration,
    /// Include upstream bodies and internal messages in boundary responses.
    pub expose_error_details: bool,
}

impl AuthConfig {
    /// Build a form-encoded POST to one of the provider's token endpoints,
    /// authenticating the client as configured.
    pub(crate) fn form_request(&self, url: &str, params: Vec<(&'static str, String)>) -> HttpRequest {
        let mut params = params;
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        self.credentials.authenticate(&mut params, &mut headers);

        HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers,
            body: Some(encode_form(&params)),
            timeout: Some(self.timeout),
        }
    }
}

/// OAuth2 provider endpoint configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the CloudPrinter API, also used for upstream resources.
    pub base_url: String,
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Token revocation endpoint (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
}

impl ProviderConfig {
    /// Derive all endpoints from the platform base URL.
    pub fn from_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            base_url: base.to_string(),
            authorization_endpoint: format!("{}{}", base, AUTHORIZE_PATH),
            token_endpoint: format!("{}{}", base, TOKEN_PATH),
            revocation_endpoint: Some(format!("{}{}", base, REVOKE_PATH)),
        }
    }

    /// Absolute URL of an upstream resource path.
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Client credentials for OAuth2 authentication.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl ClientCredentials {
    /// Add client authentication to a token endpoint request.
    pub(crate) fn authenticate(
        &self,
        params: &mut Vec<(&'static str, String)>,
        headers: &mut HashMap<String, String>,
    ) {
        match self.auth_method {
            ClientAuthMethod::ClientSecretPost => {
                params.insert(0, ("client_secret", self.client_secret.expose_secret().clone()));
                params.insert(0, ("client_id", self.client_id.clone()));
            }
            ClientAuthMethod::ClientSecretBasic => {
                let credentials =
                    format!("{}:{}", self.client_id, self.client_secret.expose_secret());
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                headers.insert("authorization".to_string(), format!("Basic {}", encoded));
            }
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in the form body. CloudPrinter expects this.
    #[default]
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}
