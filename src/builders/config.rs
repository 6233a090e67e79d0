//! Configuration Builder
//!
//! Fluent builder for [`AuthConfig`], including environment loading.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::{AuthError, ConfigurationError};
use crate::types::{
    AuthConfig, ClientAuthMethod, ClientCredentials, ProviderConfig, DEFAULT_SCOPE,
    DEFAULT_TIMEOUT,
};

pub const ENV_BASE_URL: &str = "CLOUDPRINTER_BASE_URL";
pub const ENV_CLIENT_ID: &str = "CLOUDPRINTER_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CLOUDPRINTER_CLIENT_SECRET";
pub const ENV_TIMEOUT_SECS: &str = "CLOUDPRINTER_TIMEOUT_SECS";

/// Configuration builder.
pub struct AuthConfigBuilder {
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: ClientAuthMethod,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    revocation_endpoint: Option<Option<String>>,
    scope: String,
    timeout: Duration,
    expose_error_details: bool,
    env_error: Option<ConfigurationError>,
}

impl Default for AuthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            client_id: None,
            client_secret: None,
            auth_method: ClientAuthMethod::default(),
            authorization_endpoint: None,
            token_endpoint: None,
            revocation_endpoint: None,
            scope: DEFAULT_SCOPE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            expose_error_details: false,
            env_error: None,
        }
    }

    /// Set the CloudPrinter base URL; endpoints are derived from it.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    /// Override the authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Override the token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Override the revocation endpoint.
    pub fn revocation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.revocation_endpoint = Some(Some(endpoint.into()));
        self
    }

    /// Disable revocation at sign-out.
    pub fn without_revocation(mut self) -> Self {
        self.revocation_endpoint = Some(None);
        self
    }

    /// Set the scope requested at login.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the timeout for every network call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Include upstream bodies in boundary error responses.
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    /// Fill unset values from `CLOUDPRINTER_*` environment variables.
    ///
    /// A malformed `CLOUDPRINTER_TIMEOUT_SECS` is reported by [`Self::build`].
    pub fn from_env(mut self) -> Self {
        if self.base_url.is_none() {
            self.base_url = std::env::var(ENV_BASE_URL).ok();
        }
        if self.client_id.is_none() {
            self.client_id = std::env::var(ENV_CLIENT_ID).ok();
        }
        if self.client_secret.is_none() {
            self.client_secret = std::env::var(ENV_CLIENT_SECRET).ok().map(SecretString::new);
        }
        self.timeout_from_env_value(std::env::var(ENV_TIMEOUT_SECS).ok())
    }

    fn timeout_from_env_value(mut self, value: Option<String>) -> Self {
        if let Some(value) = value {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.timeout = Duration::from_secs(secs),
                Err(_) => {
                    self.env_error = Some(ConfigurationError::InvalidConfig {
                        message: format!(
                            "{} must be a whole number of seconds, got {:?}",
                            ENV_TIMEOUT_SECS, value
                        ),
                    })
                }
            }
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<AuthConfig, AuthError> {
        if let Some(error) = self.env_error {
            return Err(error.into());
        }

        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigurationError::MissingField {
                field: "client_id".to_string(),
            })?;

        let client_secret = self
            .client_secret
            .ok_or_else(|| ConfigurationError::MissingField {
                field: "client_secret".to_string(),
            })?;

        let base_url = self.base_url.ok_or_else(|| ConfigurationError::MissingField {
            field: "base_url".to_string(),
        })?;

        let mut provider = ProviderConfig::from_base_url(&base_url);
        if let Some(endpoint) = self.authorization_endpoint {
            provider.authorization_endpoint = endpoint;
        }
        if let Some(endpoint) = self.token_endpoint {
            provider.token_endpoint = endpoint;
        }
        if let Some(endpoint) = self.revocation_endpoint {
            provider.revocation_endpoint = endpoint;
        }

        validate_url(&provider.base_url)?;
        validate_url(&provider.authorization_endpoint)?;
        validate_url(&provider.token_endpoint)?;
        if let Some(endpoint) = &provider.revocation_endpoint {
            validate_url(endpoint)?;
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(AuthConfig {
            provider,
            credentials: ClientCredentials {
                client_id,
                client_secret,
                auth_method: self.auth_method,
            },
            scope: self.scope,
            timeout: self.timeout,
            expose_error_details: self.expose_error_details,
        })
    }
}

fn validate_url(url: &str) -> Result<(), ConfigurationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigurationError::InvalidEndpoint {
            url: url.to_string(),
        }),
    }
}

impl AuthConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::new()
    }

    /// Create a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CLOUDPRINTER_BASE_URL` (required): platform base URL
    /// - `CLOUDPRINTER_CLIENT_ID` (required): OAuth2 client ID
    /// - `CLOUDPRINTER_CLIENT_SECRET` (required): OAuth2 client secret
    /// - `CLOUDPRINTER_TIMEOUT_SECS` (optional): network timeout in seconds
    pub fn from_env() -> Result<Self, AuthError> {
        for name in [ENV_BASE_URL, ENV_CLIENT_ID, ENV_CLIENT_SECRET] {
            if std::env::var(name).is_err() {
                return Err(ConfigurationError::MissingEnvVar {
                    name: name.to_string(),
                }
                .into());
            }
        }

        AuthConfigBuilder::new().from_env().build()
    }
}
