//! Callback Types
//!
//! Query parameters of the provider's redirect back to the application.

use url::Url;

use crate::error::AuthError;

/// Query of `GET <redirect_uri>?code=...&state=...` (or `?error=...`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Provider error code, e.g. `access_denied`.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        url.query_pairs().fold(Self::default(), |mut params, (key, value)| {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => return params,
            };
            *slot = Some(value.into_owned());
            params
        })
    }

    pub fn from_url_str(url_str: &str) -> Result<Self, url::ParseError> {
        Url::parse(url_str).map(|url| Self::from_url(&url))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check the callback against the `state` issued with the login redirect
    /// and return its authorization code.
    ///
    /// A provider-reported error takes precedence over a state mismatch.
    pub fn authorization_code(&self, expected_state: &str) -> Result<&str, AuthError> {
        let rejected = |message: String| AuthError::CodeExchangeFailed {
            message,
            status: None,
        };

        if let Some(error) = &self.error {
            return Err(rejected(match &self.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error.clone(),
            }));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(rejected("State parameter mismatch".to_string()));
        }

        self.code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| rejected("Callback carries no authorization code".to_string()))
    }
}
