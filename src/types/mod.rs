//! Types
//!
//! Token records, session views, callbacks, and configuration.

pub mod callback;
pub mod config;
pub mod session;
pub mod token;

pub use callback::CallbackParams;
pub use config::{
    AuthConfig, ClientAuthMethod, ClientCredentials, GrantType, ProviderConfig, DEFAULT_SCOPE,
    DEFAULT_TIMEOUT,
};
pub use session::{SessionView, REFRESH_ACCESS_TOKEN_ERROR};
pub use token::{now_ms, TokenRecord, TokenResponse, TokenStatus};
