//! CloudPrinter OAuth2 Integration
//!
//! Server-side token lifecycle for applications that call the CloudPrinter
//! API on behalf of signed-in users.
//!
//! # Features
//!
//! - Authorization Code login (RFC 6749 Section 4.1)
//! - Token Refresh (RFC 6749 Section 6) with a terminal failure state
//! - One refresh-and-retry when the API rejects an access token
//! - Token Revocation on sign-out (RFC 7009)
//! - Per-principal single-flight refresh
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudprinter_oauth2::{AuthConfig, CloudPrinterClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::builder()
//!         .base_url("https://api.cloudprinter.com")
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .build()?;
//!
//!     let client = CloudPrinterClient::new(config)?;
//!
//!     // After the provider redirects back with ?code=...
//!     client
//!         .manager()
//!         .login("ada@example.com", "code", "https://myapp.com/api/auth/callback")
//!         .await?;
//!
//!     let profile: serde_json::Value = client
//!         .get_json("ada@example.com", "/clouduser/2.0/info")
//!         .await?;
//!     println!("{profile}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token records, session views, callbacks, configuration
//! - `error`: error taxonomy and its HTTP response mapping
//! - `core`: HTTP transport and post-login redirect resolution
//! - `flows`: the authorization-code login
//! - `token`: lifecycle manager, session storage, revocation
//! - `builders`: configuration builder and environment loading
//! - `telemetry`: structured logging
//! - `client`: authorized calls to the CloudPrinter API

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod telemetry;
pub mod token;
pub mod types;

pub use client::{handle_response, CloudPrinterClient};

pub use builders::AuthConfigBuilder;

pub use error::{messages, AuthError, AuthResult, ErrorResponse};

pub use core::{
    resolve_redirect, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
};

pub use flows::{generate_state, AuthorizationCodeFlow, AuthorizationCodeFlowImpl};

pub use telemetry::{AuthLogContext, InMemoryLogger, Logger, NoOpLogger, TracingLogger};

pub use token::{
    DefaultTokenRevoker, InMemorySessionStore, SessionStore, TokenLifecycleManager, TokenRevoker,
    TokenTypeHint,
};

pub use types::{
    AuthConfig, CallbackParams, ClientAuthMethod, SessionView, TokenRecord, TokenResponse,
    TokenStatus,
};
