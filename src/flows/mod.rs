//! OAuth2 Flows
//!
//! The authorization-code login flow.

pub mod authorization_code;

pub use authorization_code::{generate_state, AuthorizationCodeFlow, AuthorizationCodeFlowImpl};
