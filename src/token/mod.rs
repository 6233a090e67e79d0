//! Token Management
//!
//! Token lifecycle management: session storage, refresh, and revocation.

pub mod manager;
pub mod revocation;
pub mod storage;

pub use manager::TokenLifecycleManager;
pub use revocation::{DefaultTokenRevoker, TokenRevoker, TokenTypeHint};
#[cfg(test)]
pub use storage::MockSessionStore;
pub use storage::{InMemorySessionStore, SessionStore};
