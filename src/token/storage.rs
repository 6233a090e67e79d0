//! Session Storage
//!
//! Persistence seam for per-principal token records.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{AuthError, StorageError};
use crate::types::TokenRecord;

/// Session store interface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the record for a principal.
    async fn load(&self, principal: &str) -> Result<Option<TokenRecord>, AuthError>;

    /// Persist the record for a principal, replacing any previous one.
    async fn save(&self, principal: &str, record: TokenRecord) -> Result<(), AuthError>;

    /// Delete the record for a principal.
    async fn delete(&self, principal: &str) -> Result<bool, AuthError>;
}

/// In-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl InMemorySessionStore {
    /// Create new in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, TokenRecord>>, StorageError> {
        self.records.lock().map_err(|e| StorageError::ReadFailed {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, principal: &str) -> Result<Option<TokenRecord>, AuthError> {
        Ok(self.records()?.get(principal).cloned())
    }

    async fn save(&self, principal: &str, record: TokenRecord) -> Result<(), AuthError> {
        self.records()?.insert(principal.to_string(), record);
        Ok(())
    }

    async fn delete(&self, principal: &str) -> Result<bool, AuthError> {
        Ok(self.records()?.remove(principal).is_some())
    }
}
