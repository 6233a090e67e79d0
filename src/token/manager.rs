//! Token Lifecycle Manager
//!
//! Decides on every access whether a principal's access token is usable,
//! expired but refreshable, or irrecoverably invalid, and performs the
//! refresh exchange.
//!
//! A failed refresh is terminal for the record it was attempted from: the
//! record is persisted with [`TokenStatus::RefreshFailed`] and every later
//! access fails with [`AuthError::ReauthRequired`] without touching the
//! network, until a new login replaces it.
//!
//! Store-backed operations run under a per-principal lock, so concurrent
//! requests for one principal share a single refresh exchange instead of
//! racing each other with the same refresh token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::HttpTransport;
use crate::error::{describe_token_failure, AuthError, AuthResult};
use crate::flows::{AuthorizationCodeFlow, AuthorizationCodeFlowImpl};
use crate::telemetry::{AuthLogContext, Logger};
use crate::token::{DefaultTokenRevoker, SessionStore, TokenRevoker, TokenTypeHint};
use crate::types::{
    now_ms, AuthConfig, CallbackParams, GrantType, SessionView, TokenRecord, TokenResponse,
};

/// Owns the access/refresh token pair of every principal.
pub struct TokenLifecycleManager<T: HttpTransport, S: SessionStore> {
    config: AuthConfig,
    transport: Arc<T>,
    store: Arc<S>,
    logger: Arc<dyn Logger>,
    code_flow: AuthorizationCodeFlowImpl<T>,
    revoker: DefaultTokenRevoker<T>,
    refresh_locks: LockMap,
}

impl<T: HttpTransport, S: SessionStore> TokenLifecycleManager<T, S> {
    /// Create new token lifecycle manager.
    pub fn new(
        config: AuthConfig,
        transport: Arc<T>,
        store: Arc<S>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            code_flow: AuthorizationCodeFlowImpl::new(config.clone(), transport.clone()),
            revoker: DefaultTokenRevoker::new(config.clone(), transport.clone()),
            config,
            transport,
            store,
            logger,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Session store in use.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Return a record whose access token may be used now.
    ///
    /// Failed records are rejected without a network call; unexpired records
    /// are returned unchanged; expired ones go through [`Self::refresh`].
    pub async fn ensure_valid_token(
        &self,
        principal: &str,
        record: &TokenRecord,
    ) -> AuthResult<TokenRecord> {
        if record.is_refresh_failed() {
            self.logger.warn(
                "Token record is marked as failed, re-authentication required",
                &AuthLogContext::for_principal(principal, "ensure_valid_token"),
            );
            return Err(AuthError::ReauthRequired);
        }

        let now = now_ms();
        if !record.is_expired_at(now) {
            self.logger.trace(
                "Access token still valid",
                &AuthLogContext::for_principal(principal, "ensure_valid_token")
                    .extra("remaining_ms", record.remaining_lifetime_ms(now)),
            );
            return Ok(record.clone());
        }

        self.refresh(principal, record).await
    }

    /// Exchange the record's refresh token for a new access token.
    ///
    /// Issues exactly one request and never retries. On error the caller must
    /// persist `record.mark_refresh_failed()`.
    pub async fn refresh(&self, principal: &str, record: &TokenRecord) -> AuthResult<TokenRecord> {
        let context = AuthLogContext::for_principal(principal, "refresh_token");

        if record.is_refresh_failed() {
            return Err(AuthError::ReauthRequired);
        }

        let refresh_token = match record.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => {
                self.logger.error("No refresh token available", &context);
                return Err(AuthError::RefreshFailed {
                    message: "No refresh token available".to_string(),
                    status: None,
                });
            }
        };

        let request = self.config.form_request(
            &self.config.provider.token_endpoint,
            vec![
                ("grant_type", GrantType::RefreshToken.as_str().to_string()),
                ("refresh_token", refresh_token.to_string()),
            ],
        );

        self.logger.debug("Refreshing access token", &context);

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.error(
                    "Token refresh request failed",
                    &context.clone().extra("error", &e),
                );
                return Err(AuthError::RefreshFailed {
                    message: e.to_string(),
                    status: None,
                });
            }
        };

        if !response.is_success() {
            let message = describe_token_failure(response.status, &response.body);
            self.logger.error(
                "Token refresh rejected",
                &context.clone().extra("status", response.status).extra("reason", &message),
            );
            return Err(AuthError::RefreshFailed {
                message,
                status: Some(response.status),
            });
        }

        let refreshed = response
            .parse_json::<TokenResponse>()
            .and_then(|parsed| record.apply_refresh(&parsed, now_ms()));

        match refreshed {
            Ok(next) => {
                self.logger.info(
                    "Access token refreshed",
                    &context
                        .clone()
                        .extra("expires_at", next.access_token_expires_at)
                        .extra(
                            "refresh_token_rotated",
                            next.refresh_token != record.refresh_token,
                        ),
                );
                Ok(next)
            }
            Err(e) => {
                self.logger.error(
                    "Token refresh response unusable",
                    &context.clone().extra("error", &e),
                );
                Err(AuthError::RefreshFailed {
                    message: e.to_string(),
                    status: Some(response.status),
                })
            }
        }
    }

    /// Build the provider URL the browser is sent to for login.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> AuthResult<String> {
        self.code_flow.build_authorization_url(redirect_uri, state)
    }

    /// Exchange an authorization code and store the principal's new record,
    /// replacing any previous (possibly failed) one.
    pub async fn login(
        &self,
        principal: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<TokenRecord> {
        let result = self.code_flow.exchange_code(code, redirect_uri).await;
        self.complete_login(principal, result).await
    }

    /// Validate a provider callback and log the principal in with its code.
    pub async fn login_with_callback(
        &self,
        principal: &str,
        callback: &CallbackParams,
        expected_state: &str,
        redirect_uri: &str,
    ) -> AuthResult<TokenRecord> {
        let result = self
            .code_flow
            .handle_callback(callback, expected_state, redirect_uri)
            .await;
        self.complete_login(principal, result).await
    }

    async fn complete_login(
        &self,
        principal: &str,
        result: AuthResult<TokenRecord>,
    ) -> AuthResult<TokenRecord> {
        let context = AuthLogContext::for_principal(principal, "login");

        let record = result.map_err(|e| {
            self.logger
                .error("Authorization code exchange failed", &context.clone().extra("error", &e));
            e
        })?;

        let entry = self.lock_for(principal);
        let _guard = entry.lock.lock().await;
        self.store.save(principal, record.clone()).await?;
        self.logger.info("Principal signed in", &context);

        Ok(record)
    }

    /// Load the principal's record and make sure it is usable, persisting
    /// whatever the check produced.
    pub async fn valid_token(&self, principal: &str) -> AuthResult<TokenRecord> {
        let entry = self.lock_for(principal);
        let _guard = entry.lock.lock().await;

        let record = self.load_required(principal).await?;
        let result = self.ensure_valid_token(principal, &record).await;
        self.persist_outcome(principal, &record, result).await
    }

    /// Refresh after the upstream API rejected `rejected_access_token`.
    ///
    /// If another request already replaced that token while this one waited
    /// for the lock, the replacement is returned without a second exchange.
    pub async fn force_refresh(
        &self,
        principal: &str,
        rejected_access_token: &str,
    ) -> AuthResult<TokenRecord> {
        let entry = self.lock_for(principal);
        let _guard = entry.lock.lock().await;

        let record = self.load_required(principal).await?;
        if record.is_refresh_failed() {
            return Err(AuthError::ReauthRequired);
        }

        if record.access_token != rejected_access_token && record.is_usable_at(now_ms()) {
            self.logger.debug(
                "Access token already replaced by a concurrent refresh",
                &AuthLogContext::for_principal(principal, "force_refresh"),
            );
            return Ok(record);
        }

        let result = self.refresh(principal, &record).await;
        self.persist_outcome(principal, &record, result).await
    }

    /// Sanitized view of the principal's session.
    ///
    /// Runs the same check as [`Self::valid_token`] first, so an expired
    /// token is refreshed and a failed refresh shows up as an error flag.
    pub async fn session(&self, principal: &str) -> AuthResult<SessionView> {
        match self.valid_token(principal).await {
            Ok(record) => Ok(SessionView::from_record(principal, &record)),
            Err(e) if e.needs_reauth() => match self.store.load(principal).await? {
                Some(record) => Ok(SessionView::from_record(principal, &record)),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Revoke the principal's refresh token (best effort) and forget the
    /// session. Returns whether a session existed.
    pub async fn sign_out(&self, principal: &str) -> AuthResult<bool> {
        let context = AuthLogContext::for_principal(principal, "sign_out");

        let existed = {
            let entry = self.lock_for(principal);
            let _guard = entry.lock.lock().await;

            if let Some(record) = self.store.load(principal).await? {
                if let (Some(token), Some(_)) = (
                    record.refresh_token.as_deref(),
                    self.config.provider.revocation_endpoint.as_ref(),
                ) {
                    if let Err(e) = self.revoker.revoke(token, TokenTypeHint::RefreshToken).await {
                        self.logger
                            .warn("Token revocation failed", &context.clone().extra("error", &e));
                    }
                }
            }

            self.store.delete(principal).await?
        };

        self.logger
            .info("Principal signed out", &context.extra("had_session", existed));
        Ok(existed)
    }

    async fn load_required(&self, principal: &str) -> AuthResult<TokenRecord> {
        self.store.load(principal).await?.ok_or_else(|| {
            self.logger.warn(
                "No session stored for principal",
                &AuthLogContext::for_principal(principal, "load_session"),
            );
            AuthError::SessionNotFound {
                principal: principal.to_string(),
            }
        })
    }

    /// Save a refreshed record, or the failed-marked original when the
    /// refresh failed, and pass the result through.
    async fn persist_outcome(
        &self,
        principal: &str,
        original: &TokenRecord,
        result: AuthResult<TokenRecord>,
    ) -> AuthResult<TokenRecord> {
        match result {
            Ok(next) => {
                if &next != original {
                    self.store.save(principal, next.clone()).await?;
                }
                Ok(next)
            }
            Err(e @ AuthError::RefreshFailed { .. }) => {
                self.store
                    .save(principal, original.mark_refresh_failed())
                    .await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn lock_for(&self, principal: &str) -> PrincipalLock<'_> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(principal.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        PrincipalLock {
            locks: &self.refresh_locks,
            principal: principal.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.refresh_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Handle on a principal's entry in the lock map. The entry is removed when
/// the last handle drops, so the map only holds principals with operations
/// in flight.
struct PrincipalLock<'a> {
    locks: &'a LockMap,
    principal: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for PrincipalLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this handle still own the mutex
        let last_holder = locks
            .get(&self.principal)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
            && Arc::strong_count(&self.lock) == 2;
        if last_holder {
            locks.remove(&self.principal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::AuthConfigBuilder;
    use crate::core::{HttpResponse, MockHttpTransport};
    use crate::error::NetworkError;
    use crate::telemetry::InMemoryLogger;
    use crate::token::{InMemorySessionStore, MockSessionStore};
    use crate::types::TokenStatus;
    use std::time::Duration;

    const PRINCIPAL: &str = "ada@example.com";

    fn config() -> AuthConfig {
        AuthConfigBuilder::new()
            .base_url("https://api.cloudprinter.test")
            .client_id("client-1")
            .client_secret("s3cret")
            .build()
            .unwrap()
    }

    fn record(access_token: &str, expires_at: u64) -> TokenRecord {
        TokenRecord {
            access_token: access_token.to_string(),
            refresh_token: Some("R1".to_string()),
            access_token_expires_at: expires_at,
            status: TokenStatus::Valid,
            issued_at: expires_at.saturating_sub(3_600_000),
            scope: None,
        }
    }

    struct Harness {
        manager: TokenLifecycleManager<MockHttpTransport, InMemorySessionStore>,
        transport: Arc<MockHttpTransport>,
        store: Arc<InMemorySessionStore>,
        logger: Arc<InMemoryLogger>,
    }

    fn harness() -> Harness {
        let transport = Arc::new(MockHttpTransport::new());
        let store = Arc::new(InMemorySessionStore::new());
        let logger = Arc::new(InMemoryLogger::new());
        let manager =
            TokenLifecycleManager::new(config(), transport.clone(), store.clone(), logger.clone());
        Harness {
            manager,
            transport,
            store,
            logger,
        }
    }

    #[tokio::test]
    async fn test_unexpired_record_is_returned_without_network() {
        let h = harness();
        let current = record("A1", now_ms() + 60_000);

        let result = h.manager.ensure_valid_token(PRINCIPAL, &current).await.unwrap();

        assert_eq!(result, current);
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_record_requires_reauth_without_network() {
        let h = harness();
        let failed = record("A1", now_ms() + 60_000).mark_refresh_failed();

        let err = h.manager.ensure_valid_token(PRINCIPAL, &failed).await.unwrap_err();

        assert!(matches!(err, AuthError::ReauthRequired));
        assert_eq!(h.transport.request_count(), 0);

        let expired_failed = record("A1", now_ms() - 1).mark_refresh_failed();
        let err = h
            .manager
            .ensure_valid_token(PRINCIPAL, &expired_failed)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_record_refreshes_once() {
        let h = harness();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );
        let now = now_ms();
        let expired = record("A1", now - 1);

        let refreshed = h.manager.ensure_valid_token(PRINCIPAL, &expired).await.unwrap();

        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(refreshed.status, TokenStatus::Valid);
        assert_eq!(refreshed.access_token, "A2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("R1"));
        let expected = now + 3_600_000;
        assert!(refreshed.access_token_expires_at >= expected);
        assert!(refreshed.access_token_expires_at < expected + 5_000);
    }

    #[tokio::test]
    async fn test_refresh_request_wire_format() {
        let h = harness();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );

        h.manager
            .refresh(PRINCIPAL, &record("A1", now_ms() - 1))
            .await
            .unwrap();

        let request = h.transport.get_last_request().unwrap();
        assert_eq!(
            request.url,
            "https://api.cloudprinter.test/cloudauth/2.0/oauth2/token"
        );
        assert_eq!(request.method, crate::core::HttpMethod::Post);
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            request.body.as_deref(),
            Some("client_id=client-1&client_secret=s3cret&grant_type=refresh_token&refresh_token=R1")
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_refresh_token() {
        let h = harness();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 60, "refresh_token": "R2"}),
        );

        let refreshed = h
            .manager
            .refresh(PRINCIPAL, &record("A1", now_ms() - 1))
            .await
            .unwrap();
        assert_eq!(refreshed.refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let h = harness();
        h.transport.queue_json_response(
            400,
            &serde_json::json!({"error": "invalid_grant", "error_description": "expired"}),
        );

        let err = h
            .manager
            .refresh(PRINCIPAL, &record("A1", now_ms() - 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::RefreshFailed { status: Some(400), .. }
        ));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_refresh_network_failure() {
        let h = harness();
        h.transport.queue_network_error(NetworkError::Timeout {
            timeout: Duration::from_secs(10),
        });

        let err = h
            .manager
            .refresh(PRINCIPAL, &record("A1", now_ms() - 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { status: None, .. }));
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_malformed_body() {
        let h = harness();
        h.transport
            .queue_response(HttpResponse::text(200, "<html>maintenance</html>"));
        h.transport
            .queue_json_response(200, &serde_json::json!({"access_token": "A2"}));

        for _ in 0..2 {
            let err = h
                .manager
                .refresh(PRINCIPAL, &record("A1", now_ms() - 1))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::RefreshFailed { .. }));
        }
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let h = harness();
        let mut current = record("A1", now_ms() - 1);
        current.refresh_token = None;

        let err = h.manager.refresh(PRINCIPAL, &current).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_valid_token_persists_failure_then_short_circuits() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport
            .queue_json_response(400, &serde_json::json!({"error": "invalid_grant"}));

        let err = h.manager.valid_token(PRINCIPAL).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed { .. }));

        let stored = h.store.load(PRINCIPAL).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::RefreshFailed);

        let err = h.manager.valid_token(PRINCIPAL).await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired));
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_valid_token_persists_refreshed_record() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );

        let token = h.manager.valid_token(PRINCIPAL).await.unwrap();
        assert_eq!(token.access_token, "A2");

        let stored = h.store.load(PRINCIPAL).await.unwrap().unwrap();
        assert_eq!(stored, token);
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in_fails_refresh() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": u64::MAX / 10}),
        );

        let err = h.manager.valid_token(PRINCIPAL).await.unwrap_err();
        match err {
            AuthError::RefreshFailed { message, .. } => assert!(message.contains("expires_in")),
            other => panic!("unexpected error: {other:?}"),
        }

        let stored = h.store.load(PRINCIPAL).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::RefreshFailed);
        assert_eq!(stored.access_token, "A1");
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_each_operation() {
        let h = harness();
        for i in 0..100 {
            let principal = format!("user-{i}@example.com");
            h.store
                .save(&principal, record("A1", now_ms() + 60_000))
                .await
                .unwrap();
            h.manager.valid_token(&principal).await.unwrap();
        }
        assert_eq!(h.manager.lock_entries(), 0);

        // Error paths release too
        h.manager.valid_token("nobody@example.com").await.unwrap_err();
        h.manager.force_refresh("nobody@example.com", "A1").await.unwrap_err();
        assert_eq!(h.manager.lock_entries(), 0);

        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A1", "refresh_token": "R1", "expires_in": 3600}),
        );
        h.manager
            .login(PRINCIPAL, "code-123", "https://app.example.com/cb")
            .await
            .unwrap();
        assert_eq!(h.manager.lock_entries(), 0);
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_concurrent_refresh() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );

        let results =
            futures::future::join_all((0..8).map(|_| h.manager.valid_token(PRINCIPAL))).await;

        assert!(results.iter().all(|result| result.is_ok()));
        assert_eq!(h.manager.lock_entries(), 0);
    }

    #[tokio::test]
    async fn test_valid_token_without_session() {
        let h = harness();
        let err = h.manager.valid_token(PRINCIPAL).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound { .. }));
        assert!(err.needs_reauth());
    }

    #[tokio::test]
    async fn test_concurrent_valid_token_single_refresh() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );

        let results =
            futures::future::join_all((0..8).map(|_| h.manager.valid_token(PRINCIPAL))).await;

        assert_eq!(h.transport.request_count(), 1);
        for result in results {
            assert_eq!(result.unwrap().access_token, "A2");
        }
    }

    #[tokio::test]
    async fn test_force_refresh_reuses_concurrent_refresh() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A2", now_ms() + 60_000))
            .await
            .unwrap();

        // The caller was rejected with A1, which has already been replaced
        let token = h.manager.force_refresh(PRINCIPAL, "A1").await.unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_force_refresh_refreshes_rejected_token() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() + 60_000))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );

        let token = h.manager.force_refresh(PRINCIPAL, "A1").await.unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(
            h.store.load(PRINCIPAL).await.unwrap().unwrap().access_token,
            "A2"
        );
    }

    #[tokio::test]
    async fn test_login_replaces_failed_record() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", 0).mark_refresh_failed())
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A9", "refresh_token": "R9", "expires_in": 3600}),
        );

        h.manager
            .login(PRINCIPAL, "code-1", "https://app.example.com/cb")
            .await
            .unwrap();

        let token = h.manager.valid_token(PRINCIPAL).await.unwrap();
        assert_eq!(token.access_token, "A9");
        assert_eq!(token.status, TokenStatus::Valid);
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_session_view_reports_failed_refresh() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() - 1))
            .await
            .unwrap();
        h.transport
            .queue_json_response(401, &serde_json::json!({"error": "invalid_client"}));

        let view = h.manager.session(PRINCIPAL).await.unwrap();
        assert!(view.requires_reauth);
        assert_eq!(view.error.as_deref(), Some(crate::types::REFRESH_ACCESS_TOKEN_ERROR));
    }

    #[tokio::test]
    async fn test_sign_out_revokes_and_deletes() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1", now_ms() + 60_000))
            .await
            .unwrap();
        h.transport.queue_response(HttpResponse::text(503, ""));

        assert!(h.manager.sign_out(PRINCIPAL).await.unwrap());
        assert!(h.store.load(PRINCIPAL).await.unwrap().is_none());

        let request = h.transport.get_last_request().unwrap();
        assert!(request.url.ends_with("/oauth2/revoke"));
        assert_eq!(h.logger.get_entries_by_level(crate::telemetry::LogLevel::Warn).len(), 1);

        assert!(!h.manager.sign_out(PRINCIPAL).await.unwrap());
    }

    #[tokio::test]
    async fn test_logs_never_contain_tokens() {
        let h = harness();
        h.store
            .save(PRINCIPAL, record("A1-secret", now_ms() - 1))
            .await
            .unwrap();
        h.transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2-secret", "refresh_token": "R2-secret", "expires_in": 1}),
        );

        h.manager.valid_token(PRINCIPAL).await.unwrap();

        assert!(h.logger.contains(PRINCIPAL));
        assert!(h.logger.contains("refresh_token"));
        for secret in ["A1-secret", "A2-secret", "R1", "R2-secret", "s3cret"] {
            assert!(!h.logger.contains(secret), "log leaked {}", secret);
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_propagated() {
        let mut store = MockSessionStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|_| Ok(Some(record("A1", 0))));
        store.expect_save().times(1).returning(|_, _| {
            Err(crate::error::StorageError::WriteFailed {
                message: "disk full".to_string(),
            }
            .into())
        });

        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &serde_json::json!({"access_token": "A2", "expires_in": 3600}),
        );
        let manager = TokenLifecycleManager::new(
            config(),
            transport,
            Arc::new(store),
            Arc::new(InMemoryLogger::new()),
        );

        let err = manager.valid_token(PRINCIPAL).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
