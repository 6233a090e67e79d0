//! CloudPrinter Client
//!
//! Calls the protected CloudPrinter API on behalf of a principal, attaching a
//! valid bearer token and recovering once from a 401.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

use crate::core::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport, MAX_RESPONSE_SIZE,
};
use crate::error::{AuthError, AuthResult};
use crate::telemetry::{AuthLogContext, Logger, TracingLogger};
use crate::token::{InMemorySessionStore, SessionStore, TokenLifecycleManager};
use crate::types::{AuthConfig, SessionView, TokenRecord};

/// Client for the protected CloudPrinter API.
pub struct CloudPrinterClient<
    T: HttpTransport = ReqwestHttpTransport,
    S: SessionStore = InMemorySessionStore,
> {
    transport: Arc<T>,
    manager: Arc<TokenLifecycleManager<T, S>>,
    logger: Arc<dyn Logger>,
}

impl CloudPrinterClient<ReqwestHttpTransport, InMemorySessionStore> {
    /// Create a client with the reqwest transport, an in-memory session
    /// store, and `tracing` logging.
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::with_options(
            config.timeout,
            MAX_RESPONSE_SIZE,
        )?);
        Ok(Self::with_components(
            config,
            transport,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(TracingLogger::new()),
        ))
    }
}

impl<T: HttpTransport, S: SessionStore> CloudPrinterClient<T, S> {
    /// Create a client with custom implementations.
    pub fn with_components(
        config: AuthConfig,
        transport: Arc<T>,
        store: Arc<S>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let manager = Arc::new(TokenLifecycleManager::new(
            config,
            transport.clone(),
            store,
            logger.clone(),
        ));
        Self {
            transport,
            manager,
            logger,
        }
    }

    /// Token lifecycle manager behind this client.
    pub fn manager(&self) -> &Arc<TokenLifecycleManager<T, S>> {
        &self.manager
    }

    /// Sanitized session view for a principal.
    pub async fn session(&self, principal: &str) -> AuthResult<SessionView> {
        self.manager.session(principal).await
    }

    /// Send `request` with the principal's bearer token.
    ///
    /// No upstream call is made when no valid token can be obtained. A 401
    /// from the upstream triggers exactly one refresh and one retry; a second
    /// 401 is reported as [`AuthError::AuthenticationFailed`].
    pub async fn authorized_request(
        &self,
        principal: &str,
        request: HttpRequest,
    ) -> AuthResult<HttpResponse> {
        let record = self.manager.valid_token(principal).await?;

        let response = self.send_with_token(principal, &request, &record).await?;
        if response.status != 401 {
            return Ok(response);
        }

        self.logger.warn(
            "Upstream rejected access token, refreshing once",
            &AuthLogContext::for_principal(principal, "authorized_request")
                .extra("url", &request.url),
        );

        let refreshed = self
            .manager
            .force_refresh(principal, &record.access_token)
            .await?;

        let response = self.send_with_token(principal, &request, &refreshed).await?;
        if response.status == 401 {
            self.logger.error(
                "Upstream rejected refreshed access token",
                &AuthLogContext::for_principal(principal, "authorized_request")
                    .extra("url", &request.url),
            );
            return Err(AuthError::AuthenticationFailed);
        }

        Ok(response)
    }

    /// GET an API path relative to the configured base URL.
    pub async fn get(&self, principal: &str, path: &str) -> AuthResult<HttpResponse> {
        let url = self.manager.config().provider.resource_url(path);
        self.authorized_request(principal, HttpRequest::get(url)).await
    }

    /// GET an API path and decode its JSON body.
    pub async fn get_json<R: DeserializeOwned>(&self, principal: &str, path: &str) -> AuthResult<R> {
        let response = self.get(principal, path).await?;
        handle_response(response)
    }

    async fn send_with_token(
        &self,
        principal: &str,
        request: &HttpRequest,
        record: &TokenRecord,
    ) -> AuthResult<HttpResponse> {
        let mut outgoing = request.clone();
        outgoing
            .headers
            .entry("accept".to_string())
            .or_insert_with(|| "application/json".to_string());
        outgoing
            .headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        outgoing
            .headers
            .insert("authorization".to_string(), record.authorization_header());
        if outgoing.timeout.is_none() {
            outgoing.timeout = Some(self.manager.config().timeout);
        }

        let started = Instant::now();
        let result = self.transport.send(outgoing).await;
        let context = AuthLogContext::for_principal(principal, "authorized_request")
            .extra("method", request.method.as_str())
            .extra("url", &request.url)
            .extra("duration_ms", started.elapsed().as_millis());

        match &result {
            Ok(response) if response.status >= 400 => self
                .logger
                .warn("Upstream request failed", &context.extra("status", response.status)),
            Ok(response) => self
                .logger
                .debug("Upstream request completed", &context.extra("status", response.status)),
            Err(e) => self
                .logger
                .error("Upstream request errored", &context.extra("error", e)),
        }

        result
    }
}

/// Decode a successful upstream response, or turn a failed one into
/// [`AuthError::UpstreamError`] carrying its status and body.
pub fn handle_response<R: DeserializeOwned>(response: HttpResponse) -> AuthResult<R> {
    if !response.is_success() {
        return Err(AuthError::UpstreamError {
            status: response.status,
            details: response.body,
        });
    }

    Ok(response.parse_json()?)
}
