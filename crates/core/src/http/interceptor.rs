//! Request lifecycle interceptor
//!
//! Runs before every outgoing request: a best-effort refresh, then the
//! current token is attached. The request is always forwarded, even when
//! the refresh failed; the 401 recovery path is the authoritative fix.

use std::sync::Arc;

use ecm_common::observability::log_recovery_event;
use ecm_domain::RequestDescriptor;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::TokenRefreshCoordinator;

/// Pre-flight token refresh and last-dispatched tracking
pub struct RequestLifecycleInterceptor {
    coordinator: Arc<TokenRefreshCoordinator>,
    last_dispatched: Mutex<Option<RequestDescriptor>>,
}

impl RequestLifecycleInterceptor {
    /// Interceptor refreshing through `coordinator`
    pub fn new(coordinator: Arc<TokenRefreshCoordinator>) -> Self {
        Self { coordinator, last_dispatched: Mutex::new(None) }
    }

    /// Refresh if possible and attach the current bearer token
    pub async fn prepare(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if let Err(err) = self.coordinator.refresh().await {
            warn!(
                method = request.method.as_str(),
                url = %request.url,
                error = %err,
                "pre-flight token refresh failed, continuing with current token"
            );
            log_recovery_event(
                "api.request.refresh.failed",
                json!({
                    "method": request.method.as_str(),
                    "url": request.url,
                    "status": err.status,
                    "code": err.code,
                    "message": err.message,
                }),
            );
        }

        if let Some(token) = self.coordinator.current_token() {
            request.set_bearer(&token);
        } else {
            debug!(url = %request.url, "no token available, sending unauthenticated");
        }
        request
    }

    /// Remember `request` as the most recently dispatched attempt
    pub fn record_dispatch(&self, request: &RequestDescriptor) {
        *self.last_dispatched.lock() = Some(request.clone());
    }

    /// Most recently dispatched attempt, if any
    pub fn last_dispatched(&self) -> Option<RequestDescriptor> {
        self.last_dispatched.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RefreshError;
    use crate::testing::MockIdentityClient;

    fn interceptor(identity: MockIdentityClient) -> (Arc<MockIdentityClient>, RequestLifecycleInterceptor) {
        let identity = Arc::new(identity);
        let coordinator = Arc::new(TokenRefreshCoordinator::new(identity.clone()));
        (identity, RequestLifecycleInterceptor::new(coordinator))
    }

    #[tokio::test]
    async fn attaches_refreshed_token() {
        let (_, interceptor) =
            interceptor(MockIdentityClient::new().with_refresh_result(Ok(Some("fresh".into()))));

        let prepared = interceptor.prepare(RequestDescriptor::get("/documents")).await;
        assert_eq!(prepared.authorization(), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn transient_refresh_failure_keeps_current_token() {
        let (identity, interceptor) = interceptor(
            MockIdentityClient::new()
                .with_token("still-valid-token")
                .with_refresh_result(Err(RefreshError::network("Network Error"))),
        );

        let prepared = interceptor.prepare(RequestDescriptor::get("/search")).await;

        assert_eq!(identity.refresh_calls(), 1);
        assert_eq!(prepared.authorization(), Some("Bearer still-valid-token"));
    }

    #[tokio::test]
    async fn forwards_without_token() {
        let (_, interceptor) = interceptor(MockIdentityClient::new());
        let prepared = interceptor.prepare(RequestDescriptor::get("/public")).await;
        assert_eq!(prepared.authorization(), None);
    }

    #[test]
    fn records_last_dispatched() {
        let (_, interceptor) = interceptor(MockIdentityClient::new());
        assert!(interceptor.last_dispatched().is_none());

        interceptor.record_dispatch(&RequestDescriptor::get("/a"));
        interceptor.record_dispatch(&RequestDescriptor::get("/b"));
        assert_eq!(interceptor.last_dispatched().map(|r| r.url), Some("/b".to_string()));
    }
}
