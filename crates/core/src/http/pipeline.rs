//! Resilient request pipeline
//!
//! `execute` = interceptor pre-flight, then `dispatch`. Dispatch records the
//! attempt, sends it and hands failures to the recovery state machine.
//! Retries re-enter `dispatch` directly: they carry the token chosen by the
//! recovery path and skip the pre-flight refresh.

use std::sync::Arc;

use ecm_domain::{ErrorEnvelope, RequestDescriptor};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, instrument};

use super::interceptor::RequestLifecycleInterceptor;
use super::recovery::{Attempt, RecoveryState, ResponseRecoveryStateMachine};
use crate::auth::TokenRefreshCoordinator;
use crate::ports::{IdentityClient, Navigator, Notifier, SessionStore, Transport};
use crate::session::{RedirectFailurePolicy, SessionExpirationGuard, SessionMarkers};

/// Request pipeline wired from its ports
pub struct ResilientPipeline {
    transport: Arc<dyn Transport>,
    coordinator: Arc<TokenRefreshCoordinator>,
    interceptor: RequestLifecycleInterceptor,
    recovery: ResponseRecoveryStateMachine,
    guard: Arc<SessionExpirationGuard>,
}

impl ResilientPipeline {
    /// Pipeline over already built collaborators
    pub fn new(
        transport: Arc<dyn Transport>,
        coordinator: Arc<TokenRefreshCoordinator>,
        guard: Arc<SessionExpirationGuard>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let interceptor = RequestLifecycleInterceptor::new(Arc::clone(&coordinator));
        let recovery =
            ResponseRecoveryStateMachine::new(Arc::clone(&coordinator), Arc::clone(&guard), notifier);
        Self { transport, coordinator, interceptor, recovery, guard }
    }

    /// Start building a pipeline
    pub fn builder() -> ResilientPipelineBuilder {
        ResilientPipelineBuilder::default()
    }

    /// Run one logical request through pre-flight, dispatch and recovery
    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %request.url))]
    pub async fn execute(&self, request: RequestDescriptor) -> Attempt {
        if request.is_cancelled() {
            return Err(ErrorEnvelope::cancelled().with_request(request));
        }
        let prepared = self.interceptor.prepare(request).await;
        self.dispatch(prepared).await
    }

    fn dispatch(&self, request: RequestDescriptor) -> BoxFuture<'_, Attempt> {
        async move {
            self.interceptor.record_dispatch(&request);
            debug!(
                attempt = %request.id,
                operation = %request.operation,
                retry_auth = request.retry.retried_for_auth,
                retry_timeout = request.retry.retried_for_timeout,
                state = ?RecoveryState::Sent,
                "dispatching request"
            );

            let outcome = self.transport.send(&request).await;
            let state = RecoveryState::of_attempt(&outcome);
            debug!(attempt = %request.id, ?state, "attempt settled");

            match outcome {
                Ok(response) => {
                    self.guard.on_request_succeeded();
                    Ok(response)
                }
                Err(error) => {
                    let last = self.interceptor.last_dispatched();
                    self.recovery.recover(error, last, |retry| self.dispatch(retry)).await
                }
            }
        }
        .boxed()
    }

    /// Shared refresh coordinator
    pub fn coordinator(&self) -> &Arc<TokenRefreshCoordinator> {
        &self.coordinator
    }

    /// Session expiry guard
    pub fn guard(&self) -> &Arc<SessionExpirationGuard> {
        &self.guard
    }

    /// Most recently dispatched attempt
    pub fn last_dispatched(&self) -> Option<RequestDescriptor> {
        self.interceptor.last_dispatched()
    }
}

/// Builder for [`ResilientPipeline`]
#[derive(Default)]
pub struct ResilientPipelineBuilder {
    transport: Option<Arc<dyn Transport>>,
    identity: Option<Arc<dyn IdentityClient>>,
    store: Option<Arc<dyn SessionStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
    login_path: Option<String>,
    redirect_policy: Option<RedirectFailurePolicy>,
}

impl ResilientPipelineBuilder {
    /// Transport that sends attempts
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Identity client behind the refresh coordinator
    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityClient>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Store holding the session markers
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Navigator used for the login redirect
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Notifier for user-facing notices
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Login surface path; defaults to `/login`
    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Back-off applied to failed login redirects
    #[must_use]
    pub fn redirect_policy(mut self, policy: RedirectFailurePolicy) -> Self {
        self.redirect_policy = Some(policy);
        self
    }

    /// Assemble the pipeline
    ///
    /// Returns the name of the first missing port as an error.
    pub fn build(self) -> ecm_domain::Result<ResilientPipeline> {
        let missing = |name: &str| ecm_domain::EcmError::Config(format!("pipeline requires a {name}"));

        let transport = self.transport.ok_or_else(|| missing("transport"))?;
        let identity = self.identity.ok_or_else(|| missing("identity client"))?;
        let store = self.store.ok_or_else(|| missing("session store"))?;
        let navigator = self.navigator.ok_or_else(|| missing("navigator"))?;
        let notifier = self.notifier.ok_or_else(|| missing("notifier"))?;

        let mut markers = SessionMarkers::new(store);
        if let Some(policy) = self.redirect_policy {
            markers = markers.with_redirect_policy(policy);
        }
        let mut guard = SessionExpirationGuard::new(markers, navigator, Arc::clone(&notifier));
        if let Some(path) = self.login_path {
            guard = guard.with_login_path(path);
        }

        let coordinator = Arc::new(TokenRefreshCoordinator::new(identity));
        Ok(ResilientPipeline::new(transport, coordinator, Arc::new(guard), notifier))
    }
}
