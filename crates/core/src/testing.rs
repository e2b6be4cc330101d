//! Mock ports for tests
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to adapter crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecm_domain::{
    Credentials, EcmError, ErrorEnvelope, HttpResponse, RequestDescriptor, Result, TokenClaims,
};
use parking_lot::Mutex;

use crate::auth::{RefreshError, RefreshOutcome};
use crate::ports::{IdentityClient, Navigator, Notifier, Transport};

/// Identity client with scripted refresh outcomes
///
/// Each refresh pops the next scripted outcome (default `Ok(None)`). A
/// successful outcome carrying a token becomes the current token.
#[derive(Default)]
pub struct MockIdentityClient {
    token: Mutex<Option<String>>,
    results: Mutex<VecDeque<RefreshOutcome>>,
    delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    logins: Mutex<Vec<String>>,
    logouts: AtomicUsize,
}

impl MockIdentityClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock() = Some(token.to_string());
        self
    }

    #[must_use]
    pub fn with_refresh_result(self, result: RefreshOutcome) -> Self {
        self.results.lock().push_back(result);
        self
    }

    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_token(&self, token: Option<&str>) {
        *self.token.lock() = token.map(str::to_string);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().clone()
    }

    pub fn logout_calls(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityClient for MockIdentityClient {
    async fn refresh(&self) -> std::result::Result<Option<String>, RefreshError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.results.lock().pop_front().unwrap_or(Ok(None));
        if let Ok(Some(token)) = &outcome {
            *self.token.lock() = Some(token.clone());
        }
        outcome
    }

    fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn claims(&self) -> Option<TokenClaims> {
        self.token().and_then(|token| TokenClaims::decode(&token).ok())
    }

    async fn login(&self, credentials: &Credentials) -> Result<()> {
        if credentials.password.is_empty() {
            return Err(EcmError::Auth("missing password".into()));
        }
        self.logins.lock().push(credentials.username.clone());
        *self.token.lock() = Some(format!("token-for-{}", credentials.username));
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        *self.token.lock() = None;
        Ok(())
    }
}

type Handler =
    Box<dyn Fn(&RequestDescriptor) -> std::result::Result<HttpResponse, ErrorEnvelope> + Send + Sync>;

/// Transport that answers from a script, then from a fallback handler
///
/// Every sent descriptor is recorded. Scripted failures get the sent
/// descriptor attached unless [`MockTransport::push_detached`] was used.
pub struct MockTransport {
    script: Mutex<VecDeque<(std::result::Result<HttpResponse, ErrorEnvelope>, bool)>>,
    fallback: Handler,
    delay: Option<Duration>,
    sent: Mutex<Vec<RequestDescriptor>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Transport answering `200 {}` once the script is exhausted
    pub fn new() -> Self {
        Self::with_handler(|_| Ok(HttpResponse::new(200, b"{}".to_vec())))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> std::result::Result<HttpResponse, ErrorEnvelope>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Box::new(handler),
            delay: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the outcome of the next send
    pub fn push(&self, outcome: std::result::Result<HttpResponse, ErrorEnvelope>) {
        self.script.lock().push_back((outcome, true));
    }

    /// Queue a failure whose envelope lost its descriptor
    pub fn push_detached(&self, error: ErrorEnvelope) {
        self.script.lock().push_back((Err(error), false));
    }

    pub fn sent(&self) -> Vec<RequestDescriptor> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
    ) -> std::result::Result<HttpResponse, ErrorEnvelope> {
        self.sent.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if request.is_cancelled() {
            return Err(ErrorEnvelope::cancelled().with_request(request.clone()));
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some((Err(error), true)) => Err(error.with_request(request.clone())),
            Some((outcome, _)) => outcome,
            None => (self.fallback)(request).map_err(|error| error.with_request(request.clone())),
        }
    }
}

/// Navigator that records redirects
pub struct MockNavigator {
    path: Mutex<String>,
    redirects: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl MockNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            redirects: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Navigator whose redirects always fail
    pub fn failing_at(path: &str) -> Self {
        Self { fail: true, ..Self::at(path) }
    }

    /// Redirect targets rendered as `path?key=value`
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }

    /// Redirect calls including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Navigator for MockNavigator {
    fn redirect_to(&self, path: &str, params: &[(&str, &str)]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EcmError::Internal("navigation blocked".into()));
        }
        let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let target =
            if query.is_empty() { path.to_string() } else { format!("{path}?{}", query.join("&")) };
        self.redirects.lock().push(target);
        *self.path.lock() = path.to_string();
        Ok(())
    }

    fn current_path(&self) -> String {
        self.path.lock().clone()
    }
}

/// Notifier that records messages
#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<String>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn count_of(&self, message: &str) -> usize {
        self.messages.lock().iter().filter(|m| m.as_str() == message).count()
    }
}

impl Notifier for MockNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Shared handles to every mock, for assertions after wiring
pub struct MockPorts {
    pub identity: Arc<MockIdentityClient>,
    pub transport: Arc<MockTransport>,
    pub navigator: Arc<MockNavigator>,
    pub notifier: Arc<MockNotifier>,
}

impl MockPorts {
    pub fn new(identity: MockIdentityClient, transport: MockTransport, path: &str) -> Self {
        Self {
            identity: Arc::new(identity),
            transport: Arc::new(transport),
            navigator: Arc::new(MockNavigator::at(path)),
            notifier: Arc::new(MockNotifier::new()),
        }
    }
}
