//! Navigator adapter for hosts without a router
//!
//! Tracks the current path and publishes each redirect on a watch channel.
//! A host UI loop subscribes and performs the actual screen change.

use ecm_core::ports::Navigator;
use ecm_domain::Result;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::info;
use url::form_urlencoded;

/// Redirect issued through the navigator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Redirect {
    /// Path with its url-encoded query string
    pub fn location(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{query}", self.path)
    }
}

/// Navigator that tracks the current path and records redirects
pub struct RecordingNavigator {
    current: RwLock<String>,
    history: Mutex<Vec<Redirect>>,
    latest: watch::Sender<Option<Redirect>>,
}

impl RecordingNavigator {
    /// Navigator starting at `initial_path`
    pub fn new(initial_path: impl Into<String>) -> Self {
        let (latest, _) = watch::channel(None);
        Self { current: RwLock::new(initial_path.into()), history: Mutex::new(Vec::new()), latest }
    }

    /// Receiver that observes every redirect after subscription
    pub fn subscribe(&self) -> watch::Receiver<Option<Redirect>> {
        self.latest.subscribe()
    }

    /// Record a navigation the host performed on its own
    pub fn set_current_path(&self, path: impl Into<String>) {
        *self.current.write() = path.into();
    }

    /// Redirects in the order they happened
    pub fn history(&self) -> Vec<Redirect> {
        self.history.lock().clone()
    }
}

impl Default for RecordingNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to(&self, path: &str, params: &[(&str, &str)]) -> Result<()> {
        let redirect = Redirect {
            path: path.to_string(),
            query: params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        };
        info!(location = %redirect.location(), "redirecting");

        self.set_current_path(path);
        self.history.lock().push(redirect.clone());
        self.latest.send_replace(Some(redirect));
        Ok(())
    }

    fn current_path(&self) -> String {
        self.current.read().clone()
    }
}
