//! Notifier adapter
//!
//! Notices are logged through `tracing` and, when a channel is attached,
//! forwarded to whatever surface renders them.

use ecm_core::ports::Notifier;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Notifier that logs notices through tracing
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    sink: Option<UnboundedSender<String>>,
}

impl TracingNotifier {
    /// Log-only notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that also forwards every notice to the returned receiver
    pub fn with_channel() -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sink: Some(sender) }, receiver)
    }
}

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!(target: "ecm::notice", notice = message, "user notice");
        if let Some(sink) = &self.sink {
            // receiver dropped means nobody renders notices any more
            let _ = sink.send(message.to_string());
        }
    }
}
