//! Notification boundary (templated email side channel).
//!
//! Notifications are fire-and-forget from the core's perspective: a failed
//! send is logged and reported on its own channel, and never escalates into
//! the state transition it accompanies.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

/// A templated message handed to the external email service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub template: &'static str,
    pub recipient: String,
    pub params: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(template: &'static str, recipient: impl Into<String>) -> Self {
        Self {
            template,
            recipient: recipient.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotifyOutcome {
    Sent,
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }
}

/// External notification service boundary.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> NotifyOutcome;
}

/// Test double that records everything it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> NotifyOutcome {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
        NotifyOutcome::Sent
    }
}

/// Test double whose every send fails.
#[derive(Debug, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _notification: Notification) -> NotifyOutcome {
        NotifyOutcome::Failed("smtp relay unavailable".to_string())
    }
}
