// Tracing feedback adapter - Host feedback surfaced as structured log events

use std::sync::Mutex;

use tracing::{debug, error, warn};

use crate::domain::errors::*;
use crate::domain::model::DraftId;
use crate::domain::rules::SnapTarget;
use crate::ports::*;

/// Feedback adapter for headless hosts: snaps are debug events, advisories
/// warnings, and persistence failures errors.
pub struct TracingFeedbackAdapter;

impl TracingFeedbackAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingFeedbackAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackPort for TracingFeedbackAdapter {
    fn snapped(&self, at_s: f64, target: SnapTarget) {
        debug!(at_s, target = ?target, "Snapped");
    }

    fn advisory(&self, message: &str) {
        warn!(message, "Advisory");
    }

    fn persistence_failed(&self, draft_id: &DraftId, err: &DomainError) {
        error!(draft_id = %draft_id, error = %err, "Draft could not be saved");
    }
}

/// One recorded feedback event
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    Snapped { at_s: f64, target: SnapTarget },
    Advisory(String),
    PersistenceFailed { draft_id: DraftId, error: String },
}

/// Feedback adapter that keeps every event, for hosts that render their own
/// notices after a batch of operations (and for tests).
#[derive(Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event so far
    pub fn events(&self) -> Vec<FeedbackEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Advisory messages so far
    pub fn advisories(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FeedbackEvent::Advisory(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: FeedbackEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl FeedbackPort for RecordingFeedback {
    fn snapped(&self, at_s: f64, target: SnapTarget) {
        self.push(FeedbackEvent::Snapped { at_s, target });
    }

    fn advisory(&self, message: &str) {
        self.push(FeedbackEvent::Advisory(message.to_string()));
    }

    fn persistence_failed(&self, draft_id: &DraftId, err: &DomainError) {
        self.push(FeedbackEvent::PersistenceFailed {
            draft_id: draft_id.clone(),
            error: err.to_string(),
        });
    }
}
