//! Snapshot-based undo/redo history for the timeline editor

use std::collections::VecDeque;

use crate::domain::model::{Draft, DraftDelta};

/// Undo entries kept unless configured otherwise
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Two stacks of full draft snapshots.
///
/// The undo stack holds states *before* each mutation; recording a new
/// mutation forks the timeline and clears the redo stack. Never persisted.
pub struct HistoryManager {
    undo_stack: VecDeque<DraftDelta>,
    redo_stack: Vec<DraftDelta>,
    max_entries: usize,
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record the pre-mutation state of an operation described by `delta`
    pub fn record(&mut self, delta: DraftDelta) {
        self.redo_stack.clear();
        self.undo_stack.push_back(delta);
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
        tracing::debug!(
            undo_depth = self.undo_stack.len(),
            "History entry recorded"
        );
    }

    /// Step back: `current` moves onto the redo stack and the previous
    /// snapshot is returned for restoring.
    pub fn undo(&mut self, current: &Draft) -> Option<DraftDelta> {
        let entry = self.undo_stack.pop_back()?;
        self.redo_stack
            .push(DraftDelta::capture(entry.description.clone(), current));
        tracing::debug!(
            label = %entry.description,
            undo_remaining = self.undo_stack.len(),
            "Undo"
        );
        Some(entry)
    }

    /// Step forward again: `current` moves back onto the undo stack without
    /// clearing the redo stack.
    pub fn redo(&mut self, current: &Draft) -> Option<DraftDelta> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack
            .push_back(DraftDelta::capture(entry.description.clone(), current));
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.pop_front();
        }
        tracing::debug!(
            label = %entry.description,
            redo_remaining = self.redo_stack.len(),
            "Redo"
        );
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the operation the next undo would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|d| d.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}
