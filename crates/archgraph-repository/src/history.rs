//! Undo/redo history of repository snapshots

use crate::snapshot::Snapshot;
use std::collections::VecDeque;

/// Default number of undo steps retained
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Bounded undo stack plus redo stack
///
/// Recording a new state clears the redo stack. When the undo stack is
/// full the oldest snapshot is dropped.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    depth: usize,
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl HistoryStack {
    /// Stack retaining at most `depth` undo steps (minimum 1)
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    /// Record the state preceding a mutation
    pub fn record(&mut self, before: Snapshot) {
        if self.undo.len() == self.depth {
            self.undo.pop_front();
        }
        self.undo.push_back(before);
        self.redo.clear();
    }

    /// Step back: returns the state to restore and parks `current` for redo
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward: returns the state to restore and parks `current` for undo
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        if self.undo.len() == self.depth {
            self.undo.pop_front();
        }
        self.undo.push_back(current);
        Some(next)
    }

    /// Whether an undo step is available
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo step is available
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
