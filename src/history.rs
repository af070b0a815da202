//! Bounded undo/redo over whole-document snapshots.
//!
//! Snapshots are the storage; patches are only computed to describe what
//! an undo or redo step changes.

use crate::diff::compute_patch;
use crate::patch::{invert_patch, Patch};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<String>,
    present: String,
    future: Vec<String>,
    limit: usize,
}

impl History {
    /// Start a history at `initial`, keeping at most `limit` undo steps.
    pub fn new(initial: impl Into<String>, limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: initial.into(),
            future: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn present(&self) -> &str {
        &self.present
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Record a new present. Returns false when `next` equals the present.
    pub fn push(&mut self, next: impl Into<String>) -> bool {
        let next = next.into();
        if next == self.present {
            return false;
        }

        let previous = std::mem::replace(&mut self.present, next);
        self.past.push_back(previous);
        if self.past.len() > self.limit {
            self.past.pop_front();
        }
        self.future.clear();
        true
    }

    pub fn undo(&mut self) -> Option<&str> {
        let previous = self.past.pop_back()?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        Some(&self.present)
    }

    pub fn redo(&mut self) -> Option<&str> {
        let next = self.future.pop()?;
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        Some(&self.present)
    }

    /// Patch from the previous snapshot to the present, for display.
    pub fn last_change(&self) -> Option<Patch> {
        self.past
            .back()
            .map(|previous| compute_patch(previous, &self.present))
    }

    /// Patch that the next [`undo`](Self::undo) corresponds to, against the
    /// present text.
    pub fn undo_patch(&self) -> Option<Patch> {
        let previous = self.past.back()?;
        let forward = compute_patch(previous, &self.present);
        // Forward patches from compute_patch always validate against their base.
        invert_patch(previous, &forward).ok()
    }
}
