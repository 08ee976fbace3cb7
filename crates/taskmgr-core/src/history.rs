//! Linear undo/redo over whole-value snapshots.
//!
//! Recording a new value after an undo discards the redo branch. The past
//! is bounded; the oldest entry is evicted first once `capacity` is hit.

use std::collections::VecDeque;

use super::error::TaskError;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    cap: usize,
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,
}

impl<T: Clone> History<T> {
    pub fn new(present: T, cap: usize) -> Self {
        Self {
            cap,
            past: VecDeque::with_capacity(cap.min(64)),
            present,
            future: VecDeque::new(),
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn record(&mut self, next: T) {
        let prior = std::mem::replace(&mut self.present, next);
        if self.cap > 0 {
            if self.past.len() == self.cap {
                self.past.pop_front();
            }
            self.past.push_back(prior);
        }
        self.future.clear();
    }

    pub fn undo(&mut self) -> Result<&T, TaskError> {
        let previous = self.past.pop_back().ok_or(TaskError::NothingToUndo)?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        Ok(&self.present)
    }

    pub fn redo(&mut self) -> Result<&T, TaskError> {
        let next = self.future.pop_front().ok_or(TaskError::NothingToRedo)?;
        let current = std::mem::replace(&mut self.present, next);
        if self.cap > 0 {
            if self.past.len() == self.cap {
                self.past.pop_front();
            }
            self.past.push_back(current);
        }
        Ok(&self.present)
    }

    /// Drops all history and starts over from `present`.
    pub fn reset(&mut self, present: T) {
        self.past.clear();
        self.future.clear();
        self.present = present;
    }
}
