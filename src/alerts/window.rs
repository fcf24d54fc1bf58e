//! Rolling window of request outcomes

use std::collections::VecDeque;

/// Fixed-capacity ring of "had upstream 5xx" flags, oldest first
#[derive(Debug, Clone)]
pub struct OutcomeWindow {
    capacity: usize,
    entries: VecDeque<bool>,
    errors: usize,
}

impl OutcomeWindow {
    /// Create an empty window. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            errors: 0,
        }
    }

    /// Append an outcome, evicting the oldest one when full
    pub fn push(&mut self, had_error: bool) {
        if self.entries.len() == self.capacity {
            if let Some(true) = self.entries.pop_front() {
                self.errors -= 1;
            }
        }
        self.entries.push_back(had_error);
        if had_error {
            self.errors += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries flagged as errors
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Error percentage over the current contents, `None` when empty
    pub fn error_rate(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.errors as f64 / self.entries.len() as f64 * 100.0)
    }

    /// Iterate outcomes from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.entries.iter().copied()
    }
}
