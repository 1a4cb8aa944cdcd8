use std::collections::VecDeque;

pub const HISTORY_CAPACITY: usize = 10;

/// Bounded record of played playlist indices, most recent at the back.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<usize>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, index: usize) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(index);
    }

    /// Steps back one track in play order.
    ///
    /// The last entry belongs to the track that is playing now, so it is dropped
    /// before the previous one is taken. An exhausted ring falls back to index 0.
    pub fn recall_and_pop(&mut self) -> usize {
        self.entries.pop_back();
        if self.entries.is_empty() {
            self.entries.push_back(0);
        }
        self.entries.pop_back().unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<usize> {
        self.entries.iter().copied().collect()
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
