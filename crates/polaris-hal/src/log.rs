//! Engine log sink.
//!
//! Info and warning messages go straight to `tracing`. Errors are kept in a
//! bounded ring the host can inspect and are only echoed at debug level.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct ErrorRing {
    entries: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl ErrorRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Record a message, evicting the oldest one when full.
    pub fn push(&mut self, message: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(message.to_string());
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_evicts_oldest() {
        let mut ring = ErrorRing::new(2);
        ring.push("a");
        ring.push("b");
        ring.push("c");
        assert_eq!(ring.entries().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(ring.dropped(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut ring = ErrorRing::new(0);
        ring.push("x");
        assert_eq!(ring.len(), 1);
    }
}
