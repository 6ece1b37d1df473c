//! Fixed-capacity ring buffer of records awaiting activation

use super::log_record::LogRecord;
use std::collections::VecDeque;

/// Default number of records retained before activation
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Holds the most recent `capacity` records in arrival order.
///
/// Once full, each new record evicts the oldest one. The buffer is not
/// synchronized on its own; the dispatcher keeps it behind its state lock.
#[derive(Debug)]
pub struct RingBuffer {
    records: VecDeque<LogRecord>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity,
        }
    }

    /// Append a record, returning the evicted record if the buffer was full
    pub fn record(&mut self, entry: LogRecord) -> Option<LogRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(entry);
        evicted
    }

    /// Take every buffered record, oldest first, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<LogRecord> {
        self.records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
