//! Bounded in-memory record buffer.

/// Accumulates records until it reaches its capacity.
///
/// The buffer never grows past `capacity`; the owner is expected to drain
/// it with [`RecordBuffer::take`] as soon as [`RecordBuffer::push`]
/// reports it full.
#[derive(Debug, Clone)]
pub struct RecordBuffer<T> {
    records: Vec<T>,
    capacity: usize,
}

impl<T> RecordBuffer<T> {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record. Returns `true` when the buffer is now full.
    pub fn push(&mut self, record: T) -> bool {
        self.records.push(record);
        self.is_full()
    }

    /// Remove and return every buffered record, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.capacity))
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the buffer has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Maximum number of records held before a flush.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_full_at_capacity() {
        let mut buffer = RecordBuffer::new(3);
        assert!(!buffer.push(1));
        assert!(!buffer.push(2));
        assert!(buffer.push(3));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn take_drains_in_order() {
        let mut buffer = RecordBuffer::new(4);
        let _ = buffer.push("a");
        let _ = buffer.push("b");
        assert_eq!(buffer.take(), vec!["a", "b"]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn zero_capacity_flushes_every_record() {
        let mut buffer = RecordBuffer::new(0);
        assert!(buffer.push(()));
        assert_eq!(buffer.capacity(), 1);
    }
}
