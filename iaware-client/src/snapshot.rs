use std::sync::Arc;

use crate::ring_buffer::Shared;

/// A point-in-time copy of the sample window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Total samples per channel written when the copy was taken.
    pub cursor: u64,
    /// Window length the samples were taken from.
    pub capacity: usize,
    /// One sequence per channel, oldest first, each `filled_count()` long.
    pub samples: Vec<Vec<f32>>,
}

impl Snapshot {
    /// An empty result for when no data is available.
    pub fn not_ready(channels: usize, capacity: usize) -> Self {
        Self {
            cursor: 0,
            capacity,
            samples: vec![Vec::new(); channels],
        }
    }

    pub fn filled_count(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn is_ready(&self) -> bool {
        self.filled_count() > 0
    }

    /// Whether the window has wrapped at least once.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.filled_count() == self.capacity
    }
}

/// Read-only, cloneable view of a [`RingBuffer`](crate::RingBuffer) for
/// display code running at its own cadence. Never touches the network.
#[derive(Clone)]
pub struct SnapshotReader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("channels", &self.shared.channels())
            .field("capacity", &self.shared.capacity())
            .field("cursor", &self.shared.cursor())
            .finish()
    }
}

impl SnapshotReader {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Current window as `(cursor, samples[channel][sample])`.
    ///
    /// Returns a not-ready snapshot (`filled_count() == 0`) when nothing has
    /// arrived yet or no connection is feeding the window.
    pub fn get_raw_data(&self) -> Snapshot {
        if !self.shared.is_live() {
            return Snapshot::not_ready(self.shared.channels(), self.shared.capacity());
        }
        self.shared.snapshot()
    }

    pub fn channels(&self) -> usize {
        self.shared.channels()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn filled_count(&self) -> usize {
        if self.shared.is_live() {
            self.shared.filled_count()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::RingBuffer;

    #[test]
    fn test_not_ready_before_data() {
        let ring = RingBuffer::new(3, 16);
        let snapshot = ring.reader().get_raw_data();

        assert!(!snapshot.is_ready());
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(snapshot.samples.len(), 3);
        assert_eq!(snapshot.capacity, 16);
    }

    #[test]
    fn test_not_ready_while_offline() {
        let mut ring = RingBuffer::new(1, 4);
        let reader = ring.reader();
        ring.write(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(reader.filled_count(), 2);

        ring.set_live(false);
        assert!(!reader.get_raw_data().is_ready());
        assert_eq!(reader.filled_count(), 0);

        ring.set_live(true);
        assert_eq!(reader.get_raw_data().samples, vec![vec![1.0, 2.0]]);
    }
}
