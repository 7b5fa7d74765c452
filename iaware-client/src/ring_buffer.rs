//! Fixed-capacity multi-channel sample window.
//!
//! Every slot carries a sequence stamp so a single writer never waits on
//! readers: the writer marks a slot odd, stores the row, then stamps it with
//! the row's logical index. Readers copy rows and keep them only if the stamp
//! was stable and matched the index they expected, retrying otherwise. A
//! reader can therefore never see a row mixing channels from two writes.
//!
//! The storage itself sits behind an `RwLock` that is only taken exclusively
//! by [`RingBuffer::reset`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering, fence};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SnapshotReader};

struct Slots {
    capacity: usize,
    /// Total rows ever written since the last reset (`W`).
    cursor: AtomicU64,
    /// Per slot: `2 * (index + 1)` once row `index` is stored, odd while writing.
    stamps: Box<[AtomicU64]>,
    /// `capacity * channels` sample bits, row-major.
    values: Box<[AtomicU32]>,
}

impl Slots {
    fn new(channels: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            cursor: AtomicU64::new(0),
            stamps: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            values: (0..capacity * channels).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn slot(&self, index: u64) -> usize {
        (index % self.capacity as u64) as usize
    }

    fn write_row(&self, index: u64, row: impl Iterator<Item = f32>, channels: usize) {
        let slot = self.slot(index);
        let stamp = &self.stamps[slot];

        stamp.store(2 * index + 1, Ordering::Relaxed);
        fence(Ordering::Release);
        for (value, cell) in row.zip(&self.values[slot * channels..(slot + 1) * channels]) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
        stamp.store(2 * index + 2, Ordering::Release);
    }

    /// Copy row `index` into `out`. Returns false if the slot no longer holds it.
    fn read_row(&self, index: u64, out: &mut [f32]) -> bool {
        let slot = self.slot(index);
        let stamp = &self.stamps[slot];
        let expected = 2 * index + 2;

        if stamp.load(Ordering::Acquire) != expected {
            return false;
        }
        let cells = &self.values[slot * out.len()..(slot + 1) * out.len()];
        for (value, cell) in out.iter_mut().zip(cells) {
            *value = f32::from_bits(cell.load(Ordering::Relaxed));
        }
        fence(Ordering::Acquire);
        stamp.load(Ordering::Relaxed) == expected
    }
}

pub(crate) struct Shared {
    channels: usize,
    slots: RwLock<Slots>,
    /// Cleared while no connection is feeding the window.
    live: AtomicBool,
}

impl Shared {
    fn slots(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots().capacity
    }

    pub(crate) fn cursor(&self) -> u64 {
        self.slots().cursor.load(Ordering::Acquire)
    }

    pub(crate) fn filled_count(&self) -> usize {
        let slots = self.slots();
        let cursor = slots.cursor.load(Ordering::Acquire);
        cursor.min(slots.capacity as u64) as usize
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let slots = self.slots();
        let mut row = vec![0.0; self.channels];
        let mut attempts = 0u32;

        loop {
            let cursor = slots.cursor.load(Ordering::Acquire);
            let filled = cursor.min(slots.capacity as u64);
            let mut samples: Vec<Vec<f32>> = (0..self.channels)
                .map(|_| Vec::with_capacity(filled as usize))
                .collect();

            let complete = (cursor - filled..cursor).all(|index| {
                if !slots.read_row(index, &mut row) {
                    return false;
                }
                for (channel, &value) in samples.iter_mut().zip(&row) {
                    channel.push(value);
                }
                true
            });

            if complete {
                if attempts > 0 {
                    trace!("Snapshot consistent after {attempts} retries");
                }
                return Snapshot {
                    cursor,
                    capacity: slots.capacity,
                    samples,
                };
            }
            attempts += 1;
            std::hint::spin_loop();
        }
    }
}

/// Writer handle for a sample window of `channels` x `capacity` samples.
///
/// Not `Clone`: there is exactly one writer. Any number of
/// [`SnapshotReader`]s can be handed out with [`RingBuffer::reader`].
pub struct RingBuffer {
    shared: Arc<Shared>,
}

impl RingBuffer {
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                channels,
                slots: RwLock::new(Slots::new(channels, capacity)),
                live: AtomicBool::new(true),
            }),
        }
    }

    /// Reattach a writer to the window behind `reader`.
    ///
    /// The caller must ensure no other writer for the same window is alive.
    pub(crate) fn attach(reader: &SnapshotReader) -> Self {
        Self {
            shared: Arc::clone(reader.shared()),
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.shared))
    }

    pub fn channels(&self) -> usize {
        self.shared.channels
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Total samples per channel written since the last reset.
    pub fn cursor(&self) -> u64 {
        self.shared.cursor()
    }

    /// `min(cursor, capacity)`: how much of the window holds real samples.
    pub fn filled_count(&self) -> usize {
        self.shared.filled_count()
    }

    /// Append one block of samples, one ordered sequence per channel.
    ///
    /// Every channel must supply the same number of samples. Each row of the
    /// block becomes visible to readers atomically; the cursor advances once
    /// the whole block is stored.
    pub fn write(&mut self, samples: &[Vec<f32>]) -> Result<()> {
        let channels = self.shared.channels;
        if samples.len() != channels {
            return Err(Error::ChannelMismatch(format!(
                "expected {channels} channels, got {}",
                samples.len()
            )));
        }
        let count = samples.first().map_or(0, Vec::len);
        if samples.iter().any(|channel| channel.len() != count) {
            return Err(Error::ChannelMismatch(
                "channels supplied unequal sample counts".into(),
            ));
        }
        if count == 0 {
            return Ok(());
        }

        let slots = self.shared.slots();
        let cursor = slots.cursor.load(Ordering::Relaxed);
        // Rows that this same block would overwrite are never stored.
        let first = count.saturating_sub(slots.capacity);
        for row in first..count {
            let values = samples.iter().map(|channel| channel[row]);
            slots.write_row(cursor + row as u64, values, channels);
        }
        slots.cursor.store(cursor + count as u64, Ordering::Release);
        Ok(())
    }

    /// Coherent copy of the current window, oldest sample first.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    /// Drop all samples, zero the cursor and resize to `capacity`.
    pub fn reset(&mut self, capacity: usize) {
        let mut slots = self
            .shared
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slots = Slots::new(self.shared.channels, capacity);
        debug!(
            "Ring reset to {} samples x {} channels",
            slots.capacity, self.shared.channels
        );
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.shared.live.store(live, Ordering::Release);
    }
}
