use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use iaware_client::{RingBuffer, Snapshot};

const CHANNELS: usize = 3;
const CAPACITY: usize = 512;
const BLOCKS: u32 = 20_000;
const READERS: usize = 4;

/// Every channel of row `i` holds `i`, so a torn row shows up as unequal
/// channel values and a stale row as a gap in the sequence.
fn check(snapshot: &Snapshot) {
    let filled = snapshot.filled_count();
    assert!(filled <= CAPACITY);
    assert_eq!(filled as u64, snapshot.cursor.min(CAPACITY as u64));

    let first = snapshot.cursor - filled as u64;
    for i in 0..filled {
        let expected = (first + i as u64) as f32;
        for channel in &snapshot.samples {
            assert_eq!(channel[i], expected, "row {i} of {snapshot:?}");
        }
    }
}

#[test]
fn test_readers_never_see_torn_rows() {
    let mut ring = RingBuffer::new(CHANNELS, CAPACITY);
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let reader = ring.reader();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    check(&reader.get_raw_data());
                }
            })
        })
        .collect();

    let mut next = 0u32;
    for block in 0..BLOCKS {
        let rows = 1 + block % 5;
        let row_ids: Vec<f32> = (next..next + rows).map(|i| i as f32).collect();
        ring.write(&vec![row_ids; CHANNELS]).unwrap();
        next += rows;

        if block % 16 == 0 {
            thread::yield_now();
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().expect("Reader thread should not panic");
    }

    let last = ring.snapshot();
    check(&last);
    assert_eq!(last.cursor, u64::from(next));
    assert!(last.is_full());
}
