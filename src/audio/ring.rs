//! Single-producer / single-consumer ring channel.
//!
//! A thin wrapper over a `ringbuf` heap ring that adds the overrun policy:
//! when the channel is full the newest record is discarded and counted.
//! Neither side blocks or allocates after construction, so both ends are
//! safe to use from a real-time callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer as _, Observer, Producer as _, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Writing half. Not `Clone`: there is exactly one producer.
pub struct Producer<T> {
    inner: HeapProd<T>,
    dropped: Arc<AtomicU64>,
}

/// Reading half. Not `Clone`: there is exactly one consumer.
pub struct Consumer<T> {
    inner: HeapCons<T>,
    dropped: Arc<AtomicU64>,
}

/// Create a ring channel holding up to `capacity` records.
///
/// # Panics
/// Panics if `capacity` is 0.
pub fn channel<T: Copy + Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be > 0");
    let (prod, cons) = HeapRb::<T>::new(capacity).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        Producer {
            inner: prod,
            dropped: Arc::clone(&dropped),
        },
        Consumer {
            inner: cons,
            dropped,
        },
    )
}

impl<T: Copy> Producer<T> {
    /// Usable capacity in records
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Publish one record. Returns false (and counts an overrun) when full.
    pub fn push(&mut self, value: T) -> bool {
        if self.inner.try_push(value).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Publish as many records from `values` as fit; the rest are counted
    /// as dropped. Returns how many were written.
    pub fn push_slice(&mut self, values: &[T]) -> usize {
        let written = self.inner.push_slice(values);
        let rest = (values.len() - written) as u64;
        if rest > 0 {
            self.dropped.fetch_add(rest, Ordering::Relaxed);
        }
        written
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Copy> Consumer<T> {
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Records ready to read; never exceeds `capacity()`
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Take the oldest record, if any
    pub fn pop(&mut self) -> Option<T> {
        self.inner.try_pop()
    }

    /// Move up to `out.len()` records into `out`, oldest first.
    pub fn drain_into(&mut self, out: &mut [T]) -> usize {
        self.inner.pop_slice(out)
    }

    /// Overruns counted by the producer since construction
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = channel::<u32>(4);
        for i in 0..3 {
            assert!(tx.push(i));
        }
        assert_eq!(rx.pop(), Some(0));
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_overrun_drops_newest_and_counts() {
        let (mut tx, mut rx) = channel::<u32>(5);
        for i in 0..8 {
            tx.push(i);
        }
        assert_eq!(rx.available(), 5);
        assert_eq!(rx.dropped(), 3);
        let mut out = [0u32; 8];
        let n = rx.drain_into(&mut out);
        assert_eq!(&out[..n], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_push_slice_counts_remainder() {
        let (mut tx, rx) = channel::<f32>(4);
        assert_eq!(tx.push_slice(&[1.0; 10]), 4);
        assert_eq!(rx.dropped(), 6);
    }

    #[test]
    fn test_capacity_is_usable_slots() {
        let (tx, rx) = channel::<u8>(5);
        assert_eq!(tx.capacity(), 5);
        assert_eq!(rx.capacity(), 5);
    }

    #[test]
    fn test_wraparound() {
        let (mut tx, mut rx) = channel::<u32>(2);
        for i in 0..100 {
            assert!(tx.push(i));
            assert_eq!(rx.pop(), Some(i));
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_cross_thread_sequence_is_monotonic() {
        let (mut tx, mut rx) = channel::<u64>(5);
        let producer = thread::spawn(move || {
            for i in 1..=10_000u64 {
                while !tx.push(i) {
                    std::hint::spin_loop();
                }
            }
        });

        let mut last = 0;
        while last < 10_000 {
            if let Some(v) = rx.pop() {
                assert_eq!(v, last + 1);
                last = v;
            }
        }
        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
