//! The Sample Ring: a bounded lock-free single-producer/single-consumer
//! queue of [`PositionSample`] records.
//!
//! # Design
//! Single producer (Sampler), single consumer (Publisher), per `spec.md`
//! §4.3. The producer publishes a written slot with `Release` ordering; the
//! consumer acquires with `Acquire` before reading it, the same handshake
//! the teacher's DMA-buffer handoff in `dual-iir.rs` establishes with an
//! explicit `fence(Ordering::SeqCst)` around the ADC/DAC buffer swap. On
//! full, `try_push` returns `false` without blocking and the caller counts
//! the drop — the ring never overwrites unread data.
//!
//! `head` and `tail` are wrapped in [`crossbeam_utils::CachePadded`] so the
//! producer and consumer cursors occupy distinct cache lines, per the
//! invariant in `spec.md` §9.
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::sample::PositionSample;

/// A bounded SPSC ring of [`PositionSample`] records.
///
/// Capacity is fixed at construction and rounded up to the next power of
/// two so slot indices can be computed with a mask instead of a modulo.
pub struct SampleRing {
    buffer: Box<[UnsafeCell<PositionSample>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: `buffer` slots are written only by the single producer between
// reserving a slot via `tail` and publishing it with a `Release` store, and
// read only by the single consumer after an `Acquire` load observes that
// store. The two never touch the same slot concurrently.
unsafe impl Sync for SampleRing {}

impl SampleRing {
    /// Construct a ring able to hold at least `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(PositionSample::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buffer,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Push a record without blocking. Returns `false` if the ring is full;
    /// the caller is responsible for counting the drop.
    ///
    /// Must only be called from the single producer.
    pub fn try_push(&self, sample: PositionSample) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity() {
            return false;
        }
        let idx = tail & self.mask;
        // SAFETY: only the producer writes this slot, and only after
        // confirming via `head` that the consumer has vacated it.
        unsafe { *self.buffer[idx].get() = sample };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pop one record without blocking. Returns `None` if the ring is
    /// empty.
    ///
    /// Must only be called from the single consumer.
    pub fn try_pop(&self) -> Option<PositionSample> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = head & self.mask;
        // SAFETY: only the consumer reads this slot, and only after
        // confirming via `tail` that the producer has published it.
        let sample = unsafe { *self.buffer[idx].get() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(sample)
    }

    /// Drain up to `max` records into `out`, returning the number drained.
    /// Must only be called from the single consumer.
    pub fn drain_into(&self, out: &mut Vec<PositionSample>, max: usize) -> usize {
        let mut n = 0;
        while n < max {
            match self.try_pop() {
                Some(sample) => {
                    out.push(sample);
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// A lower bound on the number of records currently readable, safe
    /// under concurrent production.
    pub fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_order() {
        let ring = SampleRing::with_capacity(4);
        for i in 0..4 {
            assert!(ring.try_push(PositionSample::empty(i)));
        }
        for i in 0..4 {
            assert_eq!(ring.try_pop().unwrap().timestamp_ns, i);
        }
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let ring = SampleRing::with_capacity(5);
        assert_eq!(ring.capacity(), 8);
    }

    #[test]
    fn full_ring_rejects_without_overwrite() {
        let ring = SampleRing::with_capacity(2);
        assert!(ring.try_push(PositionSample::empty(1)));
        assert!(ring.try_push(PositionSample::empty(2)));
        assert!(!ring.try_push(PositionSample::empty(3)));
        assert_eq!(ring.try_pop().unwrap().timestamp_ns, 1);
        assert!(ring.try_push(PositionSample::empty(3)));
        assert_eq!(ring.try_pop().unwrap().timestamp_ns, 2);
        assert_eq!(ring.try_pop().unwrap().timestamp_ns, 3);
    }

    #[test]
    fn drain_into_respects_max_and_conserves_count() {
        let ring = SampleRing::with_capacity(16);
        for i in 0..10 {
            assert!(ring.try_push(PositionSample::empty(i)));
        }
        let mut out = Vec::new();
        let n = ring.drain_into(&mut out, 4);
        assert_eq!(n, 4);
        assert_eq!(ring.available(), 6);
        let n = ring.drain_into(&mut out, 100);
        assert_eq!(n, 6);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn concurrent_producer_consumer_sees_every_pushed_record() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(SampleRing::with_capacity(64));
        let producer_ring = ring.clone();
        const N: u64 = 20_000;

        let producer = thread::spawn(move || {
            let mut i = 0u64;
            while i < N {
                if producer_ring.try_push(PositionSample::empty(i)) {
                    i += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::with_capacity(N as usize);
        while received.len() < N as usize {
            match ring.try_pop() {
                Some(sample) => received.push(sample.timestamp_ns),
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();

        for (i, ts) in received.iter().enumerate() {
            assert_eq!(*ts, i as u64);
        }
    }
}
