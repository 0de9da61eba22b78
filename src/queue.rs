//! Bounded circular FIFO of tones with blocking waits.
//!
//! One lock guards all index mutation; it is held only for O(1)
//! pointer/counter updates, never across rendering. Two condvars carry
//! the blocking protocols:
//!
//! - `enqueue_cond` wakes the consumer thread parked in
//!   [`ToneQueue::dequeue_or_wait`] when a producer adds a tone;
//! - `dequeue_cond` wakes producers parked in
//!   [`ToneQueue::wait_for_tone`] / [`ToneQueue::wait_for_level`] after
//!   each successful dequeue (and on flush).
//!
//! Storage is a fixed array of `CAPACITY_MAX` slots allocated once;
//! changing the logical capacity never reallocates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{CwError, Result};
use crate::tone::Tone;

/// Maximum logical capacity, roughly five minutes of tones at 12 WPM.
pub const CAPACITY_MAX: usize = 3_000;

/// Default logical capacity and high water mark.
pub const CAPACITY_DEFAULT: usize = CAPACITY_MAX;
pub const HIGH_WATER_MARK_DEFAULT: usize = 2_900;

/// Queue activity state, visible to callers pacing themselves on the
/// queue draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Empty and nothing being dequeued.
    Idle,
    /// Holding tones, or actively draining.
    Busy,
}

type LowWaterCallback = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    slots: Box<[Tone]>,
    capacity: usize,
    high_water_mark: usize,
    head: usize,
    tail: usize,
    len: usize,
    state: QueueState,
    /// Total successful dequeues, used by `wait_for_tone`.
    dequeues: u64,
    low_water: Option<(LowWaterCallback, usize)>,
}

impl Inner {
    fn next(&self, i: usize) -> usize {
        (i + 1) % self.capacity
    }

    fn prev(&self, i: usize) -> usize {
        (i + self.capacity - 1) % self.capacity
    }
}

/// Bounded, mutex-guarded circular tone FIFO.
///
/// Any number of producer threads may enqueue; exactly one consumer
/// (the generator's rendering thread) dequeues. Enqueue and dequeue
/// never block; the blocking entry points are explicit waits.
pub struct ToneQueue {
    inner: Mutex<Inner>,
    enqueue_cond: Condvar,
    dequeue_cond: Condvar,
}

impl ToneQueue {
    /// Create a queue with default capacity and high water mark.
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY_DEFAULT, HIGH_WATER_MARK_DEFAULT)
            .expect("default capacity is valid")
    }

    /// Create a queue with an explicit capacity and high water mark.
    ///
    /// Requires `0 < high_water_mark <= capacity <= CAPACITY_MAX`.
    pub fn with_capacity(capacity: usize, high_water_mark: usize) -> Result<Self> {
        Self::validate(capacity, high_water_mark)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                slots: vec![Tone::default(); CAPACITY_MAX].into_boxed_slice(),
                capacity,
                high_water_mark,
                head: 0,
                tail: 0,
                len: 0,
                state: QueueState::Idle,
                dequeues: 0,
                low_water: None,
            }),
            enqueue_cond: Condvar::new(),
            dequeue_cond: Condvar::new(),
        })
    }

    fn validate(capacity: usize, high_water_mark: usize) -> Result<()> {
        if capacity == 0 || capacity > CAPACITY_MAX {
            return Err(CwError::InvalidParameter {
                name: "capacity",
                value: capacity as i64,
            });
        }
        if high_water_mark == 0 || high_water_mark > capacity {
            return Err(CwError::InvalidParameter {
                name: "high_water_mark",
                value: high_water_mark as i64,
            });
        }
        Ok(())
    }

    /// Change the logical capacity and high water mark, resetting the
    /// queue to empty. Queued tones are discarded.
    pub fn set_capacity(&self, capacity: usize, high_water_mark: usize) -> Result<()> {
        Self::validate(capacity, high_water_mark)?;
        let mut q = self.inner.lock();
        q.capacity = capacity;
        q.high_water_mark = high_water_mark;
        q.head = 0;
        q.tail = 0;
        q.len = 0;
        q.state = QueueState::Idle;
        drop(q);
        self.dequeue_cond.notify_all();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn high_water_mark(&self) -> usize {
        self.inner.lock().high_water_mark
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().len == 0
    }

    pub fn is_full(&self) -> bool {
        let q = self.inner.lock();
        q.len == q.capacity
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().state
    }

    /// Append a tone. Fails fast with `QueueFull` at capacity; the
    /// queue is unchanged on failure.
    pub fn enqueue(&self, tone: Tone) -> Result<()> {
        let mut q = self.inner.lock();
        if q.len == q.capacity {
            warn!(capacity = q.capacity, "tone queue full");
            return Err(CwError::QueueFull);
        }
        let tail = q.tail;
        q.slots[tail] = tone;
        q.tail = q.next(tail);
        q.len += 1;
        q.state = QueueState::Busy;
        drop(q);
        self.enqueue_cond.notify_one();
        Ok(())
    }

    /// Remove and return the oldest tone, or `None` when empty.
    ///
    /// Fires the registered low-water callback (outside the lock, on
    /// this thread) when the length crosses from above the threshold to
    /// at-or-below it.
    pub fn dequeue(&self) -> Option<Tone> {
        let (tone, callback) = {
            let mut q = self.inner.lock();
            if q.len == 0 {
                q.state = QueueState::Idle;
                return None;
            }
            let head = q.head;
            let tone = q.slots[head];
            q.head = q.next(head);
            let prev_len = q.len;
            q.len -= 1;
            q.dequeues += 1;
            if q.len == 0 {
                q.state = QueueState::Idle;
            }

            // Edge-triggered: fire only on the crossing dequeue.
            let callback = match &q.low_water {
                Some((cb, threshold)) if prev_len > *threshold && q.len <= *threshold => {
                    Some(Arc::clone(cb))
                }
                _ => None,
            };
            (tone, callback)
        };

        self.dequeue_cond.notify_all();
        if let Some(cb) = callback {
            debug!("low-water threshold crossed, invoking callback");
            cb();
        }
        Some(tone)
    }

    /// Consumer entry point: dequeue the next tone, suspending on the
    /// enqueue condvar while the queue is empty. Returns `None` once
    /// `running` is cleared (cooperative cancellation), checked at
    /// every wakeup.
    pub fn dequeue_or_wait(&self, running: &AtomicBool) -> Option<Tone> {
        loop {
            {
                let mut q = self.inner.lock();
                while q.len == 0 {
                    if !running.load(Ordering::Acquire) {
                        return None;
                    }
                    q.state = QueueState::Idle;
                    self.enqueue_cond.wait(&mut q);
                }
            }
            if !running.load(Ordering::Acquire) {
                return None;
            }
            // Raced against flush/set_capacity between unlock and here;
            // loop back to waiting if the tone is gone.
            if let Some(tone) = self.dequeue() {
                return Some(tone);
            }
        }
    }

    /// Reset to empty without consuming tones. Wakes all waiters.
    pub fn flush(&self) {
        let mut q = self.inner.lock();
        q.head = 0;
        q.tail = 0;
        q.len = 0;
        q.state = QueueState::Idle;
        drop(q);
        self.dequeue_cond.notify_all();
        self.enqueue_cond.notify_all();
    }

    /// Wake any thread parked inside [`ToneQueue::dequeue_or_wait`] so
    /// it can observe a cleared running flag.
    pub fn interrupt_consumer(&self) {
        self.enqueue_cond.notify_all();
    }

    /// Register the low-water observer: `callback` runs exactly once
    /// each time a dequeue takes the length from above `threshold` to
    /// at-or-below it. It executes synchronously on the dequeuing
    /// thread with the queue lock released, and must not block.
    pub fn register_low_water_callback(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
        threshold: usize,
    ) -> Result<()> {
        let mut q = self.inner.lock();
        if threshold >= q.capacity {
            return Err(CwError::InvalidParameter {
                name: "threshold",
                value: threshold as i64,
            });
        }
        q.low_water = Some((Arc::new(callback), threshold));
        Ok(())
    }

    /// Remove any registered low-water callback.
    pub fn clear_low_water_callback(&self) {
        self.inner.lock().low_water = None;
    }

    /// Block the caller until the next successful dequeue (or a flush).
    ///
    /// Fails fast with `QueueEmpty` if there is nothing queued to wait
    /// for.
    pub fn wait_for_tone(&self) -> Result<()> {
        let mut q = self.inner.lock();
        if q.len == 0 {
            return Err(CwError::QueueEmpty);
        }
        let seen = q.dequeues;
        while q.dequeues == seen && q.len > 0 {
            self.dequeue_cond.wait(&mut q);
        }
        Ok(())
    }

    /// Block the caller until the queue length is at or below `level`.
    pub fn wait_for_level(&self, level: usize) {
        let mut q = self.inner.lock();
        while q.len > level {
            self.dequeue_cond.wait(&mut q);
        }
    }
}

impl Default for ToneQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::SlopeMode;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn tone(freq: u32) -> Tone {
        Tone::new(freq, 10_000, SlopeMode::Standard)
    }

    #[test]
    fn index_arithmetic_is_inverse() {
        let q = ToneQueue::with_capacity(17, 10).expect("valid capacity");
        let inner = q.inner.lock();
        for i in 0..17 {
            assert_eq!(inner.next(inner.prev(i)), i);
            assert_eq!(inner.prev(inner.next(i)), i);
        }
    }

    #[test]
    fn fill_then_overflow_then_drain() {
        let cap = 30;
        let q = ToneQueue::with_capacity(cap, 24).expect("valid capacity");

        for i in 0..cap {
            q.enqueue(tone(i as u32)).expect("enqueue within capacity");
        }
        assert!(q.is_full());
        assert_eq!(q.len(), cap);

        assert!(matches!(q.enqueue(tone(99)), Err(CwError::QueueFull)));
        assert_eq!(q.len(), cap, "failed enqueue must not mutate");

        for i in 0..cap {
            let t = q.dequeue().expect("dequeue from non-empty queue");
            assert_eq!(t.frequency, i as u32, "FIFO order");
        }
        assert_eq!(q.len(), 0);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn length_tracks_enqueue_minus_dequeue() {
        let q = ToneQueue::with_capacity(9, 4).expect("valid capacity");
        let mut expected = 0usize;
        // Interleave to force wraparound; net +2 per round stays
        // within capacity for the three rounds below.
        for round in 0..2 {
            for i in 0..6 {
                q.enqueue(tone(round * 10 + i)).expect("enqueue");
                expected += 1;
            }
            for _ in 0..4 {
                assert!(q.dequeue().is_some());
                expected -= 1;
            }
            assert_eq!(q.len(), expected);
        }
    }

    #[test]
    fn fifo_order_is_offset_independent() {
        let cap = 10;
        for shift in 0..cap {
            let q = ToneQueue::with_capacity(cap, cap).expect("valid capacity");
            // Rotate the head/tail by `shift` before the real fill.
            for _ in 0..shift {
                q.enqueue(tone(0)).expect("warmup enqueue");
                q.dequeue().expect("warmup dequeue");
            }
            for i in 0..cap {
                q.enqueue(tone(100 + i as u32)).expect("enqueue");
            }
            for i in 0..cap {
                assert_eq!(
                    q.dequeue().expect("dequeue").frequency,
                    100 + i as u32,
                    "shift={shift}"
                );
            }
        }
    }

    #[test]
    fn low_water_callback_fires_exactly_once_on_crossing() {
        let q = ToneQueue::with_capacity(30, 24).expect("valid capacity");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_cb = Arc::clone(&fired);
        q.register_low_water_callback(
            move || {
                fired_in_cb.fetch_add(1, Ordering::SeqCst);
            },
            24,
        )
        .expect("register callback");

        for i in 0..30 {
            q.enqueue(tone(i)).expect("enqueue");
        }
        assert!(q.is_full());
        assert_eq!(fired.load(Ordering::SeqCst), 0, "enqueue never fires");

        for _ in 0..7 {
            q.dequeue().expect("dequeue");
        }
        assert_eq!(q.len(), 23);
        assert_eq!(fired.load(Ordering::SeqCst), 1, "one crossing, one call");

        // Refill above and drain below the threshold again: a second edge.
        for i in 0..4 {
            q.enqueue(tone(i)).expect("enqueue");
        }
        for _ in 0..5 {
            q.dequeue().expect("dequeue");
        }
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejects_invalid_capacity_and_watermark() {
        assert!(ToneQueue::with_capacity(0, 0).is_err());
        assert!(ToneQueue::with_capacity(CAPACITY_MAX + 1, 1).is_err());
        assert!(ToneQueue::with_capacity(10, 11).is_err());
        assert!(ToneQueue::with_capacity(10, 0).is_err());

        let q = ToneQueue::new();
        assert!(q.set_capacity(50, 60).is_err());
        q.set_capacity(50, 40).expect("valid capacity change");
        assert_eq!(q.capacity(), 50);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn flush_empties_without_dequeue_count() {
        let q = ToneQueue::with_capacity(10, 5).expect("valid capacity");
        for i in 0..6 {
            q.enqueue(tone(i)).expect("enqueue");
        }
        q.flush();
        assert_eq!(q.len(), 0);
        assert_eq!(q.state(), QueueState::Idle);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn wait_for_tone_unblocks_on_dequeue() {
        let q = Arc::new(ToneQueue::with_capacity(10, 5).expect("valid capacity"));
        q.enqueue(tone(1)).expect("enqueue");

        let waiter = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.wait_for_tone())
        };
        thread::sleep(Duration::from_millis(20));
        q.dequeue().expect("dequeue");
        waiter
            .join()
            .expect("waiter thread")
            .expect("wait_for_tone succeeds");
    }

    #[test]
    fn wait_for_tone_on_empty_queue_is_an_error() {
        let q = ToneQueue::new();
        assert!(matches!(q.wait_for_tone(), Err(CwError::QueueEmpty)));
    }

    #[test]
    fn wait_for_level_unblocks_when_drained_enough() {
        let q = Arc::new(ToneQueue::with_capacity(10, 5).expect("valid capacity"));
        for i in 0..8 {
            q.enqueue(tone(i)).expect("enqueue");
        }

        let waiter = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.wait_for_level(3))
        };
        thread::sleep(Duration::from_millis(20));
        for _ in 0..5 {
            q.dequeue().expect("dequeue");
        }
        waiter.join().expect("waiter thread");
        assert!(q.len() <= 3);
    }

    #[test]
    fn dequeue_or_wait_returns_none_when_stopped() {
        let q = Arc::new(ToneQueue::new());
        let running = Arc::new(AtomicBool::new(true));

        let consumer = {
            let q = Arc::clone(&q);
            let running = Arc::clone(&running);
            thread::spawn(move || q.dequeue_or_wait(&running))
        };
        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Release);
        q.interrupt_consumer();
        assert!(consumer.join().expect("consumer thread").is_none());
    }

    #[test]
    fn dequeue_or_wait_wakes_on_enqueue() {
        let q = Arc::new(ToneQueue::new());
        let running = Arc::new(AtomicBool::new(true));

        let consumer = {
            let q = Arc::clone(&q);
            let running = Arc::clone(&running);
            thread::spawn(move || q.dequeue_or_wait(&running))
        };
        thread::sleep(Duration::from_millis(20));
        q.enqueue(tone(440)).expect("enqueue");
        let got = consumer.join().expect("consumer thread");
        assert_eq!(got.map(|t| t.frequency), Some(440));
    }
}
