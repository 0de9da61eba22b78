//! `Generator`: tone production and the consumer-thread lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Generator::new(sink, config)
//!     └─► start()        → consumer thread spawned, queue draining
//!         └─► stop()     → running=false, queue flushed, thread joined
//! ```
//!
//! `start()`/`stop()` are guarded: calling them in the wrong state
//! returns an error rather than panicking, and `stop()` returns only
//! after the consumer has exited, so no callbacks run afterwards.
//!
//! High-level send operations (`enqueue_character`, `enqueue_string`)
//! expand text into fully timed tone sequences up front; the consumer
//! thread needs no knowledge of Morse, only of tones.

mod consumer;
mod render;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::charset;
use crate::error::{CwError, Result};
use crate::queue::ToneQueue;
use crate::sink::ToneSink;
use crate::timing::{self, TimingTable};
use crate::tone::{SlopeMode, SlopeShape, Tone};

/// Longest representation the send path accepts, in marks.
pub const MAX_REPRESENTATION_LENGTH: usize = 14;

/// Default envelope slope length in microseconds.
pub const SLOPE_LEN_INITIAL: u32 = 5_000;

/// Caller-owned generator settings. All fields are validated when the
/// generator is constructed and by the individual setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Sending speed in WPM (4–60).
    pub speed_wpm: u32,
    /// Tone frequency in Hz (0–4000; 0 keys silently).
    pub frequency: u32,
    /// Volume in percent (0–100).
    pub volume: u32,
    /// Farnsworth gap in dot units (0–60).
    pub gap: u32,
    /// Mark/space weighting in percent (20–80; 50 is neutral).
    pub weighting: u32,
    /// Envelope slope length in microseconds.
    pub slope_len_us: u32,
    /// Envelope slope shape.
    pub slope_shape: SlopeShape,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            speed_wpm: timing::SPEED_INITIAL,
            frequency: timing::FREQUENCY_INITIAL,
            volume: timing::VOLUME_INITIAL,
            gap: timing::GAP_INITIAL,
            weighting: timing::WEIGHTING_INITIAL,
            slope_len_us: SLOPE_LEN_INITIAL,
            slope_shape: SlopeShape::default(),
        }
    }
}

fn check_range(name: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(CwError::InvalidParameter {
            name,
            value: value as i64,
        });
    }
    Ok(())
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("speed_wpm", self.speed_wpm, timing::SPEED_MIN, timing::SPEED_MAX)?;
        check_range(
            "frequency",
            self.frequency,
            timing::FREQUENCY_MIN,
            timing::FREQUENCY_MAX,
        )?;
        check_range("volume", self.volume, timing::VOLUME_MIN, timing::VOLUME_MAX)?;
        check_range("gap", self.gap, timing::GAP_MIN, timing::GAP_MAX)?;
        check_range(
            "weighting",
            self.weighting,
            timing::WEIGHTING_MIN,
            timing::WEIGHTING_MAX,
        )?;
        check_range("slope_len_us", self.slope_len_us, 0, 1_000_000)?;
        Ok(())
    }
}

/// Live parameters plus the derived timing table, guarded by one lock.
pub(crate) struct Params {
    pub speed_wpm: u32,
    pub frequency: u32,
    pub volume: u32,
    pub gap: u32,
    pub weighting: u32,
    pub slope_len_us: u32,
    pub slope_shape: SlopeShape,
    pub timing: TimingTable,
}

impl Params {
    fn resync(&mut self) {
        self.timing = TimingTable::compute(self.speed_wpm, self.gap, self.weighting);
    }
}

/// Tone generator with a dedicated real-time consumer thread.
///
/// `Generator` is `Send + Sync`; all fields use interior mutability.
/// Wrap in `Arc<Generator>` to share between a keyer and control code.
pub struct Generator {
    queue: Arc<ToneQueue>,
    params: Arc<Mutex<Params>>,
    /// `true` while the consumer thread runs.
    running: Arc<AtomicBool>,
    /// `true` while a dequeued tone is being rendered.
    rendering: Arc<AtomicBool>,
    /// The sink lives here between runs and inside the consumer while
    /// running.
    sink_slot: Arc<Mutex<Option<Box<dyn ToneSink>>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Generator {
    /// Create a generator. Does not start rendering until `start()`.
    pub fn new(sink: Box<dyn ToneSink>, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let params = Params {
            speed_wpm: config.speed_wpm,
            frequency: config.frequency,
            volume: config.volume,
            gap: config.gap,
            weighting: config.weighting,
            slope_len_us: config.slope_len_us,
            slope_shape: config.slope_shape,
            timing: TimingTable::compute(config.speed_wpm, config.gap, config.weighting),
        };
        Ok(Self {
            queue: Arc::new(ToneQueue::new()),
            params: Arc::new(Mutex::new(params)),
            running: Arc::new(AtomicBool::new(false)),
            rendering: Arc::new(AtomicBool::new(false)),
            sink_slot: Arc::new(Mutex::new(Some(sink))),
            handle: Mutex::new(None),
        })
    }

    /// The tone queue this generator drains. Exposed so callers can
    /// register low-water callbacks or pace on queue level.
    pub fn queue(&self) -> &Arc<ToneQueue> {
        &self.queue
    }

    /// Snapshot of the derived timing table.
    pub fn timing(&self) -> TimingTable {
        self.params.lock().timing
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ── Parameter setters ───────────────────────────────────────────

    pub fn set_speed(&self, wpm: u32) -> Result<()> {
        check_range("speed_wpm", wpm, timing::SPEED_MIN, timing::SPEED_MAX)?;
        let mut p = self.params.lock();
        p.speed_wpm = wpm;
        p.resync();
        Ok(())
    }

    pub fn set_frequency(&self, hz: u32) -> Result<()> {
        check_range("frequency", hz, timing::FREQUENCY_MIN, timing::FREQUENCY_MAX)?;
        self.params.lock().frequency = hz;
        Ok(())
    }

    pub fn set_volume(&self, percent: u32) -> Result<()> {
        check_range("volume", percent, timing::VOLUME_MIN, timing::VOLUME_MAX)?;
        self.params.lock().volume = percent;
        Ok(())
    }

    pub fn set_gap(&self, gap: u32) -> Result<()> {
        check_range("gap", gap, timing::GAP_MIN, timing::GAP_MAX)?;
        let mut p = self.params.lock();
        p.gap = gap;
        p.resync();
        Ok(())
    }

    pub fn set_weighting(&self, percent: u32) -> Result<()> {
        check_range(
            "weighting",
            percent,
            timing::WEIGHTING_MIN,
            timing::WEIGHTING_MAX,
        )?;
        let mut p = self.params.lock();
        p.weighting = percent;
        p.resync();
        Ok(())
    }

    pub fn set_tone_slope(&self, shape: SlopeShape, len_us: u32) -> Result<()> {
        check_range("slope_len_us", len_us, 0, 1_000_000)?;
        let mut p = self.params.lock();
        p.slope_shape = shape;
        p.slope_len_us = len_us;
        Ok(())
    }

    // ── Enqueue operations ──────────────────────────────────────────

    /// Reserve `slots` queue entries up front so multi-tone operations
    /// either fit completely or fail without enqueueing anything.
    fn ensure_room(&self, slots: usize) -> Result<()> {
        if self.queue.capacity() - self.queue.len() < slots {
            return Err(CwError::QueueFull);
        }
        Ok(())
    }

    /// Enqueue one dot or dash plus its trailing inter-element gap.
    pub fn enqueue_mark(&self, is_dash: bool) -> Result<()> {
        self.ensure_room(2)?;
        let (frequency, mark_len, gap_len) = {
            let p = self.params.lock();
            let len = if is_dash {
                p.timing.dash_len
            } else {
                p.timing.dot_len
            };
            (p.frequency, len, p.timing.element_gap)
        };
        self.queue
            .enqueue(Tone::new(frequency, mark_len, SlopeMode::Standard))?;
        self.queue.enqueue(Tone::silence(gap_len))?;
        Ok(())
    }

    /// Enqueue a dot/dash string plus the trailing inter-character gap.
    pub fn enqueue_representation(&self, representation: &str) -> Result<()> {
        if representation.is_empty()
            || representation.chars().any(|c| c != '.' && c != '-')
        {
            return Err(CwError::InvalidRepresentation(representation.to_string()));
        }
        if representation.len() > MAX_REPRESENTATION_LENGTH {
            return Err(CwError::RepresentationTooLong {
                max: MAX_REPRESENTATION_LENGTH,
            });
        }
        self.ensure_room(2 * representation.len() + 1)?;
        for mark in representation.chars() {
            self.enqueue_mark(mark == '-')?;
        }
        let gap = self.params.lock().timing.enqueued_char_gap();
        self.queue.enqueue(Tone::silence(gap))?;
        Ok(())
    }

    /// Enqueue one character (looked up in the static table).
    pub fn enqueue_character(&self, c: char) -> Result<()> {
        let representation =
            charset::representation_of(c).ok_or(CwError::UnknownCharacter(c))?;
        self.enqueue_representation(representation)
    }

    /// Enqueue a whole string; spaces become inter-word gaps.
    ///
    /// The string is validated before anything is enqueued, so an
    /// unsendable character never leaves a half-sent message behind.
    pub fn enqueue_string(&self, s: &str) -> Result<()> {
        if let Some(bad) = s.chars().find(|&c| !charset::is_sendable(c)) {
            return Err(CwError::UnknownCharacter(bad));
        }
        for c in s.chars() {
            if c == ' ' {
                let gap = self.params.lock().timing.enqueued_word_gap();
                self.ensure_room(1)?;
                self.queue.enqueue(Tone::silence(gap))?;
            } else {
                self.enqueue_character(c)?;
            }
        }
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the consumer thread.
    ///
    /// # Errors
    /// `CwError::AlreadyRunning` if the consumer is active.
    pub fn start(&self) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(CwError::AlreadyRunning);
        }
        let sink = self
            .sink_slot
            .lock()
            .take()
            .ok_or_else(|| CwError::Sink("sink unavailable".into()))?;

        self.running.store(true, Ordering::Release);

        let ctx = consumer::ConsumerContext {
            queue: Arc::clone(&self.queue),
            params: Arc::clone(&self.params),
            running: Arc::clone(&self.running),
            rendering: Arc::clone(&self.rendering),
            sink_slot: Arc::clone(&self.sink_slot),
            sink,
        };

        let handle = match thread::Builder::new()
            .name("cw-generator".into())
            .spawn(move || consumer::run(ctx))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(CwError::Sink(e.to_string()));
            }
        };
        *self.handle.lock() = Some(handle);

        info!("generator started");
        Ok(())
    }

    /// Stop the consumer thread: clear the running flag, flush the
    /// queue, wake the consumer and join it. After `stop()` returns no
    /// further sink writes or queue callbacks occur.
    ///
    /// # Errors
    /// `CwError::NotRunning` if the consumer is not active.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CwError::NotRunning);
        }
        self.running.store(false, Ordering::Release);
        self.queue.flush();
        self.queue.interrupt_consumer();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        info!("generator stopped");
        Ok(())
    }

    /// Block until the queue is empty and the tone being rendered (if
    /// any) has finished.
    pub fn wait_until_drained(&self) {
        loop {
            self.queue.wait_for_level(0);
            // The consumer flags the dequeued tone as rendering a
            // moment after the queue empties; re-check after a grace
            // interval instead of trusting one snapshot.
            thread::sleep(Duration::from_millis(2));
            if self.queue.is_empty() && !self.rendering.load(Ordering::Acquire) {
                return;
            }
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn generator() -> Generator {
        Generator::new(Box::new(NullSink::new(8_000, false)), GeneratorConfig::default())
            .expect("default config is valid")
    }

    #[test]
    fn config_validation_rejects_out_of_range_values() {
        for (mutate, _) in [
            (
                Box::new(|c: &mut GeneratorConfig| c.speed_wpm = 3) as Box<dyn Fn(&mut _)>,
                "speed low",
            ),
            (Box::new(|c: &mut GeneratorConfig| c.speed_wpm = 61), "speed high"),
            (Box::new(|c: &mut GeneratorConfig| c.frequency = 4_001), "frequency"),
            (Box::new(|c: &mut GeneratorConfig| c.volume = 101), "volume"),
            (Box::new(|c: &mut GeneratorConfig| c.gap = 61), "gap"),
            (Box::new(|c: &mut GeneratorConfig| c.weighting = 19), "weighting low"),
            (Box::new(|c: &mut GeneratorConfig| c.weighting = 81), "weighting high"),
        ] {
            let mut config = GeneratorConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn setters_validate_and_resync_timing() {
        let g = generator();
        let before = g.timing();

        g.set_speed(24).expect("valid speed");
        let after = g.timing();
        assert_eq!(after.dot_len, before.dot_len / 2);

        assert!(g.set_speed(100).is_err());
        assert_eq!(g.timing(), after, "failed setter leaves timing unchanged");

        assert!(g.set_frequency(9_000).is_err());
        assert!(g.set_volume(101).is_err());
        assert!(g.set_gap(61).is_err());
        assert!(g.set_weighting(10).is_err());
    }

    #[test]
    fn enqueue_mark_adds_mark_and_element_gap() {
        let g = generator();
        let t = g.timing();

        g.enqueue_mark(false).expect("enqueue dot");
        g.enqueue_mark(true).expect("enqueue dash");
        assert_eq!(g.queue().len(), 4);

        let dot = g.queue().dequeue().expect("dot tone");
        assert_eq!(dot.frequency, timing::FREQUENCY_INITIAL);
        assert_eq!(dot.duration_us, t.dot_len);
        assert_eq!(dot.slope, SlopeMode::Standard);

        let gap = g.queue().dequeue().expect("gap tone");
        assert!(gap.is_silence());
        assert_eq!(gap.duration_us, t.element_gap);

        let dash = g.queue().dequeue().expect("dash tone");
        assert_eq!(dash.duration_us, t.dash_len);
    }

    #[test]
    fn enqueue_representation_expands_marks_and_char_gap() {
        let g = generator();
        let t = g.timing();

        g.enqueue_representation(".-").expect("enqueue .-");
        // dot, gap, dash, gap, char gap
        assert_eq!(g.queue().len(), 5);

        let durations: Vec<u32> = std::iter::from_fn(|| g.queue().dequeue())
            .map(|tone| tone.duration_us)
            .collect();
        assert_eq!(
            durations,
            vec![
                t.dot_len,
                t.element_gap,
                t.dash_len,
                t.element_gap,
                t.enqueued_char_gap()
            ]
        );
    }

    #[test]
    fn enqueue_representation_rejects_bad_input() {
        let g = generator();
        assert!(matches!(
            g.enqueue_representation(".x-"),
            Err(CwError::InvalidRepresentation(_))
        ));
        assert!(matches!(
            g.enqueue_representation(""),
            Err(CwError::InvalidRepresentation(_))
        ));
        assert!(matches!(
            g.enqueue_representation("...............-"),
            Err(CwError::RepresentationTooLong { .. })
        ));
        assert_eq!(g.queue().len(), 0);
    }

    #[test]
    fn enqueue_string_inserts_word_gaps() {
        let g = generator();
        let t = g.timing();

        g.enqueue_string("E E").expect("enqueue string");
        // E = dot + element gap + char gap (3), word gap (1), E (3)
        assert_eq!(g.queue().len(), 7);

        let mut tones: Vec<Tone> = Vec::new();
        while let Some(tone) = g.queue().dequeue() {
            tones.push(tone);
        }
        assert_eq!(tones[3].duration_us, t.enqueued_word_gap());
        assert!(tones[3].is_silence());
    }

    #[test]
    fn enqueue_string_rejects_unknown_characters_up_front() {
        let g = generator();
        assert!(matches!(
            g.enqueue_string("SO~S"),
            Err(CwError::UnknownCharacter('~'))
        ));
        assert_eq!(g.queue().len(), 0, "nothing partially enqueued");
    }

    #[test]
    fn full_queue_reports_queue_full_without_partial_enqueue() {
        let g = generator();
        g.queue().set_capacity(4, 2).expect("shrink queue");
        g.enqueue_mark(false).expect("two slots");
        assert!(matches!(g.enqueue_representation(".-"), Err(CwError::QueueFull)));
        assert_eq!(g.queue().len(), 2);
    }

    #[test]
    fn start_stop_lifecycle_guards() {
        let g = generator();
        assert!(matches!(g.stop(), Err(CwError::NotRunning)));

        g.start().expect("start");
        assert!(g.is_running());
        assert!(matches!(g.start(), Err(CwError::AlreadyRunning)));

        g.stop().expect("stop");
        assert!(!g.is_running());

        // Restart works because the consumer hands the sink back.
        g.start().expect("restart");
        g.stop().expect("stop again");
    }

    #[test]
    fn consumer_drains_queued_tones() {
        let g = generator();
        g.set_speed(60).expect("fast speed for a quick test");
        g.enqueue_string("ET").expect("enqueue");
        g.start().expect("start");
        g.wait_until_drained();
        assert_eq!(g.queue().len(), 0);
        g.stop().expect("stop");
    }
}
