//! Audio/keying sinks consumed by the generator.
//!
//! A sink receives rendered mono f32 blocks plus key-line edges. The
//! generator relies on `write` blocking until the sink has accepted
//! the block; that back-pressure is what paces the consumer thread at
//! real-time rate for hardware sinks. Sinks with no natural rate (the
//! null sink) simulate it by sleeping.

pub mod wav;

#[cfg(feature = "audio-cpal")]
pub mod cpal;

use std::thread;
use std::time::Duration;

use crate::error::Result;

pub use wav::WavSink;

#[cfg(feature = "audio-cpal")]
pub use self::cpal::CpalSink;

/// Destination for rendered tones and key events.
pub trait ToneSink: Send {
    /// Output sample rate in Hz. The generator renders at this rate.
    fn sample_rate(&self) -> u32;

    /// Accept one block of mono f32 samples in [-1.0, 1.0], blocking
    /// until the sink can take it.
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Key-line state change (down at mark start, up at mark end).
    /// Keying sinks (GPIO, PTT lines) act on this; audio sinks may
    /// ignore it.
    fn key(&mut self, _down: bool) -> Result<()> {
        Ok(())
    }

    /// Flush any buffered output; called once when the consumer stops.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A sink that discards all audio.
///
/// With `pace` enabled it sleeps for each block's real-time duration,
/// so callers that wait on the tone queue still observe correct
/// element timing. Useful for keying-only and test setups.
pub struct NullSink {
    sample_rate: u32,
    pace: bool,
}

impl NullSink {
    pub fn new(sample_rate: u32, pace: bool) -> Self {
        Self { sample_rate, pace }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new(8_000, false)
    }
}

impl ToneSink for NullSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if self.pace && !samples.is_empty() {
            let us = samples.len() as u64 * 1_000_000 / self.sample_rate as u64;
            thread::sleep(Duration::from_micros(us));
        }
        Ok(())
    }
}
