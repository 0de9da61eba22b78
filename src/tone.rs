//! The unit of work flowing through the tone queue.

use serde::{Deserialize, Serialize};

/// How the amplitude envelope is applied to a tone.
///
/// Slopes suppress the audible clicks produced by keying a carrier on
/// or off instantaneously. A "standard" tone ramps up at its start and
/// down at its end; single-sided modes exist for tones that continue
/// into (or out of) an adjacent tone at full amplitude, as a straight
/// key holding the carrier does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlopeMode {
    /// Full amplitude for the whole duration.
    None,
    /// Ramp up at the start only.
    Rising,
    /// Ramp down at the end only.
    Falling,
    /// Ramp up at the start and down at the end.
    Standard,
    /// Like `Rising` but with an explicit slope length in microseconds.
    RisingFor(u32),
    /// Like `Falling` but with an explicit slope length in microseconds.
    FallingFor(u32),
}

/// Shape of the amplitude ramp within a slope area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlopeShape {
    /// Straight-line ramp.
    Linear,
    /// Half of a raised-cosine period; the least clicky in practice.
    #[default]
    RaisedCosine,
    /// Quarter of a sine period.
    Sine,
    /// No ramp at all; amplitude steps to full immediately.
    Rectangular,
}

/// One queued tone request. Immutable once enqueued.
///
/// A `frequency` of zero is silence: inter-element, inter-character and
/// inter-word gaps travel through the queue as zero-frequency tones so
/// that the consumer thread paces them like any other tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz; 0 means silence (key-up).
    pub frequency: u32,
    /// Duration in microseconds.
    pub duration_us: u32,
    /// Envelope mode for this tone.
    pub slope: SlopeMode,
}

impl Tone {
    pub fn new(frequency: u32, duration_us: u32, slope: SlopeMode) -> Self {
        Self {
            frequency,
            duration_us,
            slope,
        }
    }

    /// A silent tone of the given duration.
    pub fn silence(duration_us: u32) -> Self {
        Self::new(0, duration_us, SlopeMode::None)
    }

    /// Returns true if this tone carries no audio.
    pub fn is_silence(&self) -> bool {
        self.frequency == 0
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::silence(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_frequency_and_no_slope() {
        let t = Tone::silence(100_000);
        assert!(t.is_silence());
        assert_eq!(t.slope, SlopeMode::None);
        assert_eq!(Tone::default().duration_us, 0);
    }

    #[test]
    fn slope_shape_serde_round_trips() {
        let json = serde_json::to_string(&SlopeShape::RaisedCosine).expect("serialize");
        let back: SlopeShape = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, SlopeShape::RaisedCosine);
        assert_eq!(SlopeShape::default(), SlopeShape::RaisedCosine);
    }
}
