//! Waveform synthesis with click-suppressing amplitude slopes.
//!
//! A tone is rendered as a sine carrier multiplied by an envelope:
//! an optional rising slope, a sustain at full amplitude, an optional
//! falling slope. The envelope shape is configurable; raised cosine is
//! the default because a stepped or linear onset spreads key clicks
//! across the band.

use std::f64::consts::TAU;

use crate::tone::{SlopeMode, SlopeShape, Tone};

/// Precomputed per-tone rendering state. `fill` is called repeatedly
/// with increasing sample offsets so the consumer can emit a long tone
/// in small blocks and observe its stop flag between them.
pub(crate) struct ToneRender {
    total_samples: usize,
    lead_samples: usize,
    tail_samples: usize,
    amplitude: f32,
    phase_inc: f64,
    shape: SlopeShape,
    silence: bool,
}

impl ToneRender {
    pub(crate) fn new(
        tone: &Tone,
        volume_percent: u32,
        shape: SlopeShape,
        slope_len_us: u32,
        sample_rate: u32,
    ) -> Self {
        let total_samples =
            (tone.duration_us as u64 * sample_rate as u64 / 1_000_000) as usize;
        let default_slope =
            (slope_len_us as u64 * sample_rate as u64 / 1_000_000) as usize;
        let slope_of =
            |us: u32| (us as u64 * sample_rate as u64 / 1_000_000) as usize;

        let (mut lead, mut tail) = match tone.slope {
            SlopeMode::None => (0, 0),
            SlopeMode::Rising => (default_slope, 0),
            SlopeMode::Falling => (0, default_slope),
            SlopeMode::Standard => (default_slope, default_slope),
            SlopeMode::RisingFor(us) => (slope_of(us), 0),
            SlopeMode::FallingFor(us) => (0, slope_of(us)),
        };
        // Slopes are part of the tone, never longer than it.
        lead = lead.min(total_samples / 2);
        tail = tail.min(total_samples - lead);

        Self {
            total_samples,
            lead_samples: lead,
            tail_samples: tail,
            amplitude: volume_percent.min(100) as f32 / 100.0,
            phase_inc: TAU * tone.frequency as f64 / sample_rate as f64,
            shape,
            silence: tone.is_silence(),
        }
    }

    pub(crate) fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Fill `out` with samples starting at absolute offset `start`
    /// within the tone. Returns the number of samples written; `phase`
    /// is advanced for audible samples so consecutive audible tones
    /// stay phase-continuous.
    pub(crate) fn fill(&self, start: usize, phase: &mut f64, out: &mut [f32]) -> usize {
        let n = out.len().min(self.total_samples.saturating_sub(start));
        if self.silence {
            out[..n].iter_mut().for_each(|s| *s = 0.0);
            return n;
        }
        for (i, slot) in out[..n].iter_mut().enumerate() {
            let idx = start + i;
            *slot = self.amplitude * self.envelope(idx) * (phase.sin() as f32);
            *phase += self.phase_inc;
            if *phase >= TAU {
                *phase -= TAU;
            }
        }
        n
    }

    fn envelope(&self, idx: usize) -> f32 {
        if idx < self.lead_samples {
            ramp(self.shape, idx as f32 / self.lead_samples as f32)
        } else if idx >= self.total_samples - self.tail_samples {
            let remaining = self.total_samples - 1 - idx;
            ramp(
                self.shape,
                remaining as f32 / self.tail_samples as f32,
            )
        } else {
            1.0
        }
    }
}

/// Envelope factor for ramp progress `t` in [0, 1].
fn ramp(shape: SlopeShape, t: f32) -> f32 {
    use std::f32::consts::{FRAC_PI_2, PI};
    match shape {
        SlopeShape::Linear => t,
        SlopeShape::RaisedCosine => (1.0 - (PI * t).cos()) / 2.0,
        SlopeShape::Sine => (FRAC_PI_2 * t).sin(),
        SlopeShape::Rectangular => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn render_all(tone: &Tone, volume: u32, shape: SlopeShape, slope_us: u32) -> Vec<f32> {
        let r = ToneRender::new(tone, volume, shape, slope_us, 8_000);
        let mut out = vec![0.0; r.total_samples()];
        let mut phase = 0.0;
        let written = r.fill(0, &mut phase, &mut out);
        assert_eq!(written, out.len());
        out
    }

    #[test]
    fn duration_maps_to_sample_count() {
        let tone = Tone::new(800, 100_000, SlopeMode::Standard);
        let r = ToneRender::new(&tone, 70, SlopeShape::RaisedCosine, 5_000, 8_000);
        assert_eq!(r.total_samples(), 800); // 100 ms at 8 kHz
    }

    #[test]
    fn silence_renders_as_zeros() {
        let out = render_all(
            &Tone::silence(50_000),
            70,
            SlopeShape::RaisedCosine,
            5_000,
        );
        assert_eq!(out.len(), 400);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn standard_slope_starts_and_ends_quiet() {
        let out = render_all(
            &Tone::new(800, 100_000, SlopeMode::Standard),
            100,
            SlopeShape::RaisedCosine,
            5_000,
        );
        // First and last samples are inside the ramp; the middle is not.
        assert!(out[0].abs() < 1e-3);
        assert!(out[out.len() - 1].abs() < 1e-3);
        let mid_peak = out[out.len() / 2 - 20..out.len() / 2 + 20]
            .iter()
            .fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(mid_peak > 0.9, "sustain should reach full volume, got {mid_peak}");
    }

    #[test]
    fn no_slope_mode_starts_at_full_amplitude() {
        let tone = Tone::new(1_000, 100_000, SlopeMode::None);
        let r = ToneRender::new(&tone, 100, SlopeShape::RaisedCosine, 5_000, 8_000);
        let mut out = vec![0.0; 16];
        // Start a quarter period in so the sine itself is near peak.
        let mut phase = std::f64::consts::FRAC_PI_2;
        r.fill(0, &mut phase, &mut out);
        assert!(out[0].abs() > 0.95);
    }

    #[test]
    fn rising_only_leaves_tail_at_full_amplitude() {
        let out = render_all(
            &Tone::new(800, 100_000, SlopeMode::Rising),
            100,
            SlopeShape::Linear,
            5_000,
        );
        assert!(out[0].abs() < 1e-3);
        let tail_peak = out[out.len() - 40..]
            .iter()
            .fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(tail_peak > 0.9);
    }

    #[test]
    fn volume_scales_amplitude_linearly() {
        let full = render_all(
            &Tone::new(800, 50_000, SlopeMode::None),
            100,
            SlopeShape::RaisedCosine,
            0,
        );
        let half = render_all(
            &Tone::new(800, 50_000, SlopeMode::None),
            50,
            SlopeShape::RaisedCosine,
            0,
        );
        for (f, h) in full.iter().zip(half.iter()) {
            assert_relative_eq!(*h, f * 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn raised_cosine_ramp_hits_half_amplitude_midway() {
        assert_relative_eq!(ramp(SlopeShape::RaisedCosine, 0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(ramp(SlopeShape::RaisedCosine, 0.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(ramp(SlopeShape::RaisedCosine, 1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(ramp(SlopeShape::Linear, 0.25), 0.25, epsilon = 1e-6);
        assert_relative_eq!(ramp(SlopeShape::Sine, 1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(ramp(SlopeShape::Rectangular, 0.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn slopes_never_exceed_tone_length() {
        // 10 ms tone with 50 ms slopes: lead+tail clamp to the tone.
        let tone = Tone::new(800, 10_000, SlopeMode::Standard);
        let r = ToneRender::new(&tone, 100, SlopeShape::Linear, 50_000, 8_000);
        assert_eq!(r.total_samples(), 80);
        assert!(r.lead_samples + r.tail_samples <= r.total_samples());
    }

    #[test]
    fn phase_is_continuous_across_fills() {
        let tone = Tone::new(800, 100_000, SlopeMode::None);
        let r = ToneRender::new(&tone, 100, SlopeShape::RaisedCosine, 0, 8_000);

        let mut whole = vec![0.0; r.total_samples()];
        let mut phase = 0.0;
        r.fill(0, &mut phase, &mut whole);

        let mut chunked = vec![0.0; r.total_samples()];
        let mut phase = 0.0;
        let mut offset = 0;
        while offset < r.total_samples() {
            let n = r.fill(offset, &mut phase, &mut chunked[offset..(offset + 64).min(r.total_samples())]);
            offset += n;
        }
        for (a, b) in whole.iter().zip(chunked.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
