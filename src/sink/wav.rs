//! WAV file sink backed by `hound`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::info;

use super::ToneSink;
use crate::error::{CwError, Result};

/// Renders the tone stream into a 16-bit mono WAV file.
///
/// Does not pace: writing is as fast as the disk allows, which makes
/// offline rendering of long messages quick. `finish` (or drop)
/// finalizes the RIFF header.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    samples_written: u64,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| CwError::Sink(e.to_string()))?;
        info!(path = %path.as_ref().display(), sample_rate, "wav sink opened");
        Ok(Self {
            writer: Some(writer),
            sample_rate,
            samples_written: 0,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl ToneSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CwError::Sink("wav sink already finalized".into()))?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| CwError::Sink(e.to_string()))?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| CwError::Sink(e.to_string()))?;
            info!(samples = self.samples_written, "wav sink finalized");
        }
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        // finalize() already ran if finish() was called; hound flushes
        // what it can on drop otherwise.
        let _ = self.finish();
    }
}
