//! Audio playback sink via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread at elevated
//! priority. It must not allocate, block on a lock, or perform I/O.
//! The callback therefore only drains a lock-free SPSC ring buffer;
//! the generator's consumer thread fills it through
//! [`CpalSink::write`], which provides the real-time back-pressure.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows,
//! CoreAudio on macOS). The stream is therefore created and dropped on
//! a dedicated thread owned by this sink, and only the ring producer
//! crosses into the generator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use crossbeam_channel::bounded;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{error, info};

use super::ToneSink;
use crate::error::{CwError, Result};

/// Ring capacity in samples: one second at 48 kHz. Small enough that
/// stop() does not leave seconds of buffered audio playing.
const RING_CAPACITY: usize = 48_000;

/// How long `write` sleeps when the ring is full.
const FULL_BACKOFF: Duration = Duration::from_millis(2);

pub struct CpalSink {
    producer: ringbuf::HeapProd<f32>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device.
    ///
    /// Blocks until the stream is confirmed playing (or failed).
    pub fn open_default() -> Result<Self> {
        let (producer, mut consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let running = Arc::new(AtomicBool::new(true));

        // The stream thread reports its negotiated rate (or an error)
        // back through this channel before parking.
        let (open_tx, open_rx) = bounded::<Result<u32>>(1);

        let thread_running = Arc::clone(&running);
        let stream_thread = thread::Builder::new()
            .name("cw-audio-out".into())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_output_device() else {
                    let _ = open_tx.send(Err(CwError::Sink(
                        "no default output device".into(),
                    )));
                    return;
                };

                let supported = match device.default_output_config() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = open_tx.send(Err(CwError::Sink(e.to_string())));
                        return;
                    }
                };
                let sample_rate = supported.sample_rate().0;
                let channels = supported.channels() as usize;

                info!(
                    device = device.name().unwrap_or_default().as_str(),
                    sample_rate, channels, "opening output device"
                );

                let config = StreamConfig {
                    channels: channels as u16,
                    sample_rate: SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _info| {
                        // Mono ring fanned out to every channel;
                        // underruns are filled with silence.
                        for frame in data.chunks_mut(channels) {
                            let sample = consumer.try_pop().unwrap_or(0.0);
                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                );

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = open_tx.send(Err(CwError::Sink(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = open_tx.send(Err(CwError::Sink(e.to_string())));
                    return;
                }
                let _ = open_tx.send(Ok(sample_rate));

                // Keep the stream alive on this thread until close.
                while thread_running.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| CwError::Sink(e.to_string()))?;

        let sample_rate = match open_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                running.store(false, Ordering::Release);
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                running.store(false, Ordering::Release);
                let _ = stream_thread.join();
                return Err(CwError::Sink("audio thread died during open".into()));
            }
        };

        Ok(Self {
            producer,
            sample_rate,
            running,
            stream_thread: Some(stream_thread),
        })
    }
}

impl ToneSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let mut offset = 0;
        while offset < samples.len() {
            let pushed = self.producer.push_slice(&samples[offset..]);
            offset += pushed;
            if offset < samples.len() {
                if !self.running.load(Ordering::Acquire) {
                    return Err(CwError::Sink("audio stream closed".into()));
                }
                thread::sleep(FULL_BACKOFF);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Let queued audio drain before tearing the stream down.
        while self.producer.occupied_len() > 0 && self.running.load(Ordering::Acquire) {
            thread::sleep(FULL_BACKOFF);
        }
        Ok(())
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}
