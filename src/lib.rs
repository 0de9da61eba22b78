//! # cwkit
//!
//! A CW (Morse code) signal engine: precisely timed keying and audio.
//!
//! ## Architecture
//!
//! ```text
//! enqueue_string/character ─┐
//! Keyer::tick (paddles) ────┤
//!                           ▼
//!                      ToneQueue (bounded ring, one lock)
//!                           │ dequeue_or_wait
//!                           ▼
//!              Generator consumer thread
//!              (envelope synthesis, phase-continuous sine)
//!                           │ write / key
//!                           ▼
//!                       ToneSink (null / WAV / cpal)
//!
//! mark_start/mark_end timestamps ──► Receiver ──► poll_character()
//! ```
//!
//! The queue lock is held only for O(1) index updates; all rendering
//! happens on the consumer thread between dequeues.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod charset;
pub mod error;
pub mod generator;
pub mod keyer;
pub mod queue;
pub mod receiver;
pub mod sink;
pub mod timing;
pub mod tone;

// Convenience re-exports for downstream crates
pub use error::{CwError, Result};
pub use generator::{Generator, GeneratorConfig};
pub use keyer::Keyer;
pub use queue::ToneQueue;
pub use receiver::{Decoded, Receiver, ReceiverConfig, Symbol};
pub use sink::{NullSink, ToneSink, WavSink};
pub use tone::{SlopeMode, SlopeShape, Tone};

#[cfg(feature = "audio-cpal")]
pub use sink::CpalSink;
