//! Receive-side decoder.
//!
//! The caller feeds key-down/key-up edges as `mark_start(t)` and
//! `mark_end(t)` timestamps; the receiver classifies mark and space
//! durations against a dot-length estimate, accumulates a dot/dash
//! representation and resolves it to characters on inter-character
//! gaps.
//!
//! Two tracking modes:
//! - **fixed**: the dot-length estimate never changes after
//!   construction; marks are accepted within a tolerance band around
//!   the ideal dot and dash lengths.
//! - **adaptive**: every mark classified as a dot is folded into an
//!   exponential moving average of the dot length, so the decoder
//!   follows a sender whose speed drifts.

use std::collections::VecDeque;

use crossbeam_channel::{unbounded, Receiver as ChannelReceiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::charset;
use crate::error::{CwError, Result};
use crate::generator::MAX_REPRESENTATION_LENGTH;
use crate::timing::DOT_CALIBRATION;

/// Default noise spike threshold in microseconds. Marks shorter than
/// this are treated as contact bounce, not elements.
pub const NOISE_SPIKE_THRESHOLD_DEFAULT: u32 = 10_000;

/// Default EMA weight for adaptive tracking.
pub const EMA_WEIGHT_DEFAULT: f64 = 0.2;

/// A classified mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }
}

/// A decode event published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decoded {
    Character(char),
    WordBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InMark,
    InSpace,
}

/// Receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Starting dot-length estimate in microseconds.
    pub initial_dot_len_us: u32,
    /// Mark tolerance in percent (0–90), used in fixed mode.
    pub tolerance_pct: u32,
    /// Marks shorter than this are rejected as noise.
    pub noise_spike_threshold_us: u32,
    /// Track the sender's speed with an EMA of dot lengths.
    pub adaptive: bool,
    /// EMA update weight, in (0, 1].
    pub ema_weight: f64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            initial_dot_len_us: DOT_CALIBRATION / 12,
            tolerance_pct: 50,
            noise_spike_threshold_us: NOISE_SPIKE_THRESHOLD_DEFAULT,
            adaptive: false,
            ema_weight: EMA_WEIGHT_DEFAULT,
        }
    }
}

impl ReceiverConfig {
    /// Config for a known sending speed in WPM.
    pub fn for_speed(wpm: u32) -> Self {
        Self {
            initial_dot_len_us: DOT_CALIBRATION / wpm.max(1),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_dot_len_us == 0 {
            return Err(CwError::InvalidParameter {
                name: "initial_dot_len_us",
                value: 0,
            });
        }
        if self.tolerance_pct > 90 {
            return Err(CwError::InvalidParameter {
                name: "tolerance_pct",
                value: self.tolerance_pct as i64,
            });
        }
        if !(self.ema_weight > 0.0 && self.ema_weight <= 1.0) {
            return Err(CwError::InvalidParameter {
                name: "ema_weight",
                value: (self.ema_weight * 1_000.0) as i64,
            });
        }
        Ok(())
    }
}

/// Morse decoder driven by mark edge timestamps.
pub struct Receiver {
    config: ReceiverConfig,
    state: State,
    /// Dot-length estimate in µs. Kept as f64 so small EMA updates
    /// are not lost to truncation.
    dot_estimate: f64,
    representation: String,
    mark_start_us: u64,
    last_mark_end_us: u64,
    pending: VecDeque<char>,
    subscribers: Vec<Sender<Decoded>>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let dot_estimate = config.initial_dot_len_us as f64;
        Ok(Self {
            config,
            state: State::Idle,
            dot_estimate,
            representation: String::new(),
            mark_start_us: 0,
            last_mark_end_us: 0,
            pending: VecDeque::new(),
            subscribers: Vec::new(),
        })
    }

    /// Current dot-length estimate in microseconds.
    pub fn dot_len_estimate_us(&self) -> u32 {
        self.dot_estimate as u32
    }

    /// The representation accumulated so far, as a dot/dash string.
    pub fn representation(&self) -> &str {
        &self.representation
    }

    /// Register a channel that receives every decode event.
    pub fn subscribe(&mut self) -> ChannelReceiver<Decoded> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Discard in-progress state and pending output. The dot-length
    /// estimate survives a reset.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.representation.clear();
        self.mark_start_us = 0;
        self.last_mark_end_us = 0;
        self.pending.clear();
    }

    /// Key-down edge at `timestamp_us`.
    ///
    /// Classifies the space since the previous `mark_end`: short
    /// spaces separate elements, medium spaces finalize the current
    /// character, long spaces additionally emit a word boundary.
    ///
    /// # Errors
    /// `CwError::OutOfSequence` when a mark is already open.
    pub fn mark_start(&mut self, timestamp_us: u64) -> Result<()> {
        match self.state {
            State::InMark => return Err(CwError::OutOfSequence),
            State::Idle => {}
            State::InSpace => {
                let space = timestamp_us.saturating_sub(self.last_mark_end_us);
                let dot = self.dot_estimate;
                if space as f64 <= 2.0 * dot {
                    // Inter-element space, stay within the character.
                } else if space as f64 <= 5.0 * dot {
                    self.finalize_character();
                } else {
                    self.finalize_character();
                    self.emit_word_boundary();
                }
            }
        }
        self.mark_start_us = timestamp_us;
        self.state = State::InMark;
        Ok(())
    }

    /// Key-up edge at `timestamp_us`.
    ///
    /// # Errors
    /// `CwError::OutOfSequence` when no mark is open;
    /// `CwError::NoiseSpike` for marks below the noise threshold (the
    /// mark is dropped as if it never started);
    /// `CwError::TimingError` for durations outside tolerance;
    /// `CwError::RepresentationTooLong` when the character would grow
    /// past the supported maximum.
    pub fn mark_end(&mut self, timestamp_us: u64) -> Result<()> {
        if self.state != State::InMark {
            return Err(CwError::OutOfSequence);
        }
        let duration = timestamp_us.saturating_sub(self.mark_start_us) as u32;

        if duration <= self.config.noise_spike_threshold_us {
            // Forget the spurious key-down. The previous space, if
            // any, is still open.
            self.state = if self.last_mark_end_us == 0 && self.representation.is_empty() {
                State::Idle
            } else {
                State::InSpace
            };
            return Err(CwError::NoiseSpike {
                duration_us: duration,
            });
        }

        let symbol = self.identify_mark(duration)?;

        if self.representation.len() >= MAX_REPRESENTATION_LENGTH {
            return Err(CwError::RepresentationTooLong {
                max: MAX_REPRESENTATION_LENGTH,
            });
        }
        self.representation.push(symbol.as_char());

        // Dashes carry no speed information a dot does not; folding
        // them in would drag the estimate toward 3x.
        if self.config.adaptive && symbol == Symbol::Dot {
            let w = self.config.ema_weight;
            self.dot_estimate += w * (duration as f64 - self.dot_estimate);
        }

        self.last_mark_end_us = timestamp_us;
        self.state = State::InSpace;
        Ok(())
    }

    /// Classify one mark duration against the current dot estimate.
    ///
    /// Pure with respect to FSM state; a failed classification leaves
    /// the receiver exactly as it was.
    pub fn identify_mark(&self, duration_us: u32) -> Result<Symbol> {
        let d = duration_us as f64;
        let dot = self.dot_estimate;

        if self.config.adaptive {
            // Single split at 2 dots, ceiling at 7.
            if d <= 2.0 * dot {
                return Ok(Symbol::Dot);
            }
            if d <= 7.0 * dot {
                return Ok(Symbol::Dash);
            }
        } else {
            let band = dot * self.config.tolerance_pct as f64 / 100.0;
            if (d - dot).abs() <= band {
                return Ok(Symbol::Dot);
            }
            if (d - 3.0 * dot).abs() <= band {
                return Ok(Symbol::Dash);
            }
        }
        Err(CwError::TimingError {
            duration_us,
        })
    }

    /// Next decoded character, if one has been finalized. A word
    /// boundary is reported as a space character following the word's
    /// last character.
    pub fn poll_character(&mut self) -> Option<char> {
        self.pending.pop_front()
    }

    fn finalize_character(&mut self) {
        if self.representation.is_empty() {
            return;
        }
        match charset::character_of(&self.representation) {
            Some(c) => {
                debug!(representation = %self.representation, character = %c, "decoded");
                self.pending.push_back(c);
                self.publish(Decoded::Character(c));
            }
            None => {
                warn!(representation = %self.representation, "unknown representation");
            }
        }
        self.representation.clear();
    }

    fn emit_word_boundary(&mut self) {
        self.pending.push_back(' ');
        self.publish(Decoded::WordBoundary);
    }

    fn publish(&mut self, event: Decoded) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}
