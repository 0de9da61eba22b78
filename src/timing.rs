//! Element timing derived from speed, weighting and Farnsworth gap.
//!
//! All durations are microseconds. The calibration constant ties WPM to
//! dot length through the standard PARIS word: a dot at `w` WPM lasts
//! `1_200_000 / w` microseconds.

use tracing::debug;

/// Dot length at 1 WPM, in microseconds (PARIS calibration).
pub const DOT_CALIBRATION: u32 = 1_200_000;

pub const SPEED_MIN: u32 = 4;
pub const SPEED_MAX: u32 = 60;
pub const SPEED_INITIAL: u32 = 12;

pub const FREQUENCY_MIN: u32 = 0;
pub const FREQUENCY_MAX: u32 = 4_000;
pub const FREQUENCY_INITIAL: u32 = 800;

pub const VOLUME_MIN: u32 = 0;
pub const VOLUME_MAX: u32 = 100;
pub const VOLUME_INITIAL: u32 = 70;

pub const GAP_MIN: u32 = 0;
pub const GAP_MAX: u32 = 60;
pub const GAP_INITIAL: u32 = 0;

pub const WEIGHTING_MIN: u32 = 20;
pub const WEIGHTING_MAX: u32 = 80;
pub const WEIGHTING_INITIAL: u32 = 50;

pub const TOLERANCE_MIN: u32 = 0;
pub const TOLERANCE_MAX: u32 = 90;
pub const TOLERANCE_INITIAL: u32 = 50;

/// Derived element durations, recomputed whenever speed, gap or
/// weighting changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingTable {
    /// Length of one dot mark.
    pub dot_len: u32,
    /// Length of one dash mark (three weighted dots).
    pub dash_len: u32,
    /// Silence between marks within a character.
    pub element_gap: u32,
    /// Additional silence after a character, beyond the element gap
    /// already sent with the last mark.
    pub char_gap: u32,
    /// Additional silence after a word, beyond the character gap.
    pub word_gap: u32,
    /// Farnsworth padding appended to each character gap.
    pub additional_gap: u32,
    /// Farnsworth padding appended to each word gap.
    pub adjustment_gap: u32,
}

impl TimingTable {
    /// Compute the table for the given speed/gap/weighting settings.
    ///
    /// Weighting shifts duration from spaces into marks: at 50 % a dot
    /// and its trailing gap are one unit each; heavier weighting makes
    /// marks longer and gaps correspondingly shorter, keeping the
    /// overall character rate fixed. The Farnsworth `gap` setting pads
    /// character and word gaps without touching element timing.
    pub fn compute(speed_wpm: u32, gap: u32, weighting: u32) -> Self {
        let unit = (DOT_CALIBRATION / speed_wpm) as i64;
        let w = 2 * (weighting as i64 - 50) * unit / 100;

        let dot_len = unit + w;
        let dash_len = 3 * dot_len;
        let element_gap = unit - (28 * w) / 22;
        let char_gap = 3 * unit - element_gap;
        let word_gap = 7 * unit - char_gap;
        let additional_gap = gap as i64 * unit;
        let adjustment_gap = (7 * additional_gap) / 3;

        let table = Self {
            dot_len: dot_len as u32,
            dash_len: dash_len as u32,
            element_gap: element_gap as u32,
            char_gap: char_gap as u32,
            word_gap: word_gap as u32,
            additional_gap: additional_gap as u32,
            adjustment_gap: adjustment_gap as u32,
        };

        debug!(
            speed_wpm,
            gap,
            weighting,
            dot = table.dot_len,
            dash = table.dash_len,
            element_gap = table.element_gap,
            char_gap = table.char_gap,
            word_gap = table.word_gap,
            "timing table recomputed"
        );

        table
    }

    /// Inter-character silence as enqueued (includes Farnsworth padding).
    pub fn enqueued_char_gap(&self) -> u32 {
        self.char_gap + self.additional_gap
    }

    /// Inter-word silence as enqueued (includes Farnsworth padding).
    pub fn enqueued_word_gap(&self) -> u32 {
        self.word_gap + self.adjustment_gap
    }
}

impl Default for TimingTable {
    fn default() -> Self {
        Self::compute(SPEED_INITIAL, GAP_INITIAL, WEIGHTING_INITIAL)
    }
}
