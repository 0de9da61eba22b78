//! Iambic paddle keyer.
//!
//! Pure timer-driven state machine. The caller reports paddle level
//! changes via `set_dot_paddle`/`set_dash_paddle` and drives the FSM
//! with `tick(now_us)`; each element transition enqueues one mark plus
//! its inter-element gap into the bound [`Generator`].
//!
//! Squeeze behaviour: pressing the opposite paddle while an element is
//! in flight latches a memory flag, so a brief tap during a dash still
//! yields exactly one dot afterwards. When both paddles are held with
//! no memory latched, elements alternate. A fresh squeeze from idle
//! starts with a dot.

use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::generator::Generator;

/// A single keyed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Dot,
    Dash,
}

impl Element {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Element::Dot => Element::Dash,
            Element::Dash => Element::Dot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    SendingDot,
    SendingDash,
    /// Inter-element gap after a dot, re-checking paddles.
    AfterDot,
    /// Inter-element gap after a dash, re-checking paddles.
    AfterDash,
}

/// Iambic keyer bound to a generator.
///
/// Single-threaded by design; owned and driven by one caller.
pub struct Keyer {
    generator: Arc<Generator>,
    state: State,
    /// When the current element or gap ends, in the caller's timebase.
    deadline_us: u64,
    last_element: Element,
    dot_pressed: bool,
    dash_pressed: bool,
    dot_memory: bool,
    dash_memory: bool,
}

impl Keyer {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self {
            generator,
            state: State::Idle,
            deadline_us: 0,
            // Dash here makes a fresh squeeze alternate starting with
            // a dot.
            last_element: Element::Dash,
            dot_pressed: false,
            dash_pressed: false,
            dot_memory: false,
            dash_memory: false,
        }
    }

    /// Report the dot paddle level.
    pub fn set_dot_paddle(&mut self, pressed: bool) {
        self.dot_pressed = pressed;
        if pressed && self.state != State::Idle {
            self.dot_memory = true;
        }
    }

    /// Report the dash paddle level.
    pub fn set_dash_paddle(&mut self, pressed: bool) {
        self.dash_pressed = pressed;
        if pressed && self.state != State::Idle {
            self.dash_memory = true;
        }
    }

    /// `true` while an element is being keyed.
    pub fn is_keyed(&self) -> bool {
        matches!(self.state, State::SendingDot | State::SendingDash)
    }

    /// Return to idle, dropping any latched memory. Does not touch
    /// tones already enqueued downstream.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.deadline_us = 0;
        self.dot_memory = false;
        self.dash_memory = false;
    }

    /// Advance the FSM to `now_us` and return whether an element is
    /// currently keyed.
    ///
    /// # Errors
    /// `CwError::QueueFull` when the generator's queue cannot take the
    /// next element. The FSM and its memory latches are left untouched
    /// so the same transition is retried on the next tick.
    pub fn tick(&mut self, now_us: u64) -> Result<bool> {
        match self.state {
            State::Idle => {
                if let Some(element) = self.next_element() {
                    self.start_element_at(element, now_us)?;
                }
            }
            State::SendingDot | State::SendingDash => {
                if now_us >= self.deadline_us {
                    let sent = if self.state == State::SendingDot {
                        Element::Dot
                    } else {
                        Element::Dash
                    };
                    self.last_element = sent;
                    self.state = match sent {
                        Element::Dot => State::AfterDot,
                        Element::Dash => State::AfterDash,
                    };
                    // Gap runs back to back with the element, so the
                    // next deadline extends the previous one rather
                    // than the (possibly late) tick time.
                    self.deadline_us += self.generator.timing().element_gap as u64;
                }
            }
            State::AfterDot | State::AfterDash => {
                if now_us >= self.deadline_us {
                    match self.next_element() {
                        Some(element) => {
                            let at = self.deadline_us;
                            self.start_element_at(element, at)?;
                        }
                        None => {
                            self.state = State::Idle;
                        }
                    }
                }
            }
        }
        Ok(self.is_keyed())
    }

    /// Pick the next element without consuming any latch. Memory wins
    /// over live paddle state; two latched memories, or a live
    /// squeeze, alternate with the previous element.
    fn next_element(&self) -> Option<Element> {
        match (self.dot_memory, self.dash_memory) {
            (true, true) => Some(self.last_element.opposite()),
            (true, false) => Some(Element::Dot),
            (false, true) => Some(Element::Dash),
            (false, false) => match (self.dot_pressed, self.dash_pressed) {
                (true, true) => Some(self.last_element.opposite()),
                (true, false) => Some(Element::Dot),
                (false, true) => Some(Element::Dash),
                (false, false) => None,
            },
        }
    }

    fn start_element_at(&mut self, element: Element, start_us: u64) -> Result<()> {
        // Enqueue first. On QueueFull nothing below runs and the
        // pending transition survives for the next tick.
        self.generator.enqueue_mark(element == Element::Dash)?;

        let timing = self.generator.timing();
        let len = match element {
            Element::Dot => timing.dot_len,
            Element::Dash => timing.dash_len,
        };
        match element {
            Element::Dot => {
                self.dot_memory = false;
                self.state = State::SendingDot;
            }
            Element::Dash => {
                self.dash_memory = false;
                self.state = State::SendingDash;
            }
        }
        self.deadline_us = start_us + len as u64;
        trace!(?element, start_us, "keyer element");
        Ok(())
    }
}
