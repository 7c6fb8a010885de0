//! Binding of the organ message which activates the zimbelstern.
//!
//! While the device is in [`Mode::Program`](crate::mode::Mode::Program) the organist presses whichever piston or
//! draws whichever stop should control the zimbelstern, and the payload of the resulting message is captured as a
//! [`TriggerPattern`]. Afterwards, messages of the same kind are compared against it bit by bit: every bit set in the
//! trigger must also be set in the input, while extra bits in the input are ignored. This is what lets a stop trigger
//! match "this stop, among others, is drawn."

use crate::midi::{MessageKind, MidiMessage, rodgers};
use tinyvec::ArrayVec;

mod reset;
pub use reset::*;

/// Large enough for the stop bitfield of every Rodgers organ seen so far.
pub const MAX_TRIGGER_LEN: usize = 64;

/// Errors produced while matching.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchError {
    /// The input is shorter than the trigger, so some trigger bytes have nothing to be compared against.
    LengthMismatch,
}

/// Compares a trigger against an input, byte by byte.
///
/// A zero trigger byte is a wildcard. Any other byte matches when `trigger ^ (trigger & input)` is zero, i.e., when
/// the input has every bit of the trigger set. A trigger without a single nonzero byte never matches.
pub fn matches(trigger: &[u8], input: &[u8]) -> Result<bool, MatchError> {
    if input.len() < trigger.len() {
        return Err(MatchError::LengthMismatch);
    }

    let mut constrained = false;
    for (&required, &received) in trigger.iter().zip(input) {
        if required == 0 {
            continue;
        }
        constrained = true;
        if required ^ (required & received) != 0 {
            return Ok(false);
        }
    }

    Ok(constrained)
}

/// The bound activation signature: a payload and the kind of message it was captured from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerPattern {
    origin: MessageKind,
    bytes: ArrayVec<[u8; MAX_TRIGGER_LEN]>,
}

impl Default for TriggerPattern {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TriggerPattern {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "TriggerPattern {{ origin: {}, bytes: {=[u8]:x} }}", self.origin, self.bytes.as_slice());
    }
}

impl TriggerPattern {
    /// A pattern which never matches.
    pub fn empty() -> Self {
        Self {
            origin: MessageKind::Unknown,
            bytes: ArrayVec::new(),
        }
    }

    /// Constructs a pattern from its parts, e.g., when loading it from storage. Bytes beyond [`MAX_TRIGGER_LEN`] are
    /// dropped.
    pub fn new(origin: MessageKind, bytes: &[u8]) -> Self {
        if bytes.len() > MAX_TRIGGER_LEN {
            warn!("Trigger of {} bytes truncated to {}", bytes.len(), MAX_TRIGGER_LEN);
        }
        Self {
            origin,
            bytes: bytes.iter().copied().take(MAX_TRIGGER_LEN).collect(),
        }
    }

    /// Captures the payload of a message, provided it is of a kind that can serve as a trigger: a Program Change, a
    /// Control Change, or a Rodgers stop change with at least one stop drawn.
    pub fn capture(msg: &MidiMessage) -> Option<Self> {
        let payload = msg.payload();
        match msg.kind() {
            MessageKind::ProgramChange | MessageKind::ControlChange => Some(Self::new(msg.kind(), payload)),
            MessageKind::SysEx if !rodgers::all_stops_off(payload) => Some(Self::new(msg.kind(), payload)),
            _ => None,
        }
    }

    /// Returns the kind of message this pattern was captured from.
    pub fn origin(&self) -> MessageKind {
        self.origin
    }

    /// Returns the bound payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns true if the pattern contains no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if the pattern is able to match anything, i.e., it has at least one nonzero byte.
    pub fn is_armed(&self) -> bool {
        self.bytes.iter().any(|&byte| byte != 0)
    }

    /// Determines whether a message of the same kind carries every bit of this pattern.
    ///
    /// Inputs shorter than the pattern can't match and are reported rather than treated as errors.
    pub fn matches(&self, msg: &MidiMessage) -> bool {
        if msg.kind() != self.origin {
            return false;
        }
        match matches(&self.bytes, msg.payload()) {
            Ok(matched) => matched,
            Err(MatchError::LengthMismatch) => {
                warn!(
                    "Input of {} bytes is shorter than the {} byte trigger",
                    msg.payload().len(),
                    self.bytes.len()
                );
                false
            }
        }
    }
}
