//! Detection of the burst of messages an organ sends while powering up.
//!
//! The burst is spread over several reads, so it is searched for in a rolling history of recently received bytes
//! rather than in any one batch.

use tinyvec::ArrayVec;

/// Sent by a Rodgers T788E when it is switched on: three Control Changes for expression (CC 7) on channels 12–14,
/// cycled off, on, and off again.
pub const ORGAN_RESET_SEQUENCE: [u8; 27] = [
    0xBD, 7, 0, 0xBC, 7, 0, 0xBB, 7, 0, //
    0xBD, 7, 127, 0xBC, 7, 127, 0xBB, 7, 127, //
    0xBB, 7, 0, 0xBC, 7, 0, 0xBD, 7, 0,
];

/// Number of received bytes retained.
pub const HISTORY_LEN: usize = 100;

/// Keeps the most recent [`HISTORY_LEN`] bytes and looks for [`ORGAN_RESET_SEQUENCE`] in them.
#[derive(Clone, Debug, Default)]
pub struct ResetDetector {
    history: ArrayVec<[u8; HISTORY_LEN]>,
}

impl ResetDetector {
    /// Constructs an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch to the history, discarding the oldest bytes as needed, and reports whether the history now
    /// contains the reset sequence.
    ///
    /// The history is emptied on detection so that a single power-up is reported only once.
    pub fn observe(&mut self, bytes: &[u8]) -> bool {
        let overflow = (self.history.len() + bytes.len()).saturating_sub(HISTORY_LEN);
        if overflow >= self.history.len() {
            self.history.clear();
        } else {
            self.history.drain(..overflow).for_each(drop);
        }
        let kept = bytes.len().min(HISTORY_LEN);
        self.history.extend_from_slice(&bytes[bytes.len() - kept..]);

        let detected = self
            .history
            .windows(ORGAN_RESET_SEQUENCE.len())
            .any(|window| window == ORGAN_RESET_SEQUENCE);
        if detected {
            self.history.clear();
        }
        detected
    }

    /// Returns the retained bytes, oldest first.
    pub fn history(&self) -> &[u8] {
        &self.history
    }
}
