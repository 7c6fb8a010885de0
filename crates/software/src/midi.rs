//! Classification of the raw byte batches delivered by the MIDI serial port.
//!
//! The transport hands over whatever bytes arrived since the last read. No running-status reassembly is attempted:
//! each batch is treated as exactly one logical message, which holds for the organs this device is installed on
//! because they send one message per burst.

use num_derive::{FromPrimitive, ToPrimitive};
use wmidi::{Channel, U7};

pub mod rodgers;

/// System real-time message organs send every ~300 ms to signal that the connection is alive.
pub const ACTIVE_SENSING: u8 = 0xFE;

/// The message Rodgers organs send when the General Cancel piston is pressed (Program Change 20, channel 12).
pub const GENERAL_CANCEL: [u8; 2] = [0xCB, 0x13];

/// The category of a [`MidiMessage`], as far as this device cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    /// A key was struck (velocity above zero).
    NoteOn,
    /// Sent by coupler and toggle pistons, among other things.
    ControlChange,
    /// Sent by numbered registration pistons.
    ProgramChange,
    /// A manufacturer-specific message framed by `0xF0 … 0xF7`; Rodgers organs report stop states this way.
    SysEx,
    /// Anything else, including truncated messages.
    Unknown,
}

/// A classified inbound message. It borrows the batch it was read from and is not meant to outlive it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MidiMessage<'a> {
    kind: MessageKind,
    bytes: &'a [u8],
}

/// Categorizes one raw batch. Returns `None` for batches carrying nothing but Active Sensing.
///
/// A leading Active Sensing byte is stripped before classification since the organ is free to interleave it with
/// any other message. Rules are evaluated in order and the first match wins.
pub fn classify(batch: &[u8]) -> Option<MidiMessage<'_>> {
    let bytes = match batch {
        [] | [ACTIVE_SENSING] => return None,
        [ACTIVE_SENSING, rest @ ..] => rest,
        _ => batch,
    };

    let kind = match bytes {
        [status, _, velocity, ..] if status & 0xF0 == 0x90 && *velocity > 0 => MessageKind::NoteOn,
        [status, _, ..] if status & 0xF0 == 0xB0 => MessageKind::ControlChange,
        [status, _, ..] if status & 0xF0 == 0xC0 => MessageKind::ProgramChange,
        [0xF0, .., 0xF7] => MessageKind::SysEx,
        _ => MessageKind::Unknown,
    };

    Some(MidiMessage { kind, bytes })
}

impl<'a> MidiMessage<'a> {
    /// Returns the category of the message.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the message bytes, minus any Active Sensing byte that preceded them.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns the bytes a trigger is bound to and compared against.
    ///
    /// For channel messages this is everything after the status byte, which drops the channel nibble along with it.
    /// For SysEx it is the stop-state bitfield of a Rodgers stop change; other SysEx messages have no payload.
    pub fn payload(&self) -> &'a [u8] {
        match self.kind {
            MessageKind::NoteOn | MessageKind::ControlChange | MessageKind::ProgramChange => &self.bytes[1..],
            MessageKind::SysEx => match rodgers::parse(self.bytes) {
                rodgers::SysEx::StopChange(stops) => stops,
                _ => &[],
            },
            MessageKind::Unknown => &[],
        }
    }

    /// Decodes a channel message into its [`wmidi`] representation, e.g., to report its channel.
    pub fn decode(&self) -> Option<wmidi::MidiMessage<'a>> {
        let len = match self.kind {
            MessageKind::NoteOn | MessageKind::ControlChange => 3,
            MessageKind::ProgramChange => 2,
            MessageKind::SysEx | MessageKind::Unknown => return None,
        };
        wmidi::MidiMessage::try_from(&self.bytes[..len.min(self.bytes.len())]).ok()
    }

    /// Returns the channel of a channel message.
    pub fn channel(&self) -> Option<Channel> {
        self.decode().and_then(|msg| msg.channel())
    }

    /// Determines whether this is the organ's General Cancel.
    pub fn is_general_cancel(&self) -> bool {
        matches!(
            self.decode(),
            Some(wmidi::MidiMessage::ProgramChange(channel, program))
                if channel.index() == (GENERAL_CANCEL[0] & 0x0F) && program == U7::from_u8_lossy(GENERAL_CANCEL[1])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(batch: &[u8]) -> Option<MessageKind> {
        classify(batch).map(|msg| msg.kind())
    }

    #[test]
    fn lone_active_sensing_is_dropped() {
        assert_eq!(None, kind_of(&[0xFE]));
        assert_eq!(None, kind_of(&[]));
    }

    #[test]
    fn leading_active_sensing_is_stripped() {
        let msg = classify(&[0xFE, 0xC3, 0x07]).unwrap();
        assert_eq!(MessageKind::ProgramChange, msg.kind());
        assert_eq!(&[0xC3, 0x07][..], msg.bytes(), "Expected left but got right");
    }

    #[test]
    fn note_on() {
        assert_eq!(Some(MessageKind::NoteOn), kind_of(&[0x90, 60, 100]));
        assert_eq!(Some(MessageKind::NoteOn), kind_of(&[0x9F, 60, 1]));
    }

    #[test]
    fn note_on_without_velocity_is_not_a_note_on() {
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0x90, 60, 0]));
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0x90, 60]));
    }

    #[test]
    fn note_off_is_unknown() {
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0x80, 60, 64]));
    }

    #[test]
    fn control_change() {
        assert_eq!(Some(MessageKind::ControlChange), kind_of(&[0xBD, 7, 127]));
        assert_eq!(Some(MessageKind::ControlChange), kind_of(&[0xB0, 7]));
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0xB0]));
    }

    #[test]
    fn program_change() {
        assert_eq!(Some(MessageKind::ProgramChange), kind_of(&[0xC3, 0x07]));
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0xC3]));
    }

    #[test]
    fn sysex() {
        assert_eq!(Some(MessageKind::SysEx), kind_of(&[0xF0, 0xF7]));
        assert_eq!(Some(MessageKind::SysEx), kind_of(&[0xF0, 0x41, 0x00, 0xF7]));
        assert_eq!(Some(MessageKind::Unknown), kind_of(&[0xF0, 0x41, 0x00]));
    }

    #[test]
    fn channel_message_payload_excludes_status() {
        let msg = classify(&[0xC3, 0x07]).unwrap();
        assert_eq!(&[0x07][..], msg.payload(), "Expected left but got right");

        let msg = classify(&[0xB2, 0x07, 0x7F]).unwrap();
        assert_eq!(&[0x07, 0x7F][..], msg.payload(), "Expected left but got right");
    }

    #[test]
    fn unknown_has_no_payload() {
        let msg = classify(&[0x80, 60, 64]).unwrap();
        assert!(msg.payload().is_empty());
    }

    #[test]
    fn channel() {
        let msg = classify(&[0xC3, 0x07]).unwrap();
        assert_eq!(Some(Channel::Ch4), msg.channel());
        assert_eq!(None, classify(&[0xF0, 0xF7]).unwrap().channel());
    }

    #[test]
    fn general_cancel() {
        assert!(classify(&GENERAL_CANCEL).unwrap().is_general_cancel());
        assert!(!classify(&[0xCB, 0x12]).unwrap().is_general_cancel());
        assert!(!classify(&[0xCA, 0x13]).unwrap().is_general_cancel());
    }
}
