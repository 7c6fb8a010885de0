//! Extraction of stop states from the System Exclusive messages of Rodgers organs.
//!
//! A stop change looks like this:
//!
//! ```text
//! F0 41 10 30 12 | 01  | 00     | 08 00 00 … | 77       | F7
//! header         | sub | offset | stops      | checksum | end
//! ```
//!
//! Each stop is one bit of the stop bitfield; e.g., bit 3 of the first byte is the Great 8' Principal on a Rodgers 702.

/// SysEx start, Roland/Rodgers manufacturer ID, device ID, model ID (organ), Data Set command.
pub const HEADER: [u8; 5] = [0xF0, 0x41, 0x10, 0x30, 0x12];

/// Subcommand reporting the state of every stop.
pub const STOP_CHANGE: u8 = 0x01;

/// Subcommand dumping the combination memory.
pub const MEMORY_DUMP: u8 = 0x03;

/// Header, subcommand, offset, checksum, and end byte.
const FRAMING_LEN: usize = HEADER.len() + 4;

/// The interpretation of a SysEx message.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysEx<'a> {
    /// Carries the stop bitfield.
    StopChange(&'a [u8]),
    /// Recognized but not supported.
    MemoryDump,
    /// A Rodgers message with a subcommand this device doesn't know.
    UnsupportedSubcommand(u8),
    /// A Rodgers message that is too short or whose checksum doesn't add up.
    Malformed,
    /// Not a Rodgers message.
    UnsupportedManufacturer,
}

/// Interprets a complete SysEx message, including its `0xF0` and `0xF7` framing bytes.
pub fn parse(bytes: &[u8]) -> SysEx<'_> {
    if !bytes.starts_with(&HEADER) {
        warn!("Unsupported SysEx manufacturer: {=[u8]:x}", bytes);
        return SysEx::UnsupportedManufacturer;
    }
    if bytes.len() < FRAMING_LEN {
        warn!("Rodgers SysEx too short: {=[u8]:x}", bytes);
        return SysEx::Malformed;
    }

    let body = &bytes[HEADER.len()..bytes.len() - 2];
    let checksum = bytes[bytes.len() - 2];
    if roland_checksum(body) != checksum {
        warn!("Rodgers SysEx checksum mismatch: {=[u8]:x}", bytes);
        return SysEx::Malformed;
    }

    let (subcommand, offset, stops) = (body[0], body[1], &body[2..]);
    match subcommand {
        STOP_CHANGE => {
            if offset != 0 {
                warn!("Stop change offset {} is unsupported; reading stops from the start", offset);
            }
            SysEx::StopChange(stops)
        }
        MEMORY_DUMP => {
            info!("Rodgers memory dump is unsupported");
            SysEx::MemoryDump
        }
        other => {
            warn!("Unsupported Rodgers subcommand {=u8:x}", other);
            SysEx::UnsupportedSubcommand(other)
        }
    }
}

/// Returns true iff no stop in the bitfield is engaged.
pub fn all_stops_off(stops: &[u8]) -> bool {
    stops.iter().all(|&byte| byte == 0)
}

/// The Roland checksum: whatever brings the 7-bit sum of address and data to zero.
fn roland_checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte)) & 0x7F;
    (0x80 - sum) & 0x7F
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stop change as captured from a Rodgers 702 with only the Great 8' Principal drawn.
    fn principal_drawn() -> [u8; 50] {
        let mut msg = [0u8; 50];
        msg[..7].copy_from_slice(&[0xF0, 0x41, 0x10, 0x30, 0x12, STOP_CHANGE, 0x00]);
        msg[7] = 0x08;
        msg[48] = 0x77;
        msg[49] = 0xF7;
        msg
    }

    #[test]
    fn stop_change_payload() {
        let msg = principal_drawn();
        match parse(&msg) {
            SysEx::StopChange(stops) => {
                assert_eq!(41, stops.len());
                assert_eq!(0x08, stops[0]);
                assert!(stops[1..].iter().all(|&b| b == 0));
            }
            other => panic!("Expected a stop change, got {:?}", other),
        }
    }

    #[test]
    fn empty_stop_change() {
        let msg = [0xF0, 0x41, 0x10, 0x30, 0x12, STOP_CHANGE, 0x00, 0x7F, 0xF7];
        assert_eq!(SysEx::StopChange(&[]), parse(&msg));
    }

    #[test]
    fn memory_dump() {
        let msg = [0xF0, 0x41, 0x10, 0x30, 0x12, MEMORY_DUMP, 0x00, 0x01, 0x7C, 0xF7];
        assert_eq!(SysEx::MemoryDump, parse(&msg));
    }

    #[test]
    fn unsupported_subcommand() {
        let msg = [0xF0, 0x41, 0x10, 0x30, 0x12, 0x05, 0x00, 0x7B, 0xF7];
        assert_eq!(SysEx::UnsupportedSubcommand(0x05), parse(&msg));
    }

    #[test]
    fn unsupported_manufacturer() {
        let msg = [0xF0, 0x43, 0x10, 0x30, 0x12, STOP_CHANGE, 0x00, 0x7F, 0xF7];
        assert_eq!(SysEx::UnsupportedManufacturer, parse(&msg));
    }

    #[test]
    fn bad_checksum_is_malformed() {
        let mut msg = principal_drawn();
        msg[48] = 0x78;
        assert_eq!(SysEx::Malformed, parse(&msg));
    }

    #[test]
    fn truncated_is_malformed() {
        assert_eq!(SysEx::Malformed, parse(&[0xF0, 0x41, 0x10, 0x30, 0x12, 0xF7]));
    }

    #[test]
    fn stops_off() {
        assert!(all_stops_off(&[0, 0, 0]));
        assert!(all_stops_off(&[]));
        assert!(!all_stops_off(&[0, 0x40, 0]));
    }
}
