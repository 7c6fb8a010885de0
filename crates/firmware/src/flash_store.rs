//! Keeps the trigger records in the last two sectors of the internal flash.
//!
//! Each record gets a 256 KiB sector to itself (sectors 10 and 11 in single-bank mode), which is wasteful but
//! means replacing one record never puts the other at risk. A sector holds a length byte followed by the record;
//! an erased sector reads as `0xFF`, which no record length can be.
//!
//! Erasing a sector stalls the CPU for up to a couple of seconds. That only happens when a trigger is captured,
//! cleared, or reset, at which point nothing is running.

use defmt::*;
use embassy_stm32::flash::{self, Blocking, Flash, WRITE_SIZE};
use zimbelstern_lib::persistence::{KeyValueStore, MAX_RECORD_LEN, Record};

/// Offset of sector 10 from the start of flash.
const TRIGGER_SECTOR: u32 = 0x18_0000;
/// Offset of sector 11 from the start of flash.
const SCRATCH_SECTOR: u32 = 0x1C_0000;
const SECTOR_SIZE: u32 = 0x4_0000;

const ERASED: u8 = 0xFF;

/// Length byte plus record, padded to whole write units.
const BUF_LEN: usize = (MAX_RECORD_LEN + 1).next_multiple_of(WRITE_SIZE);

/// [`KeyValueStore`] backed by the internal flash.
pub struct FlashStore {
    flash: Flash<'static, Blocking>,
}

impl FlashStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }
}

fn sector(record: Record) -> u32 {
    match record {
        Record::Trigger => TRIGGER_SECTOR,
        Record::TriggerScratch => SCRATCH_SECTOR,
    }
}

impl KeyValueStore for FlashStore {
    type Error = flash::Error;

    fn read(&mut self, record: Record, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let offset = sector(record);
        let mut len = [ERASED];
        self.flash.blocking_read(offset, &mut len)?;

        let len = match len[0] {
            ERASED => return Ok(None),
            len => usize::from(len),
        };
        if len > buf.len() {
            warn!("Stored {} record of {} bytes exceeds the buffer", record, len);
            return Err(flash::Error::Size);
        }

        self.flash.blocking_read(offset + 1, &mut buf[..len])?;
        Ok(Some(len))
    }

    fn write(&mut self, record: Record, bytes: &[u8]) -> Result<(), Self::Error> {
        if bytes.len() >= BUF_LEN || bytes.len() >= usize::from(ERASED) {
            return Err(flash::Error::Size);
        }

        let mut buf = [ERASED; BUF_LEN];
        buf[0] = bytes.len() as u8;
        buf[1..=bytes.len()].copy_from_slice(bytes);
        let len = (bytes.len() + 1).next_multiple_of(WRITE_SIZE);

        self.remove(record)?;
        let offset = sector(record);
        self.flash.blocking_write(offset, &buf[..len])?;
        debug!("Wrote {} bytes of {} record at {:#x}", len, record, offset);
        Ok(())
    }

    fn remove(&mut self, record: Record) -> Result<(), Self::Error> {
        let offset = sector(record);
        self.flash.blocking_erase(offset, offset + SECTOR_SIZE)
    }
}
