//! Storage of the captured trigger across power cycles.
//!
//! The backing medium is abstracted as a [`KeyValueStore`] holding a handful of small records. A record is written in
//! full or not at all as far as this module can tell, but the medium itself gives no such promise: power may fail at
//! any point of a flash write. [`TriggerStore`] therefore never overwrites the only good copy of the trigger. It
//! commits to [`Record::TriggerScratch`] first, then to [`Record::Trigger`], and only then discards the scratch copy.
//!
//! Records are framed as follows:
//!
//! ```text
//! 5A    | kind | len | payload … | checksum
//! magic |      |     | len bytes | XOR of everything before it
//! ```

use crate::{
    midi::MessageKind,
    trigger::{MAX_TRIGGER_LEN, TriggerPattern},
};
use num_traits::{FromPrimitive, ToPrimitive};

/// Identifies a framed record.
const MAGIC: u8 = 0x5A;

/// Magic, kind, and length up front, checksum at the end.
const OVERHEAD: usize = 4;

/// The size of the largest record [`TriggerStore`] reads or writes.
pub const MAX_RECORD_LEN: usize = MAX_TRIGGER_LEN + OVERHEAD;

/// Keys of the records this device keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Record {
    /// The committed trigger.
    Trigger,
    /// A trigger in the process of being committed.
    TriggerScratch,
}

/// Opaque persistence of whole records.
pub trait KeyValueStore {
    /// Errors raised by the backing medium.
    type Error;

    /// Copies a record into `buf`, returning its length, or `None` if the record doesn't exist.
    fn read(&mut self, record: Record, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    /// Replaces a record.
    fn write(&mut self, record: Record, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Deletes a record. Deleting a record that doesn't exist is not an error.
    fn remove(&mut self, record: Record) -> Result<(), Self::Error>;
}

/// Errors produced by [`TriggerStore`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    /// The backing medium failed.
    Backend(E),
    /// A record exists, but its framing or checksum is wrong and no intact copy was found.
    Corrupt,
    /// The backend reported a record larger than any that could have been written.
    TooLong,
}

impl<E> From<E> for StoreError<E> {
    fn from(err: E) -> Self {
        Self::Backend(err)
    }
}

/// Saves and loads the [`TriggerPattern`].
#[derive(Debug)]
pub struct TriggerStore<S> {
    backend: S,
}

impl<S: KeyValueStore> TriggerStore<S> {
    /// Wraps a backend.
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Persists a trigger.
    ///
    /// On success the trigger is in [`Record::Trigger`]. On failure the previously committed trigger is either still
    /// intact or recoverable from [`Record::TriggerScratch`] by the next [`load`](Self::load).
    pub fn save(&mut self, trigger: &TriggerPattern) -> Result<(), StoreError<S::Error>> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = encode(trigger, &mut buf);

        self.backend.write(Record::TriggerScratch, &buf[..len])?;
        self.backend.write(Record::Trigger, &buf[..len])?;
        if self.backend.remove(Record::TriggerScratch).is_err() {
            // harmless: a stale scratch record is only consulted when the primary is unusable, and it matches anyway
            warn!("Unable to remove the scratch trigger record");
        }

        Ok(())
    }

    /// Loads the committed trigger, or `None` if none was ever saved.
    ///
    /// A primary record that is missing or damaged is repaired from an intact scratch record. Failing to repair it is
    /// only a warning, since the trigger itself was recovered.
    pub fn load(&mut self) -> Result<Option<TriggerPattern>, StoreError<S::Error>> {
        let primary = self.read(Record::Trigger);
        if let Ok(Some(trigger)) = primary {
            return Ok(Some(trigger));
        }

        let Ok(Some(trigger)) = self.read(Record::TriggerScratch) else {
            return primary;
        };
        info!("Recovering trigger from scratch record");
        if self.save(&trigger).is_err() {
            warn!("Unable to repair the trigger record");
        }
        Ok(Some(trigger))
    }

    /// Gives access to the backend, e.g., for inspection.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn read(&mut self, record: Record) -> Result<Option<TriggerPattern>, StoreError<S::Error>> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        match self.backend.read(record, &mut buf)? {
            None => Ok(None),
            Some(len) if len > MAX_RECORD_LEN => Err(StoreError::TooLong),
            Some(len) => decode(&buf[..len]).map(Some).ok_or(StoreError::Corrupt),
        }
    }
}

fn encode(trigger: &TriggerPattern, buf: &mut [u8; MAX_RECORD_LEN]) -> usize {
    let bytes = trigger.bytes();
    let kind = trigger.origin().to_u8().unwrap_or(u8::MAX);

    buf[0] = MAGIC;
    buf[1] = kind;
    // bounded by MAX_TRIGGER_LEN, which fits a byte
    buf[2] = bytes.len() as u8;
    buf[3..3 + bytes.len()].copy_from_slice(bytes);
    let end = 3 + bytes.len();
    buf[end] = checksum(&buf[..end]);

    end + 1
}

fn decode(record: &[u8]) -> Option<TriggerPattern> {
    let (&check, framed) = record.split_last()?;
    let [magic, kind, len, payload @ ..] = framed else {
        return None;
    };
    if *magic != MAGIC || usize::from(*len) != payload.len() || checksum(framed) != check {
        return None;
    }

    Some(TriggerPattern::new(MessageKind::from_u8(*kind)?, payload))
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyvec::ArrayVec;

    type Buffer = ArrayVec<[u8; MAX_RECORD_LEN]>;

    #[derive(Debug, Default)]
    struct MemoryStore {
        trigger: Option<Buffer>,
        scratch: Option<Buffer>,
        writes: usize,
    }

    impl MemoryStore {
        fn slot(&mut self, record: Record) -> &mut Option<Buffer> {
            match record {
                Record::Trigger => &mut self.trigger,
                Record::TriggerScratch => &mut self.scratch,
            }
        }
    }

    impl KeyValueStore for MemoryStore {
        type Error = ();

        fn read(&mut self, record: Record, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            Ok(self.slot(record).as_ref().map(|stored| {
                buf[..stored.len()].copy_from_slice(stored);
                stored.len()
            }))
        }

        fn write(&mut self, record: Record, bytes: &[u8]) -> Result<(), ()> {
            self.writes += 1;
            *self.slot(record) = Some(bytes.iter().copied().collect());
            Ok(())
        }

        fn remove(&mut self, record: Record) -> Result<(), ()> {
            *self.slot(record) = None;
            Ok(())
        }
    }

    /// Fails every write after the first `allowed`, like a medium losing power.
    #[derive(Debug, Default)]
    struct FailingStore {
        inner: MemoryStore,
        allowed: usize,
    }

    impl KeyValueStore for FailingStore {
        type Error = ();

        fn read(&mut self, record: Record, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            self.inner.read(record, buf)
        }

        fn write(&mut self, record: Record, bytes: &[u8]) -> Result<(), ()> {
            if self.inner.writes >= self.allowed {
                return Err(());
            }
            self.inner.write(record, bytes)
        }

        fn remove(&mut self, record: Record) -> Result<(), ()> {
            self.inner.remove(record)
        }
    }

    /// Writes only the first half of each record written to [`Record::Trigger`].
    #[derive(Debug, Default)]
    struct TearingStore {
        inner: MemoryStore,
    }

    impl KeyValueStore for TearingStore {
        type Error = ();

        fn read(&mut self, record: Record, buf: &mut [u8]) -> Result<Option<usize>, ()> {
            self.inner.read(record, buf)
        }

        fn write(&mut self, record: Record, bytes: &[u8]) -> Result<(), ()> {
            match record {
                Record::Trigger => {
                    self.inner.write(record, &bytes[..bytes.len() / 2])?;
                    Err(())
                }
                Record::TriggerScratch => self.inner.write(record, bytes),
            }
        }

        fn remove(&mut self, record: Record) -> Result<(), ()> {
            self.inner.remove(record)
        }
    }

    fn program_change() -> TriggerPattern {
        TriggerPattern::new(MessageKind::ProgramChange, &[0x07])
    }

    #[test]
    fn nothing_saved_loads_nothing() {
        let mut store = TriggerStore::new(MemoryStore::default());
        assert_eq!(Ok(None), store.load());
    }

    #[test]
    fn save_then_load() {
        let mut store = TriggerStore::new(MemoryStore::default());
        let stop = TriggerPattern::new(MessageKind::SysEx, &[0x08, 0x00, 0x40]);
        store.save(&stop).unwrap();
        assert_eq!(Ok(Some(stop)), store.load(), "Expected left but got right");
    }

    #[test]
    fn save_commits_primary_and_discards_scratch() {
        let mut store = TriggerStore::new(MemoryStore::default());
        store.save(&program_change()).unwrap();
        assert_eq!(
            Some(&[MAGIC, 2, 1, 0x07, MAGIC ^ 2 ^ 1 ^ 0x07][..]),
            store.backend().trigger.as_ref().map(|record| record.as_slice()),
            "Expected left but got right"
        );
        assert_eq!(None, store.backend().scratch);
    }

    #[test]
    fn later_save_overwrites() {
        let mut store = TriggerStore::new(MemoryStore::default());
        store.save(&program_change()).unwrap();
        let toggle = TriggerPattern::new(MessageKind::ControlChange, &[0x07, 0x7F]);
        store.save(&toggle).unwrap();
        assert_eq!(Ok(Some(toggle)), store.load());
    }

    #[test]
    fn empty_trigger_is_saved_as_such() {
        let mut store = TriggerStore::new(MemoryStore::default());
        store.save(&TriggerPattern::empty()).unwrap();
        assert_eq!(Ok(Some(TriggerPattern::empty())), store.load());
    }

    #[test]
    fn failed_write_surfaces_and_keeps_previous_trigger() {
        let mut store = TriggerStore::new(FailingStore {
            allowed: 2,
            ..Default::default()
        });
        store.save(&program_change()).unwrap();

        let toggle = TriggerPattern::new(MessageKind::ControlChange, &[0x07, 0x7F]);
        assert_eq!(Err(StoreError::Backend(())), store.save(&toggle));
        assert_eq!(Ok(Some(program_change())), store.load());
    }

    #[test]
    fn torn_write_is_recovered_from_scratch() {
        let mut store = TriggerStore::new(TearingStore::default());
        assert!(store.save(&program_change()).is_err());
        assert!(store.backend().inner.trigger.is_some(), "Primary should hold the torn record");
        assert_eq!(Ok(Some(program_change())), store.load(), "Expected left but got right");
    }

    #[test]
    fn load_repairs_primary_from_scratch() {
        let mut torn = TriggerStore::new(TearingStore::default());
        let _ = torn.save(&program_change());

        let mut store = TriggerStore::new(MemoryStore {
            trigger: torn.backend().inner.trigger,
            scratch: torn.backend().inner.scratch,
            writes: 0,
        });
        assert_eq!(Ok(Some(program_change())), store.load());
        assert_eq!(None, store.backend().scratch, "Scratch should be discarded after repair");

        let mut primary_only = TriggerStore::new(MemoryStore {
            trigger: store.backend().trigger,
            ..Default::default()
        });
        assert_eq!(Ok(Some(program_change())), primary_only.load());
    }

    #[test]
    fn corrupt_scratch_alone_loads_nothing() {
        let mut store = TriggerStore::new(MemoryStore {
            scratch: Some([MAGIC, 2].iter().copied().collect()),
            ..Default::default()
        });
        assert_eq!(Ok(None), store.load());
    }

    #[test]
    fn corrupt_primary_without_scratch_is_reported() {
        let mut store = TriggerStore::new(MemoryStore {
            trigger: Some([MAGIC, 2, 1, 0x07, 0x00].iter().copied().collect()),
            ..Default::default()
        });
        assert_eq!(Err(StoreError::Corrupt), store.load());
    }

    #[test]
    fn unknown_kind_is_corrupt() {
        let framed = [MAGIC, 0x42, 1, 0x07];
        let mut record: Buffer = framed.iter().copied().collect();
        record.push(checksum(&framed));
        let mut store = TriggerStore::new(MemoryStore {
            trigger: Some(record),
            ..Default::default()
        });
        assert_eq!(Err(StoreError::Corrupt), store.load());
    }

    #[test]
    fn length_must_agree_with_payload() {
        assert_eq!(None, decode(&[MAGIC, 2, 2, 0x07, MAGIC ^ 2 ^ 2 ^ 0x07]));
        assert_eq!(None, decode(&[MAGIC]));
        assert_eq!(None, decode(&[]));
    }
}
