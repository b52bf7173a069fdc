//! Append-only record journal over a key/value [`StoragePort`].
//!
//! Each record kind lives in its own ring of fixed slots
//! (`log_<n>` / `evt_<n>`), slot index = `id % capacity`.  The next id is
//! persisted *before* the slot is written, so a failed write leaves a gap
//! rather than a reused id.  Once the ring wraps, the oldest entry is
//! overwritten.
//!
//! Sizing: the default 24 KB `nvs` partition is 6 pages of 126 entries of
//! 32 bytes, and one page stays free for garbage collection.  A slot blob
//! of up to `SLOT_BUF` bytes costs its payload entries plus a data
//! header and a blob index, so two rings of [`DEFAULT_CAPACITY`] take 384
//! of the 630 usable entries and leave room for a worst-case config blob.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{RecordJournal, StorageError, StoragePort};
use crate::error::JournalError;
use crate::records::{Entry, EventId, IdSelection, LogRecord, RecordId, RelayEvent};

const NAMESPACE: &str = "journal";

/// Large enough for an `Entry<LogRecord>` with every channel present.
const SLOT_BUF: usize = 128;

/// Slots per ring.
pub const DEFAULT_CAPACITY: u64 = 32;

#[derive(Clone, Copy)]
struct Ring {
    prefix: &'static str,
    next_id: u64,
}

impl Ring {
    fn slot_key(&self, id: u64, capacity: u64) -> String {
        format!("{}_{}", self.prefix, id % capacity)
    }

    fn meta_key(&self) -> String {
        format!("{}_next", self.prefix)
    }

    /// Ids that may still be resident, oldest first.
    fn window(&self, capacity: u64) -> core::ops::Range<u64> {
        self.next_id.saturating_sub(capacity).max(1)..self.next_id
    }
}

struct Inner<S> {
    storage: S,
    capacity: u64,
    logs: Ring,
    events: Ring,
}

pub struct StorageJournal<S: StoragePort> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<S>>>,
}

impl<S: StoragePort> StorageJournal<S> {
    /// Open the journal, restoring the persisted id counters.
    pub fn open(storage: S, capacity: u64) -> Result<Self, JournalError> {
        let capacity = capacity.max(1);
        let logs = load_ring(&storage, "log")?;
        let events = load_ring(&storage, "evt")?;
        debug!(
            "journal: opened (capacity {}, next log {}, next event {})",
            capacity, logs.next_id, events.next_id
        );
        Ok(Self {
            inner: Mutex::new(RefCell::new(Inner {
                storage,
                capacity,
                logs,
                events,
            })),
        })
    }

    /// Give the backing store back (used to simulate a reboot).
    pub fn into_storage(self) -> S {
        self.inner.into_inner().into_inner().storage
    }
}

fn load_ring<S: StoragePort>(storage: &S, prefix: &'static str) -> Result<Ring, JournalError> {
    let mut ring = Ring { prefix, next_id: 1 };
    let mut buf = [0u8; 8];
    match storage.read(NAMESPACE, &ring.meta_key(), &mut buf) {
        Ok(8) => ring.next_id = u64::from_le_bytes(buf).max(1),
        Ok(_) => return Err(JournalError::Corrupted),
        Err(StorageError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(ring)
}

fn append<S, T>(storage: &mut S, ring: &mut Ring, capacity: u64, item: &T) -> Result<u64, JournalError>
where
    S: StoragePort,
    T: Serialize + Clone,
{
    let id = ring.next_id;
    let entry = Entry {
        id,
        item: item.clone(),
    };
    let mut buf = [0u8; SLOT_BUF];
    let encoded = postcard::to_slice(&entry, &mut buf).map_err(|_| JournalError::Encode)?;

    storage.write(NAMESPACE, &ring.meta_key(), &(id + 1).to_le_bytes())?;
    ring.next_id = id + 1;
    storage.write(NAMESPACE, &ring.slot_key(id, capacity), encoded)?;
    Ok(id)
}

fn list<S, T>(storage: &S, ring: &Ring, capacity: u64) -> Result<Vec<Entry<T>>, JournalError>
where
    S: StoragePort,
    T: DeserializeOwned,
{
    let mut out = Vec::new();
    let mut buf = [0u8; SLOT_BUF];
    for id in ring.window(capacity) {
        let len = match storage.read(NAMESPACE, &ring.slot_key(id, capacity), &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        match postcard::from_bytes::<Entry<T>>(&buf[..len]) {
            // A slot holding a different id was never written for this id.
            Ok(entry) if entry.id == id => out.push(entry),
            Ok(_) => {}
            Err(_) => warn!("journal: skipping corrupted {} slot for id {}", ring.prefix, id),
        }
    }
    Ok(out)
}

fn delete<S: StoragePort>(
    storage: &mut S,
    ring: &Ring,
    capacity: u64,
    ids: &IdSelection,
) -> Result<usize, JournalError> {
    let mut removed = 0;
    for id in ring.window(capacity).filter(|id| ids.contains(*id)) {
        let key = ring.slot_key(id, capacity);
        if storage.exists(NAMESPACE, &key) {
            storage.delete(NAMESPACE, &key)?;
            removed += 1;
        }
    }
    Ok(removed)
}

impl<S: StoragePort> RecordJournal for StorageJournal<S> {
    fn append_log_record(&self, record: &LogRecord) -> Result<RecordId, JournalError> {
        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            append(&mut inner.storage, &mut inner.logs, inner.capacity, record)
        })
    }

    fn append_relay_event(&self, event: &RelayEvent) -> Result<EventId, JournalError> {
        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            append(&mut inner.storage, &mut inner.events, inner.capacity, event)
        })
    }

    fn log_records(&self) -> Result<Vec<Entry<LogRecord>>, JournalError> {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            list(&inner.storage, &inner.logs, inner.capacity)
        })
    }

    fn relay_events(&self) -> Result<Vec<Entry<RelayEvent>>, JournalError> {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            list(&inner.storage, &inner.events, inner.capacity)
        })
    }

    fn delete_log_records(&self, ids: &IdSelection) -> Result<usize, JournalError> {
        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            delete(&mut inner.storage, &inner.logs, inner.capacity, ids)
        })
    }

    fn delete_relay_events(&self, ids: &IdSelection) -> Result<usize, JournalError> {
        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            delete(&mut inner.storage, &inner.events, inner.capacity, ids)
        })
    }
}
