/* 📖 # How does the pool keep more handles usable than it keeps open?

A `HandlePool` owns every handle registered with it and decides which of them
hold an open OS descriptor. At most `max_open_handles` slots are physically
open at any time. Any operation on a slot first makes sure the slot is open;
when the pool is full, the least recently used open slot is closed to make
room.

Closing a slot, whether the caller asked for it or the pool evicted it,
records the handle's offset. Reopening seeks back to that offset, so a caller
reading through the pool never notices an eviction happened.

Slot indices are handed out by `append` and never reused: a removed slot
leaves a tombstone behind, and addressing it reports an `Argument` error.
*/

mod recency;

use std::io::SeekFrom;
use std::sync::Arc;

use parking_lot::Mutex;
use randio_base::{RandioResult, ResultExt, bail, err};
use tracing::{debug, instrument, warn};

use crate::handle::{Handle, IoHandle, OpenMode, SharedPool};

use recency::RecencyList;

#[derive(Debug)]
struct PoolSlot {
    handle: Handle,
    access_mode: OpenMode,
    is_open: bool,
    /// Set after the first successful open; later opens drop `truncate`.
    opened_before: bool,
    last_used: u64,
    offset: u64,
}

impl PoolSlot {
    fn new(handle: Handle, access_mode: OpenMode) -> Self {
        Self {
            handle,
            access_mode,
            is_open: false,
            opened_before: false,
            last_used: 0,
            offset: 0,
        }
    }

    fn clone_closed(&self) -> RandioResult<Self> {
        Ok(Self::new(self.handle.clone_closed()?, self.access_mode))
    }
}

/// Bounded set of handles sharing a limited number of open descriptors.
///
/// ```
/// use randio::{Handle, HandlePool, OpenMode, shared_buffer};
///
/// let mut pool = HandlePool::new(1);
/// let a = pool.append(Handle::memory(shared_buffer(b"aaaa".to_vec())), OpenMode::read()).unwrap();
/// let b = pool.append(Handle::memory(shared_buffer(b"bbbb".to_vec())), OpenMode::read()).unwrap();
///
/// let mut buf = [0u8; 2];
/// pool.read(a, &mut buf).unwrap();
/// pool.read(b, &mut buf).unwrap();
/// assert_eq!(pool.open_count(), 1);
/// assert_eq!(pool.get_offset(a).unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct HandlePool {
    slots: Vec<Option<PoolSlot>>,
    max_open_handles: usize,
    current_open_count: usize,
    clock: u64,
    recency: RecencyList,
}

impl HandlePool {
    /// Creates an empty pool. A limit of zero is accepted, but no slot can
    /// then be opened.
    pub fn new(max_open_handles: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_open_handles,
            current_open_count: 0,
            clock: 0,
            recency: RecencyList::new(),
        }
    }

    /// Wraps the pool for use by `PoolEntryHandle`s.
    pub fn into_shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    /// Registers a closed handle and returns its slot index. Nothing is opened.
    pub fn append(&mut self, handle: Handle, access_mode: OpenMode) -> RandioResult<usize> {
        if handle.is_open() {
            bail!(Argument, "only closed handles can be added to a pool");
        }
        access_mode.validate()?;
        self.slots
            .try_reserve(1)
            .map_err(|e| err!(Memory, "cannot grow pool slot table: {}", e))?;
        let index = self.slots.len();
        let kind = handle.kind();
        self.slots.push(Some(PoolSlot::new(handle, access_mode)));
        debug!(index, ?kind, "appended pool slot");
        Ok(index)
    }

    fn slot(&self, index: usize) -> RandioResult<&PoolSlot> {
        match self.slots.get(index) {
            Some(Some(slot)) => Ok(slot),
            Some(None) => bail!(Argument, "pool slot {} was removed", index),
            None => bail!(Argument, "pool slot {} does not exist", index),
        }
    }

    fn slot_mut(&mut self, index: usize) -> RandioResult<&mut PoolSlot> {
        match self.slots.get_mut(index) {
            Some(Some(slot)) => Ok(slot),
            Some(None) => bail!(Argument, "pool slot {} was removed", index),
            None => bail!(Argument, "pool slot {} does not exist", index),
        }
    }

    fn touch(&mut self, index: usize) {
        self.clock += 1;
        let clock = self.clock;
        if let Some(Some(slot)) = self.slots.get_mut(index) {
            slot.last_used = clock;
            self.recency.push_back(index);
        }
    }

    /// Makes sure slot `index` holds an open descriptor, evicting the least
    /// recently used slot if the pool is full.
    #[instrument(skip(self))]
    pub fn ensure_open(&mut self, index: usize) -> RandioResult<()> {
        if self.slot(index)?.is_open {
            self.touch(index);
            return Ok(());
        }
        if self.max_open_handles == 0 {
            bail!(Resource, "pool allows no open handles");
        }
        while self.current_open_count >= self.max_open_handles {
            self.evict_one()
                .with_context(|| format!("making room to open pool slot {}", index))?;
        }
        self.open_slot(index)
    }

    fn evict_one(&mut self) -> RandioResult<()> {
        let Some(victim) = self.recency.front() else {
            bail!(
                Resource,
                "{} of {} handles open but none can be evicted",
                self.current_open_count,
                self.max_open_handles
            );
        };
        debug!(victim, "evicting pool slot");
        self.close_slot(victim)
            .with_context(|| format!("evicting pool slot {}", victim))
    }

    fn open_slot(&mut self, index: usize) -> RandioResult<()> {
        let slot = self.slot_mut(index)?;
        let mode = if slot.opened_before {
            slot.access_mode.for_reopen()
        } else {
            slot.access_mode
        };
        slot.handle
            .open(mode)
            .with_context(|| format!("opening pool slot {}", index))?;
        if slot.offset != 0 {
            if let Err(error) = slot.handle.seek(SeekFrom::Start(slot.offset)) {
                if let Err(close_error) = slot.handle.close() {
                    warn!(index, error = %close_error, "failed to close slot after seek failure");
                }
                return Err(error)
                    .with_context(|| format!("restoring offset of pool slot {}", index));
            }
        }
        slot.is_open = true;
        slot.opened_before = true;
        let offset = slot.offset;
        self.current_open_count += 1;
        self.touch(index);
        debug!(index, offset, open = self.current_open_count, "opened pool slot");
        Ok(())
    }

    /// Closes the slot's handle, remembering its offset. If the handle stays
    /// open because closing failed, the pool is left unchanged.
    fn close_slot(&mut self, index: usize) -> RandioResult<()> {
        let slot = self.slot_mut(index)?;
        if !slot.is_open {
            return Ok(());
        }
        let offset = slot.handle.offset()?;
        let result = slot.handle.close();
        if slot.handle.is_open() {
            return result;
        }
        slot.offset = offset;
        slot.is_open = false;
        debug_assert!(self.recency.contains(index));
        self.current_open_count -= 1;
        self.recency.remove(index);
        result
    }

    fn with_open_handle<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Handle) -> RandioResult<R>,
    ) -> RandioResult<R> {
        self.ensure_open(index)?;
        let result = f(&mut self.slot_mut(index)?.handle);
        self.touch(index);
        result
    }

    pub fn read(&mut self, index: usize, buf: &mut [u8]) -> RandioResult<usize> {
        self.with_open_handle(index, |handle| handle.read(buf))
    }

    pub fn write(&mut self, index: usize, buf: &[u8]) -> RandioResult<usize> {
        self.with_open_handle(index, |handle| handle.write(buf))
    }

    pub fn seek(&mut self, index: usize, pos: SeekFrom) -> RandioResult<u64> {
        self.with_open_handle(index, |handle| handle.seek(pos))
    }

    pub fn get_size(&mut self, index: usize) -> RandioResult<u64> {
        self.with_open_handle(index, |handle| handle.size())
    }

    /// Seeks slot `index` to `offset` and reads.
    pub fn read_at(&mut self, index: usize, offset: u64, buf: &mut [u8]) -> RandioResult<usize> {
        self.with_open_handle(index, |handle| handle.read_at(offset, buf))
    }

    /// Seeks slot `index` to `offset` and writes.
    pub fn write_at(&mut self, index: usize, offset: u64, buf: &[u8]) -> RandioResult<usize> {
        self.with_open_handle(index, |handle| handle.write_at(offset, buf))
    }

    /// Live offset of an open slot, remembered offset of a closed one.
    pub fn get_offset(&self, index: usize) -> RandioResult<u64> {
        let slot = self.slot(index)?;
        if slot.is_open {
            slot.handle.offset()
        } else {
            Ok(slot.offset)
        }
    }

    /// Closes the slot's descriptor if it is open. The slot stays registered.
    #[instrument(skip(self))]
    pub fn close(&mut self, index: usize) -> RandioResult<()> {
        self.close_slot(index)
    }

    /// Closes every open slot. Keeps going after a failure and reports the first one.
    pub fn close_all(&mut self) -> RandioResult<()> {
        if self.recency.is_empty() {
            return Ok(());
        }
        let open: Vec<usize> = self.recency.iter().collect();
        let mut first_error = None;
        for index in open {
            if let Err(error) = self.close_slot(index) {
                warn!(index, error = %error, "failed to close pool slot");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Unregisters slot `index` and hands back its closed handle. The index
    /// is never reused.
    #[instrument(skip(self))]
    pub fn remove(&mut self, index: usize) -> RandioResult<Handle> {
        self.close_slot(index)
            .with_context(|| format!("removing pool slot {}", index))?;
        let slot = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| err!(Argument, "pool slot {} does not exist", index))?;
        debug!(index, "removed pool slot");
        Ok(slot.handle)
    }

    /// Closes the slot, replaces its access mode and opens it again at its
    /// remembered offset.
    pub fn reopen(&mut self, index: usize, mode: OpenMode) -> RandioResult<()> {
        mode.validate()?;
        self.close_slot(index)?;
        let slot = self.slot_mut(index)?;
        slot.access_mode = mode;
        slot.opened_before = false;
        self.ensure_open(index)
    }

    /// Changes the limit, evicting least recently used slots until it holds.
    pub fn set_max_open_handles(&mut self, max_open_handles: usize) -> RandioResult<()> {
        if max_open_handles == 0 {
            bail!(Argument, "max_open_handles must be at least 1");
        }
        self.max_open_handles = max_open_handles;
        while self.current_open_count > self.max_open_handles {
            self.evict_one().context("lowering the open handle limit")?;
        }
        Ok(())
    }

    /// A new pool with the same limit and a closed copy of every slot.
    /// Removed slots stay removed so indices line up with this pool.
    pub fn clone_closed(&self) -> RandioResult<HandlePool> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(self.slots.len())
            .map_err(|e| err!(Memory, "cannot allocate cloned pool: {}", e))?;
        for (index, slot) in self.slots.iter().enumerate() {
            let slot = slot
                .as_ref()
                .map(PoolSlot::clone_closed)
                .transpose()
                .with_context(|| format!("cloning pool slot {}", index))?;
            slots.push(slot);
        }
        Ok(HandlePool {
            slots,
            max_open_handles: self.max_open_handles,
            current_open_count: 0,
            clock: 0,
            recency: RecencyList::new(),
        })
    }

    /// The registered handle, for inspection.
    pub fn handle(&self, index: usize) -> RandioResult<&Handle> {
        Ok(&self.slot(index)?.handle)
    }

    pub fn access_mode(&self, index: usize) -> RandioResult<OpenMode> {
        Ok(self.slot(index)?.access_mode)
    }

    pub fn is_open(&self, index: usize) -> RandioResult<bool> {
        Ok(self.slot(index)?.is_open)
    }

    /// Recency marker of the slot's last use; 0 if never used.
    pub fn last_used(&self, index: usize) -> RandioResult<u64> {
        Ok(self.slot(index)?.last_used)
    }

    /// Number of slots ever appended, removed ones included.
    pub fn number_of_handles(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        debug_assert_eq!(self.current_open_count, self.recency.len());
        self.current_open_count
    }

    pub fn max_open_handles(&self) -> usize {
        self.max_open_handles
    }

    /// Open slot indices, least recently used first.
    pub fn open_indices(&self) -> Vec<usize> {
        self.recency.iter().collect()
    }
}
