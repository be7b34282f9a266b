use std::io::SeekFrom;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use randio_base::{RandioResult, bail, err};

use crate::pool::HandlePool;

use super::{
    Handle, HandleKind, IoHandle, OpenMode, require_closed, require_open, require_readable,
    require_writable,
};

/// A pool shared between the handles that address its slots.
pub type SharedPool = Arc<Mutex<HandlePool>>;

/// Handle addressing one slot of a shared pool.
///
/// Every operation goes through the pool, which opens the slot on demand and
/// may evict other slots to stay within its limit. Closing this handle closes
/// the slot but leaves it registered.
///
/// The handle keeps its own offset and positions the slot there before each
/// routed operation, so several entries over one slot do not move each other.
#[derive(Debug)]
pub struct PoolEntryHandle {
    pool: SharedPool,
    index: usize,
    mode: Option<OpenMode>,
    offset: u64,
}

impl PoolEntryHandle {
    pub fn new(pool: SharedPool, index: usize) -> Self {
        Self {
            pool,
            index,
            mode: None,
            offset: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    fn lock(&self) -> RandioResult<MutexGuard<'_, HandlePool>> {
        self.pool
            .try_lock()
            .ok_or_else(|| err!(InvalidState, "pool is locked by another operation"))
    }

    /// Locks the pool, moves the slot to this handle's offset, runs `f` and
    /// records where the slot ended up.
    fn at_offset<R>(
        &mut self,
        f: impl FnOnce(&mut HandlePool, usize) -> RandioResult<R>,
    ) -> RandioResult<R> {
        let index = self.index;
        let mut pool = self.lock()?;
        pool.seek(index, SeekFrom::Start(self.offset))?;
        let result = f(&mut pool, index);
        let offset = pool.get_offset(index)?;
        drop(pool);
        self.offset = offset;
        result
    }
}

impl IoHandle for PoolEntryHandle {
    fn kind(&self) -> HandleKind {
        HandleKind::PoolRef
    }

    fn open(&mut self, mode: OpenMode) -> RandioResult<()> {
        require_closed(self.mode, HandleKind::PoolRef)?;
        mode.validate()?;
        let mut pool = self.lock()?;
        let slot_mode = pool.access_mode(self.index)?;
        if (mode.can_read() && !slot_mode.can_read()) || (mode.can_write() && !slot_mode.can_write())
        {
            bail!(
                InvalidState,
                "pool slot {} is registered as {:?}, cannot open it as {:?}",
                self.index,
                slot_mode.access(),
                mode.access()
            );
        }
        pool.ensure_open(self.index)?;
        drop(pool);
        self.mode = Some(mode);
        self.offset = 0;
        Ok(())
    }

    fn close(&mut self) -> RandioResult<()> {
        require_open(self.mode, HandleKind::PoolRef)?;
        self.lock()?.close(self.index)?;
        self.mode = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize> {
        require_readable(self.mode, HandleKind::PoolRef)?;
        self.at_offset(|pool, index| pool.read(index, buf))
    }

    fn write(&mut self, buf: &[u8]) -> RandioResult<usize> {
        require_writable(self.mode, HandleKind::PoolRef)?;
        self.at_offset(|pool, index| pool.write(index, buf))
    }

    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::PoolRef)?;
        self.at_offset(|pool, index| pool.seek(index, pos))
    }

    fn size(&mut self) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::PoolRef)?;
        self.lock()?.get_size(self.index)
    }

    fn offset(&self) -> RandioResult<u64> {
        Ok(self.offset)
    }

    fn exists(&self) -> RandioResult<bool> {
        self.lock()?.handle(self.index)?.exists()
    }

    fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    fn clone_closed(&self) -> RandioResult<Handle> {
        Ok(Handle::PoolRef(PoolEntryHandle::new(
            self.pool.clone(),
            self.index,
        )))
    }
}
