/* 📖 # How are the handle variants organised?

Every byte store is reached through the same `IoHandle` operation set:
open, close, read, write, seek, size, offset, exists and clone_closed.
Each backend is an independent struct implementing that trait:

- `FileHandle`: a file on disk, owning its OS descriptor while open
- `FileRangeHandle`: a window `[range_start, range_start + range_size)` of
  another handle, which it either owns or borrows
- `MemoryRangeHandle`: a window of a shared in-memory buffer
- `PoolEntryHandle`: one slot of a `HandlePool`, routed through the pool

`Handle` is the closed union of those four and dispatches to them, so a
parser can hold a `Handle` without knowing where its bytes come from.
*/

mod file;
mod file_range;
mod memory_range;
mod mode;
mod pool_ref;

use std::fmt;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use randio_base::{RandioResult, bail, err};

pub use file::FileHandle;
pub use file_range::{Backing, FileRangeHandle};
pub use memory_range::{MemoryRangeHandle, SharedBuffer, shared_buffer};
pub use mode::{Access, OpenMode};
pub use pool_ref::{PoolEntryHandle, SharedPool};

/// A handle shared between a borrowing range and its other users.
pub type SharedHandle = Arc<Mutex<Handle>>;

/// Backend variant of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    File,
    FileRange,
    MemoryRange,
    PoolRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleState {
    Closed,
    Open,
}

/// Uniform random-access operations implemented by every backend.
pub trait IoHandle: fmt::Debug {
    fn kind(&self) -> HandleKind;

    /// Opens the handle. Fails with `InvalidState` if it is already open.
    fn open(&mut self, mode: OpenMode) -> RandioResult<()>;

    /// Closes the handle. Fails with `InvalidState` if it is already closed.
    fn close(&mut self) -> RandioResult<()>;

    /// Reads at the current offset, returning the number of bytes read
    /// (0 at the end of the data).
    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize>;

    /// Writes at the current offset, returning the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> RandioResult<usize>;

    /// Moves the offset and returns the new absolute offset.
    ///
    /// Seeking past the end is allowed; a negative target is an `Argument` error.
    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64>;

    /// Total size of the data. Requires the handle to be open.
    fn size(&mut self) -> RandioResult<u64>;

    /// Current logical offset.
    fn offset(&self) -> RandioResult<u64>;

    /// Whether the underlying store exists.
    fn exists(&self) -> RandioResult<bool>;

    fn is_open(&self) -> bool;

    /// Mode the handle was opened with, `None` while closed.
    fn mode(&self) -> Option<OpenMode>;

    /// A new closed handle with the same configuration and no shared OS descriptor.
    fn clone_closed(&self) -> RandioResult<Handle>;

    fn state(&self) -> HandleState {
        if self.is_open() {
            HandleState::Open
        } else {
            HandleState::Closed
        }
    }

    /// Seeks to an absolute offset, then reads.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RandioResult<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    /// Seeks to an absolute offset, then writes.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> RandioResult<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.write(buf)
    }
}

/// Any handle variant.
#[derive(Debug)]
pub enum Handle {
    File(FileHandle),
    FileRange(FileRangeHandle),
    MemoryRange(MemoryRangeHandle),
    PoolRef(PoolEntryHandle),
}

macro_rules! dispatch {
    ($handle:expr, $inner:ident => $body:expr) => {
        match $handle {
            Handle::File($inner) => $body,
            Handle::FileRange($inner) => $body,
            Handle::MemoryRange($inner) => $body,
            Handle::PoolRef($inner) => $body,
        }
    };
}

impl Handle {
    /// A closed handle for the file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Handle::File(FileHandle::new(path))
    }

    /// A closed range that owns `inner` and opens/closes it with itself.
    pub fn file_range(inner: Handle, range_start: u64, range_size: u64) -> RandioResult<Self> {
        FileRangeHandle::new(Backing::Owned(Box::new(inner)), range_start, range_size)
            .map(Handle::FileRange)
    }

    /// A closed range over a borrowed handle, which must be open before the range is.
    pub fn shared_file_range(
        inner: SharedHandle,
        range_start: u64,
        range_size: u64,
    ) -> RandioResult<Self> {
        FileRangeHandle::new(Backing::Shared(inner), range_start, range_size)
            .map(Handle::FileRange)
    }

    /// A closed handle over the whole of `buffer`.
    pub fn memory(buffer: SharedBuffer) -> Self {
        Handle::MemoryRange(MemoryRangeHandle::whole(buffer))
    }

    /// A closed handle over `[range_start, range_start + range_size)` of `buffer`.
    pub fn memory_range(
        buffer: SharedBuffer,
        range_start: u64,
        range_size: u64,
    ) -> RandioResult<Self> {
        MemoryRangeHandle::new(buffer, range_start, range_size).map(Handle::MemoryRange)
    }

    /// A closed handle addressing slot `index` of `pool`.
    pub fn pool_entry(pool: SharedPool, index: usize) -> Self {
        Handle::PoolRef(PoolEntryHandle::new(pool, index))
    }

    /// Wraps the handle for borrowing by ranges.
    pub fn into_shared(self) -> SharedHandle {
        Arc::new(Mutex::new(self))
    }
}

impl IoHandle for Handle {
    fn kind(&self) -> HandleKind {
        dispatch!(self, h => h.kind())
    }

    fn open(&mut self, mode: OpenMode) -> RandioResult<()> {
        dispatch!(self, h => h.open(mode))
    }

    fn close(&mut self) -> RandioResult<()> {
        dispatch!(self, h => h.close())
    }

    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize> {
        dispatch!(self, h => h.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> RandioResult<usize> {
        dispatch!(self, h => h.write(buf))
    }

    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64> {
        dispatch!(self, h => h.seek(pos))
    }

    fn size(&mut self) -> RandioResult<u64> {
        dispatch!(self, h => h.size())
    }

    fn offset(&self) -> RandioResult<u64> {
        dispatch!(self, h => h.offset())
    }

    fn exists(&self) -> RandioResult<bool> {
        dispatch!(self, h => h.exists())
    }

    fn is_open(&self) -> bool {
        dispatch!(self, h => h.is_open())
    }

    fn mode(&self) -> Option<OpenMode> {
        dispatch!(self, h => h.mode())
    }

    fn clone_closed(&self) -> RandioResult<Handle> {
        dispatch!(self, h => h.clone_closed())
    }
}

impl From<FileHandle> for Handle {
    fn from(handle: FileHandle) -> Self {
        Handle::File(handle)
    }
}

impl From<FileRangeHandle> for Handle {
    fn from(handle: FileRangeHandle) -> Self {
        Handle::FileRange(handle)
    }
}

impl From<MemoryRangeHandle> for Handle {
    fn from(handle: MemoryRangeHandle) -> Self {
        Handle::MemoryRange(handle)
    }
}

impl From<PoolEntryHandle> for Handle {
    fn from(handle: PoolEntryHandle) -> Self {
        Handle::PoolRef(handle)
    }
}

pub(crate) fn require_open(mode: Option<OpenMode>, kind: HandleKind) -> RandioResult<OpenMode> {
    mode.ok_or_else(|| err!(InvalidState, "{:?} handle is not open", kind))
}

pub(crate) fn require_readable(mode: Option<OpenMode>, kind: HandleKind) -> RandioResult<()> {
    if !require_open(mode, kind)?.can_read() {
        bail!(InvalidState, "{:?} handle is not open for reading", kind);
    }
    Ok(())
}

pub(crate) fn require_writable(mode: Option<OpenMode>, kind: HandleKind) -> RandioResult<()> {
    if !require_open(mode, kind)?.can_write() {
        bail!(InvalidState, "{:?} handle is not open for writing", kind);
    }
    Ok(())
}

pub(crate) fn require_closed(mode: Option<OpenMode>, kind: HandleKind) -> RandioResult<()> {
    if mode.is_some() {
        bail!(InvalidState, "{:?} handle is already open", kind);
    }
    Ok(())
}

/// Absolute offset a seek lands on, given the current offset and the size
/// that `SeekFrom::End` is relative to.
pub(crate) fn seek_target(pos: SeekFrom, current: u64, size: u64) -> RandioResult<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => (current, delta),
        SeekFrom::End(delta) => (size, delta),
    };
    base.checked_add_signed(delta).ok_or_else(|| {
        err!(
            Argument,
            "seek by {} from {} lands outside the addressable range",
            delta,
            base
        )
    })
}
