use std::io::SeekFrom;

use randio_base::{RandioResult, ResultExt, bail, err};
use tracing::{debug, instrument};

use super::{
    Handle, HandleKind, IoHandle, OpenMode, SharedHandle, require_closed, require_open,
    require_readable, require_writable, seek_target,
};

/// The handle a range reads through.
#[derive(Debug)]
pub enum Backing {
    /// Opened and closed together with the range.
    Owned(Box<Handle>),
    /// Opened by someone else; the range only borrows it and never closes it.
    Shared(SharedHandle),
}

/// Window `[range_start, range_start + range_size)` of another handle.
///
/// Offsets, seeks and sizes are relative to the window. Logical offset `o`
/// maps to backing offset `range_start + o`.
///
/// ```
/// use randio::{Handle, IoHandle, OpenMode, shared_buffer};
///
/// let inner = Handle::memory(shared_buffer(b"0123456789".to_vec()));
/// let mut range = Handle::file_range(inner, 3, 4).unwrap();
/// range.open(OpenMode::read()).unwrap();
///
/// let mut buf = [0u8; 8];
/// assert_eq!(range.read(&mut buf).unwrap(), 4);
/// assert_eq!(&buf[..4], b"3456");
/// ```
#[derive(Debug)]
pub struct FileRangeHandle {
    backing: Backing,
    range_start: u64,
    range_size: u64,
    offset: u64,
    mode: Option<OpenMode>,
}

impl FileRangeHandle {
    pub fn new(backing: Backing, range_start: u64, range_size: u64) -> RandioResult<Self> {
        if range_start.checked_add(range_size).is_none() {
            bail!(
                Argument,
                "range of {} bytes at {} exceeds the addressable size",
                range_size,
                range_start
            );
        }
        Ok(Self {
            backing,
            range_start,
            range_size,
            offset: 0,
            mode: None,
        })
    }

    pub fn range_start(&self) -> u64 {
        self.range_start
    }

    pub fn range_size(&self) -> u64 {
        self.range_size
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    fn with_backing<R>(
        &mut self,
        f: impl FnOnce(&mut Handle) -> RandioResult<R>,
    ) -> RandioResult<R> {
        match &mut self.backing {
            Backing::Owned(inner) => f(inner),
            Backing::Shared(shared) => {
                let mut guard = shared
                    .try_lock()
                    .ok_or_else(|| err!(InvalidState, "backing handle is locked"))?;
                f(&mut guard)
            }
        }
    }

    fn remaining(&self) -> u64 {
        self.range_size.saturating_sub(self.offset)
    }
}

fn check_shared_backing(backing: &Handle, mode: OpenMode) -> RandioResult<()> {
    let Some(backing_mode) = backing.mode() else {
        bail!(InvalidState, "borrowed backing handle must be opened before the range");
    };
    if mode.can_read() && !backing_mode.can_read() {
        bail!(InvalidState, "borrowed backing handle is not open for reading");
    }
    if mode.can_write() && !backing_mode.can_write() {
        bail!(InvalidState, "borrowed backing handle is not open for writing");
    }
    Ok(())
}

impl IoHandle for FileRangeHandle {
    fn kind(&self) -> HandleKind {
        HandleKind::FileRange
    }

    #[instrument(skip(self), fields(start = self.range_start, size = self.range_size))]
    fn open(&mut self, mode: OpenMode) -> RandioResult<()> {
        require_closed(self.mode, HandleKind::FileRange)?;
        mode.validate()?;
        if mode.is_append() {
            bail!(Argument, "range handles cannot be opened in append mode");
        }
        match &mut self.backing {
            Backing::Owned(inner) => inner.open(mode).context("opening range backing handle")?,
            Backing::Shared(shared) => {
                let guard = shared
                    .try_lock()
                    .ok_or_else(|| err!(InvalidState, "backing handle is locked"))?;
                check_shared_backing(&guard, mode)?;
            }
        }
        self.mode = Some(mode);
        debug!(offset = self.offset, "opened range");
        Ok(())
    }

    #[instrument(skip(self), fields(start = self.range_start, size = self.range_size))]
    fn close(&mut self) -> RandioResult<()> {
        require_open(self.mode, HandleKind::FileRange)?;
        if let Backing::Owned(inner) = &mut self.backing {
            inner.close().context("closing range backing handle")?;
        }
        self.mode = None;
        debug!("closed range");
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize> {
        require_readable(self.mode, HandleKind::FileRange)?;
        let remaining = self.remaining();
        if buf.is_empty() || remaining == 0 {
            return Ok(0);
        }
        let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let position = self.range_start + self.offset;
        let count = self.with_backing(|inner| inner.read_at(position, &mut buf[..len]))?;
        self.offset += count as u64;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> RandioResult<usize> {
        require_writable(self.mode, HandleKind::FileRange)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let remaining = self.remaining();
        if remaining == 0 {
            bail!(
                Bounds,
                "write at offset {} is outside the range of {} bytes",
                self.offset,
                self.range_size
            );
        }
        let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let position = self.range_start + self.offset;
        let count = self.with_backing(|inner| inner.write_at(position, &buf[..len]))?;
        self.offset += count as u64;
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::FileRange)?;
        self.offset = seek_target(pos, self.offset, self.range_size)?;
        Ok(self.offset)
    }

    fn size(&mut self) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::FileRange)?;
        Ok(self.range_size)
    }

    fn offset(&self) -> RandioResult<u64> {
        Ok(self.offset)
    }

    fn exists(&self) -> RandioResult<bool> {
        match &self.backing {
            Backing::Owned(inner) => inner.exists(),
            Backing::Shared(shared) => shared
                .try_lock()
                .ok_or_else(|| err!(InvalidState, "backing handle is locked"))?
                .exists(),
        }
    }

    fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    fn clone_closed(&self) -> RandioResult<Handle> {
        let backing = match &self.backing {
            Backing::Owned(inner) => Backing::Owned(Box::new(inner.clone_closed()?)),
            Backing::Shared(shared) => Backing::Shared(shared.clone()),
        };
        FileRangeHandle::new(backing, self.range_start, self.range_size).map(Handle::FileRange)
    }
}
