use std::io::SeekFrom;
use std::sync::Arc;

use parking_lot::RwLock;
use randio_base::{RandioResult, bail};

use super::{
    Handle, HandleKind, IoHandle, OpenMode, require_closed, require_open, require_readable,
    require_writable, seek_target,
};

/// Byte buffer shared between memory ranges and their owner.
pub type SharedBuffer = Arc<RwLock<Vec<u8>>>;

pub fn shared_buffer(data: impl Into<Vec<u8>>) -> SharedBuffer {
    Arc::new(RwLock::new(data.into()))
}

/// Window of a shared in-memory buffer.
///
/// Writes stay inside the window and never grow the buffer.
#[derive(Debug)]
pub struct MemoryRangeHandle {
    buffer: SharedBuffer,
    range_start: usize,
    range_size: usize,
    offset: u64,
    mode: Option<OpenMode>,
}

impl MemoryRangeHandle {
    pub fn new(buffer: SharedBuffer, range_start: u64, range_size: u64) -> RandioResult<Self> {
        let (Ok(start), Ok(size)) = (usize::try_from(range_start), usize::try_from(range_size))
        else {
            bail!(
                Argument,
                "memory range of {} bytes at {} does not fit in memory",
                range_size,
                range_start
            );
        };
        if start.checked_add(size).is_none() {
            bail!(Argument, "memory range of {} bytes at {} overflows", size, start);
        }
        Ok(Self {
            buffer,
            range_start: start,
            range_size: size,
            offset: 0,
            mode: None,
        })
    }

    /// A range covering the buffer as it is now.
    pub fn whole(buffer: SharedBuffer) -> Self {
        let range_size = buffer.read().len();
        Self {
            buffer,
            range_start: 0,
            range_size,
            offset: 0,
            mode: None,
        }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn range_start(&self) -> u64 {
        self.range_start as u64
    }

    pub fn range_size(&self) -> u64 {
        self.range_size as u64
    }

    fn range_end(&self) -> usize {
        self.range_start + self.range_size
    }

    /// Absolute buffer position of the offset, `None` once past the range.
    fn position(&self) -> Option<usize> {
        usize::try_from(self.offset)
            .ok()
            .filter(|&offset| offset < self.range_size)
            .map(|offset| self.range_start + offset)
    }
}

impl IoHandle for MemoryRangeHandle {
    fn kind(&self) -> HandleKind {
        HandleKind::MemoryRange
    }

    fn open(&mut self, mode: OpenMode) -> RandioResult<()> {
        require_closed(self.mode, HandleKind::MemoryRange)?;
        mode.validate()?;
        let len = self.buffer.read().len();
        if self.range_end() > len {
            bail!(
                Bounds,
                "memory range [{}, {}) exceeds buffer of {} bytes",
                self.range_start,
                self.range_end(),
                len
            );
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn close(&mut self) -> RandioResult<()> {
        require_open(self.mode, HandleKind::MemoryRange)?;
        self.mode = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize> {
        require_readable(self.mode, HandleKind::MemoryRange)?;
        let Some(position) = self.position() else {
            return Ok(0);
        };
        let data = self.buffer.read();
        // The buffer may have shrunk since the range was opened.
        let end = self.range_end().min(data.len());
        if position >= end {
            return Ok(0);
        }
        let count = buf.len().min(end - position);
        buf[..count].copy_from_slice(&data[position..position + count]);
        self.offset += count as u64;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> RandioResult<usize> {
        require_writable(self.mode, HandleKind::MemoryRange)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut data = self.buffer.write();
        let end = self.range_end().min(data.len());
        let position = match self.position() {
            Some(position) if position < end => position,
            _ => bail!(
                Bounds,
                "write at offset {} is outside the memory range of {} bytes",
                self.offset,
                self.range_size
            ),
        };
        let count = buf.len().min(end - position);
        data[position..position + count].copy_from_slice(&buf[..count]);
        self.offset += count as u64;
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::MemoryRange)?;
        self.offset = seek_target(pos, self.offset, self.range_size as u64)?;
        Ok(self.offset)
    }

    fn size(&mut self) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::MemoryRange)?;
        Ok(self.range_size as u64)
    }

    fn offset(&self) -> RandioResult<u64> {
        Ok(self.offset)
    }

    fn exists(&self) -> RandioResult<bool> {
        Ok(true)
    }

    fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    fn clone_closed(&self) -> RandioResult<Handle> {
        Ok(Handle::MemoryRange(MemoryRangeHandle {
            buffer: self.buffer.clone(),
            range_start: self.range_start,
            range_size: self.range_size,
            offset: 0,
            mode: None,
        }))
    }
}
