use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use randio_base::{IoResultExt, RandioResult, bail, err};
use tracing::{debug, instrument, trace};

use super::{
    Handle, HandleKind, IoHandle, OpenMode, require_closed, require_open, require_readable,
    require_writable, seek_target,
};

/// Handle over a file on disk.
///
/// The OS descriptor only exists while the handle is open. The file cursor
/// is kept in step with `offset` so reads and writes never need an extra seek.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    file: Option<File>,
    mode: Option<OpenMode>,
    offset: u64,
    size: Option<u64>,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            mode: None,
            offset: 0,
            size: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Points the handle at another file. Only allowed while closed.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> RandioResult<()> {
        if self.file.is_some() {
            bail!(
                InvalidState,
                "cannot change the path of open file handle {}",
                self.path.display()
            );
        }
        self.path = path.into();
        self.offset = 0;
        self.size = None;
        Ok(())
    }
}

fn open_file<'a>(file: &'a mut Option<File>, path: &Path) -> RandioResult<&'a mut File> {
    file.as_mut()
        .ok_or_else(|| err!(InvalidState, "file handle {} is not open", path.display()))
}

/// Reads until `buf` is full or the reader reports end of data. An error
/// after some bytes arrived ends the read with the partial count.
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(count) => filled += count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if filled > 0 => {
                debug!(filled, error = %e, "read stopped early");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writes all of `buf` unless the writer fails. An error after some bytes
/// were written ends the write with the partial count.
fn write_fully(writer: &mut impl Write, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) if written > 0 => break,
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(count) => written += count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if written > 0 => {
                debug!(written, error = %e, "write stopped early");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

impl IoHandle for FileHandle {
    fn kind(&self) -> HandleKind {
        HandleKind::File
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn open(&mut self, mode: OpenMode) -> RandioResult<()> {
        require_closed(self.mode, HandleKind::File)?;
        mode.validate()?;
        if self.path.as_os_str().is_empty() {
            bail!(Argument, "file handle has no path");
        }
        let file = mode.to_open_options().open(&self.path).with_path(&self.path)?;
        self.file = Some(file);
        self.mode = Some(mode);
        self.offset = 0;
        self.size = None;
        debug!("opened file");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn close(&mut self) -> RandioResult<()> {
        require_open(self.mode, HandleKind::File)?;
        // Dropping the File releases the descriptor.
        self.file = None;
        self.mode = None;
        debug!(offset = self.offset, "closed file");
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> RandioResult<usize> {
        require_readable(self.mode, HandleKind::File)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let file = open_file(&mut self.file, &self.path)?;
        let count = read_fully(file, buf).with_path(&self.path)?;
        self.offset += count as u64;
        trace!(count, offset = self.offset, "read from file");
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> RandioResult<usize> {
        require_writable(self.mode, HandleKind::File)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let append = self.mode.is_some_and(|mode| mode.is_append());
        let file = open_file(&mut self.file, &self.path)?;
        let count = write_fully(file, buf).with_path(&self.path)?;
        self.offset = if append {
            file.stream_position().with_path(&self.path)?
        } else {
            self.offset + count as u64
        };
        if self.size.is_some_and(|size| self.offset > size) {
            self.size = None;
        }
        trace!(count, offset = self.offset, "wrote to file");
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::File)?;
        let size = match pos {
            SeekFrom::End(_) => self.size()?,
            _ => 0,
        };
        let target = seek_target(pos, self.offset, size)?;
        let file = open_file(&mut self.file, &self.path)?;
        file.seek(SeekFrom::Start(target)).with_path(&self.path)?;
        self.offset = target;
        Ok(target)
    }

    fn size(&mut self) -> RandioResult<u64> {
        require_open(self.mode, HandleKind::File)?;
        if let Some(size) = self.size {
            return Ok(size);
        }
        let file = open_file(&mut self.file, &self.path)?;
        let size = file.metadata().with_path(&self.path)?.len();
        self.size = Some(size);
        Ok(size)
    }

    fn offset(&self) -> RandioResult<u64> {
        Ok(self.offset)
    }

    fn exists(&self) -> RandioResult<bool> {
        if self.path.as_os_str().is_empty() {
            bail!(Argument, "file handle has no path");
        }
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_path(&self.path),
        }
    }

    fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    fn clone_closed(&self) -> RandioResult<Handle> {
        Ok(Handle::File(FileHandle::new(self.path.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_with(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    /// Hands out `chunk` bytes per call and fails once `fail_after` bytes
    /// have moved.
    struct Flaky {
        moved: usize,
        chunk: usize,
        fail_after: usize,
    }

    impl Flaky {
        fn new(chunk: usize, fail_after: usize) -> Self {
            Self {
                moved: 0,
                chunk,
                fail_after,
            }
        }

        fn step(&mut self, len: usize) -> io::Result<usize> {
            if self.moved >= self.fail_after {
                return Err(io::Error::other("device gone"));
            }
            let count = len.min(self.chunk).min(self.fail_after - self.moved);
            self.moved += count;
            Ok(count)
        }
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let count = self.step(buf.len())?;
            buf[..count].fill(b'x');
            Ok(count)
        }
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.step(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_after_partial_transfer_reports_count() {
        let mut source = Flaky::new(3, 4);
        let mut buf = [0u8; 10];
        assert_eq!(read_fully(&mut source, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"xxxx");
        assert!(read_fully(&mut source, &mut buf).is_err());

        let mut sink = Flaky::new(3, 4);
        assert_eq!(write_fully(&mut sink, b"0123456789").unwrap(), 4);
        assert!(write_fully(&mut sink, b"89").is_err());
    }

    #[test]
    fn test_open_read_close() {
        let (_dir, path) = file_with(b"hello world");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(handle.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(handle.offset().unwrap(), 5);
        handle.close().unwrap();
        assert!(!handle.is_open());
    }

    #[test]
    fn test_open_twice_is_invalid_state() {
        let (_dir, path) = file_with(b"x");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        let err = handle.open(OpenMode::read()).unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
    }

    #[test]
    fn test_close_closed_is_invalid_state() {
        let mut handle = FileHandle::new("/nonexistent/file");
        let err = handle.close().unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let mut handle = FileHandle::new(dir.path().join("missing.bin"));
        let err = handle.open(OpenMode::read()).unwrap_err();
        assert_eq!(err.kind().name(), "IoError");
        assert!(err.os_error_code().is_some());
        assert!(!handle.is_open());
    }

    #[test]
    fn test_read_requires_open() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        let mut buf = [0u8; 3];
        let err = handle.read(&mut buf).unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
    }

    #[test]
    fn test_write_requires_write_mode() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        let err = handle.write(b"x").unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
    }

    #[test]
    fn test_zero_length_read_returns_zero() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        assert_eq!(handle.read(&mut []).unwrap(), 0);
        assert_eq!(handle.offset().unwrap(), 0);
    }

    #[test]
    fn test_read_at_end_returns_zero() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        handle.seek(SeekFrom::End(0)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(handle.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_reread_after_seek_to_start() {
        let (_dir, path) = file_with(b"0123456789");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();

        let mut first = [0u8; 10];
        handle.read(&mut first).unwrap();
        handle.seek(SeekFrom::Start(0)).unwrap();
        let mut second = [0u8; 10];
        handle.read(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seek_negative_is_argument_error() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        let err = handle.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind().name(), "ArgumentError");
        assert_eq!(handle.offset().unwrap(), 0);
    }

    #[test]
    fn test_seek_past_end_then_write_extends() {
        let (_dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read_write()).unwrap();
        assert_eq!(handle.size().unwrap(), 3);

        assert_eq!(handle.seek(SeekFrom::End(2)).unwrap(), 5);
        assert_eq!(handle.write(b"z").unwrap(), 1);
        assert_eq!(handle.size().unwrap(), 6);
        handle.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"abc\0\0z");
    }

    #[test]
    fn test_create_truncate() {
        let (_dir, path) = file_with(b"old content");
        let mut handle = FileHandle::new(&path);
        handle
            .open(OpenMode::write().create(true).truncate(true))
            .unwrap();
        handle.write(b"new").unwrap();
        handle.close().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_append_moves_offset_to_end() {
        let (_dir, path) = file_with(b"head");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::write().append(true)).unwrap();
        handle.write(b"-tail").unwrap();
        assert_eq!(handle.offset().unwrap(), 9);
        handle.close().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"head-tail");
    }

    #[test]
    fn test_open_resets_offset() {
        let (_dir, path) = file_with(b"abcdef");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        handle.seek(SeekFrom::Start(4)).unwrap();
        handle.close().unwrap();
        handle.open(OpenMode::read()).unwrap();
        assert_eq!(handle.offset().unwrap(), 0);
    }

    #[test]
    fn test_exists() {
        let (dir, path) = file_with(b"");
        assert!(FileHandle::new(&path).exists().unwrap());
        assert!(!FileHandle::new(dir.path().join("other")).exists().unwrap());
    }

    #[test]
    fn test_set_path_only_while_closed() {
        let (dir, path) = file_with(b"abc");
        let mut handle = FileHandle::new(&path);
        handle.open(OpenMode::read()).unwrap();
        assert!(handle.set_path(dir.path().join("b")).is_err());
        handle.close().unwrap();
        handle.set_path(dir.path().join("b")).unwrap();
        assert_eq!(handle.path(), dir.path().join("b"));
    }

    #[test]
    fn test_clone_closed_is_independent() {
        let (_dir, path) = file_with(b"0123456789");
        let mut original = FileHandle::new(&path);
        original.open(OpenMode::read()).unwrap();
        original.seek(SeekFrom::Start(3)).unwrap();

        let mut clone = original.clone_closed().unwrap();
        assert!(!clone.is_open());
        clone.open(OpenMode::read()).unwrap();
        let mut buf = [0u8; 6];
        clone.read(&mut buf).unwrap();

        assert!(original.is_open());
        assert_eq!(original.offset().unwrap(), 3);
        assert_eq!(clone.offset().unwrap(), 6);
    }
}
