use std::fs::OpenOptions;

use randio_base::{RandioResult, bail};

/// Read/write capability requested when opening a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// Access mode passed to `open`.
///
/// `create`, `truncate` and `append` only affect file handles and require
/// write access.
///
/// ```
/// use randio::OpenMode;
///
/// let mode = OpenMode::write().create(true).truncate(true);
/// assert!(mode.can_write());
/// assert!(!mode.can_read());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpenMode {
    access: Access,
    create: bool,
    truncate: bool,
    append: bool,
}

impl OpenMode {
    pub fn new(access: Access) -> Self {
        Self {
            access,
            create: false,
            truncate: false,
            append: false,
        }
    }

    pub fn read() -> Self {
        Self::new(Access::Read)
    }

    pub fn write() -> Self {
        Self::new(Access::Write)
    }

    pub fn read_write() -> Self {
        Self::new(Access::ReadWrite)
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn can_read(&self) -> bool {
        matches!(self.access, Access::Read | Access::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self.access, Access::Write | Access::ReadWrite)
    }

    pub fn is_create(&self) -> bool {
        self.create
    }

    pub fn is_truncate(&self) -> bool {
        self.truncate
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    /// Mode used when reopening a handle that was opened before.
    ///
    /// Truncation is dropped so the data of the earlier session survives.
    pub fn for_reopen(self) -> Self {
        self.truncate(false)
    }

    pub(crate) fn validate(&self) -> RandioResult<()> {
        if !self.can_write() && (self.create || self.truncate || self.append) {
            bail!(
                Argument,
                "create, truncate and append require write access, got {:?}",
                self
            );
        }
        if self.append && self.truncate {
            bail!(Argument, "append and truncate are mutually exclusive");
        }
        Ok(())
    }

    pub(crate) fn to_open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.can_read())
            .write(self.can_write() && !self.append)
            .append(self.append)
            .create(self.create)
            .truncate(self.truncate);
        options
    }
}
