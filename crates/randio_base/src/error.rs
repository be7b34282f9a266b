use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # How are randio errors structured?

Every failure is an `ErrorKind` (the category callers match on) wrapped in a
`RandioError` that carries the propagation context, an optional cause and the
span trace active when the error was created.

The categories map one to one onto the failure classes of the handle and pool
operations: bad arguments, wrong open/closed state, OS failures, range
violations, exhausted pool capacity, allocation failures and broken internal
invariants.
*/

/// Error categories reported by handle, pool and path operations.
#[derive(Debug)]
pub enum ErrorKind {
    /// Invalid parameter: bad index, negative seek target, empty or oversized path.
    Argument { message: String },

    /// Operation attempted in the wrong open/closed state, or a set-once value was already set.
    InvalidState { message: String },

    /// Underlying OS operation failed.
    Io {
        path: Option<PathBuf>,
        source: io::Error,
    },

    /// A write or resolution would cross a range boundary.
    Bounds { message: String },

    /// Pool capacity cannot be satisfied.
    Resource { message: String },

    /// Allocation failure.
    Memory { message: String },

    /// Internal invariant violated, e.g. a path without a volume or share name.
    Runtime { message: String },
}

impl ErrorKind {
    /// Stable name of the category, e.g. `"ArgumentError"`.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Argument { .. } => "ArgumentError",
            ErrorKind::InvalidState { .. } => "InvalidState",
            ErrorKind::Io { .. } => "IoError",
            ErrorKind::Bounds { .. } => "BoundsError",
            ErrorKind::Resource { .. } => "ResourceError",
            ErrorKind::Memory { .. } => "MemoryError",
            ErrorKind::Runtime { .. } => "RuntimeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Argument { message } => write!(f, "invalid argument: {}", message),
            ErrorKind::InvalidState { message } => write!(f, "invalid state: {}", message),
            ErrorKind::Io {
                path: Some(path),
                source,
            } => write!(f, "I/O error at {}: {}", path.display(), source),
            ErrorKind::Io { path: None, source } => write!(f, "I/O error: {}", source),
            ErrorKind::Bounds { message } => write!(f, "out of bounds: {}", message),
            ErrorKind::Resource { message } => write!(f, "resource exhausted: {}", message),
            ErrorKind::Memory { message } => write!(f, "memory error: {}", message),
            ErrorKind::Runtime { message } => write!(f, "runtime error: {}", message),
        }
    }
}

/// Error value returned by every fallible randio operation.
pub struct RandioError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<RandioError>>,
    span_trace: SpanTrace,
}

impl RandioError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument {
            message: message.into(),
        })
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState {
            message: message.into(),
        })
    }

    pub fn bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Bounds {
            message: message.into(),
        })
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resource {
            message: message.into(),
        })
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Memory {
            message: message.into(),
        })
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime {
            message: message.into(),
        })
    }

    /// Wraps an OS error, optionally naming the path it concerns.
    pub fn io(path: Option<PathBuf>, source: io::Error) -> Self {
        Self::new(ErrorKind::Io { path, source })
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records the error that led to this one.
    pub fn caused_by(mut self, cause: impl Into<Box<RandioError>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    pub fn cause(&self) -> Option<&RandioError> {
        self.cause.as_deref()
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// OS error number of an `Io` error, if the OS reported one.
    pub fn os_error_code(&self) -> Option<i32> {
        match &self.kind {
            ErrorKind::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        let item_count = self.context.len() + usize::from(self.cause.is_some());
        for (i, ctx) in self.context.iter().enumerate() {
            let connector = if i + 1 == item_count { "└─" } else { "├─" };
            writeln!(f, "{}{} {}", indent, connector, ctx)?;
        }
        if let Some(cause) = &self.cause {
            writeln!(f, "{}└─ cause: {}", indent, cause.kind)?;
            cause.fmt_tree(f, &format!("{}   ", indent))?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for RandioError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for RandioError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::Io { source, .. } => Some(source),
            _ => self
                .cause
                .as_deref()
                .map(|cause| cause as &(dyn StdError + 'static)),
        }
    }
}

impl fmt::Display for RandioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }
        write!(f, "{}", self.kind)
    }
}

impl fmt::Debug for RandioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        self.fmt_tree(f, "")?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/// Standard result type for randio operations.
pub type RandioResult<T> = std::result::Result<T, Box<RandioError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> RandioResult<T>;

    /// Attaches context using lazy evaluation.
    fn with_context<F>(self, f: F) -> RandioResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for RandioResult<T> {
    fn context(self, context: impl Into<String>) -> RandioResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> RandioResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Lifts `std::io::Result` into `RandioResult` as an `Io` error.
pub trait IoResultExt<T> {
    /// Converts the error, recording the path the operation concerned.
    fn with_path(self, path: impl AsRef<Path>) -> RandioResult<T>;

    /// Converts the error without a path.
    fn map_io(self) -> RandioResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> RandioResult<T> {
        self.map_err(|e| Box::new(RandioError::io(Some(path.as_ref().to_path_buf()), e)))
    }

    fn map_io(self) -> RandioResult<T> {
        self.map_err(|e| Box::new(RandioError::io(None, e)))
    }
}

/// Builds a boxed `RandioError` of the given kind from a format string.
///
/// ```
/// use randio_base::err;
///
/// let error = err!(Argument, "slot {} does not exist", 3);
/// assert_eq!(error.to_string(), "invalid argument: slot 3 does not exist");
/// ```
#[macro_export]
macro_rules! err {
    ($kind:ident, $($arg:tt)+) => {
        ::std::boxed::Box::new($crate::RandioError::new($crate::error::ErrorKind::$kind {
            message: format!($($arg)+),
        }))
    };
}

/// Returns early with an error built by [`err!`].
#[macro_export]
macro_rules! bail {
    ($kind:ident, $($arg:tt)+) => {
        return Err($crate::err!($kind, $($arg)+))
    };
}
