use std::path::Path;
use std::sync::Arc;

use crate::RandioResult;

/// Access to process-wide state needed by path resolution and config loading.
///
/// Two implementations are provided:
/// - `RealEnvironment`: the real process via `std::env` and `std::fs`
/// - `MockEnvironment`: in-memory state for tests
pub trait ProcessEnvironment: std::fmt::Debug + Send + Sync + 'static {
    /// Current working directory of the process.
    fn current_dir(&self) -> RandioResult<String>;

    /// Changes the working directory of the process.
    ///
    /// On Windows a bare drive designator such as `"D:"` switches to the
    /// working directory remembered for that drive.
    fn set_current_dir(&self, dir: &str) -> RandioResult<()>;

    /// Reads an entire file as UTF-8.
    fn read_file_to_string(&self, path: &Path) -> RandioResult<String>;
}

/// Shared handle to a `ProcessEnvironment` implementation.
///
/// Wraps `Arc<dyn ProcessEnvironment>` so resolvers and loaders can hold the
/// environment without lifetime parameters.
///
/// ```
/// use randio_base::{EnvHandle, MockEnvironment};
///
/// let env = EnvHandle::new(MockEnvironment::new("/home/user"));
/// assert_eq!(env.current_dir().unwrap(), "/home/user");
/// ```
#[derive(Debug, Clone)]
pub struct EnvHandle(Arc<dyn ProcessEnvironment>);

impl EnvHandle {
    pub fn new(env: impl ProcessEnvironment + 'static) -> Self {
        Self(Arc::new(env))
    }
}

impl std::ops::Deref for EnvHandle {
    type Target = dyn ProcessEnvironment;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
