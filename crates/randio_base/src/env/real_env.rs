use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::{IoResultExt, RandioError, RandioResult};

use super::traits::ProcessEnvironment;

/// `ProcessEnvironment` backed by the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealEnvironment;

impl RealEnvironment {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessEnvironment for RealEnvironment {
    #[instrument(skip(self))]
    fn current_dir(&self) -> RandioResult<String> {
        let dir = std::env::current_dir().map_io()?;
        let dir = dir.into_os_string().into_string().map_err(|raw| {
            Box::new(RandioError::runtime(format!(
                "working directory is not valid UTF-8: {:?}",
                raw
            )))
        })?;
        debug!(dir = %dir, "read working directory");
        Ok(dir)
    }

    #[instrument(skip(self))]
    fn set_current_dir(&self, dir: &str) -> RandioResult<()> {
        std::env::set_current_dir(dir).with_path(dir)?;
        debug!("changed working directory");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn read_file_to_string(&self, path: &Path) -> RandioResult<String> {
        let content = fs::read_to_string(path).with_path(path)?;
        debug!(bytes = content.len(), "read file");
        Ok(content)
    }
}
