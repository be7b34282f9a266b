use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{RandioError, RandioResult};

use super::traits::ProcessEnvironment;

/// In-memory `ProcessEnvironment` for tests.
///
/// Keeps a working directory, a remembered working directory per drive
/// letter, a set of files and a log of every `set_current_dir` call.
/// Clones share the same state.
///
/// # Examples
///
/// ```
/// use randio_base::{MockEnvironment, ProcessEnvironment};
///
/// let env = MockEnvironment::new("C:\\work");
/// env.set_drive_dir('D', "D:\\data\\in");
///
/// env.set_current_dir("D:").unwrap();
/// assert_eq!(env.current_dir().unwrap(), "D:\\data\\in");
/// ```
#[derive(Debug, Clone)]
pub struct MockEnvironment {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    current_dir: String,
    drive_dirs: HashMap<char, String>,
    files: HashMap<PathBuf, String>,
    current_dir_failure: Option<String>,
    set_current_dir_calls: Vec<String>,
}

fn drive_letter(dir: &str) -> Option<char> {
    let mut chars = dir.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            Some(letter.to_ascii_uppercase())
        }
        _ => None,
    }
}

impl MockEnvironment {
    /// Creates an environment whose working directory is `current_dir`.
    pub fn new(current_dir: impl Into<String>) -> Self {
        let current_dir = current_dir.into();
        let mut state = MockState::default();
        if let Some(letter) = drive_letter(&current_dir) {
            state.drive_dirs.insert(letter, current_dir.clone());
        }
        state.current_dir = current_dir;
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Sets the working directory remembered for a drive.
    pub fn set_drive_dir(&self, letter: char, dir: impl Into<String>) {
        self.state
            .lock()
            .drive_dirs
            .insert(letter.to_ascii_uppercase(), dir.into());
    }

    /// Adds a file readable through `read_file_to_string`.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.state.lock().files.insert(path.into(), content.into());
    }

    /// Makes every subsequent `current_dir` call fail with an I/O error.
    pub fn fail_current_dir(&self, message: impl Into<String>) {
        self.state.lock().current_dir_failure = Some(message.into());
    }

    /// Arguments of every `set_current_dir` call, in order.
    pub fn set_current_dir_calls(&self) -> Vec<String> {
        self.state.lock().set_current_dir_calls.clone()
    }
}

impl Default for MockEnvironment {
    fn default() -> Self {
        Self::new("/")
    }
}

impl ProcessEnvironment for MockEnvironment {
    fn current_dir(&self) -> RandioResult<String> {
        let state = self.state.lock();
        if let Some(message) = &state.current_dir_failure {
            return Err(Box::new(RandioError::io(
                None,
                io::Error::other(message.clone()),
            )));
        }
        Ok(state.current_dir.clone())
    }

    fn set_current_dir(&self, dir: &str) -> RandioResult<()> {
        let mut state = self.state.lock();
        state.set_current_dir_calls.push(dir.to_string());

        match drive_letter(dir) {
            Some(letter) if dir.len() == 2 => {
                let drive_dir = state
                    .drive_dirs
                    .get(&letter)
                    .cloned()
                    .unwrap_or_else(|| format!("{}:\\", letter));
                state.current_dir = drive_dir;
            }
            Some(letter) => {
                state.drive_dirs.insert(letter, dir.to_string());
                state.current_dir = dir.to_string();
            }
            None => state.current_dir = dir.to_string(),
        }
        Ok(())
    }

    fn read_file_to_string(&self, path: &Path) -> RandioResult<String> {
        let state = self.state.lock();
        state.files.get(path).cloned().ok_or_else(|| {
            Box::new(RandioError::io(
                Some(path.to_path_buf()),
                io::Error::new(io::ErrorKind::NotFound, "file not found"),
            ))
        })
    }
}
