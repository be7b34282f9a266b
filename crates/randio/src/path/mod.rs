/* 📖 # How are paths made absolute?

`PathResolver` turns a raw path into a fully qualified one without asking the
filesystem anything except the working directory. It never checks that the
path exists and never follows symbolic links: resolution is purely lexical.

1. The path is classified by its prefix (`classify`).
2. Relative forms are based on the working directory. A Windows
   drive-relative path such as `C:file.txt` is based on the working
   directory *of that drive*, which can only be read by switching the
   process to the drive and back. That switch goes through the
   `ProcessEnvironment` and is undone on every exit path.
3. Segments are folded left to right: empty segments and `.` are dropped,
   `..` removes the most recently kept segment. A `..` with nothing left to
   remove is a `Runtime` error.
4. The result is rebuilt with the prefix of its volume and a single
   separator between segments.

Because of the drive switch, resolving concurrently with anything else that
reads or changes the working directory must be serialized by the caller.
*/

mod classify;
mod resolver;

use std::fmt;
use std::path::Path;

use serde::Deserialize;

pub use resolver::PathResolver;

/// Path syntax a resolver works with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// `/`-separated, rooted at `/`.
    Posix,
    /// `\`-separated, with drive letters, UNC shares, device and extended-length prefixes.
    Windows,
}

impl PathStyle {
    /// Style of the host platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    pub fn separator(self) -> char {
        match self {
            PathStyle::Posix => '/',
            PathStyle::Windows => '\\',
        }
    }

    /// Longest raw or resolved path accepted, in bytes.
    pub fn max_path_length(self) -> usize {
        match self {
            PathStyle::Posix => 4096,
            PathStyle::Windows => 32767,
        }
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::native()
    }
}

/// A fully qualified path with no `.` or `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub(crate) fn new(path: String) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the path text.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length including a terminating NUL, for buffers handed to C APIs.
    pub fn size(&self) -> usize {
        self.0.len() + 1
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
