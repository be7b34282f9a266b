use randio_base::{RandioResult, bail};

use super::PathStyle;

/// Shape of a raw path, decided from its prefix alone.
///
/// `rest` is the part after the prefix, still unsplit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PathKind<'a> {
    /// `C:\dir\file`
    DriveAbsolute { drive: char, rest: &'a str },
    /// `C:dir\file`, relative to the working directory of drive C
    DriveRelative { drive: char, rest: &'a str },
    /// `\dir\file`, relative to the volume of the working directory
    RootedRelative { rest: &'a str },
    /// `dir\file`
    Relative { rest: &'a str },
    /// `\\.\PhysicalDrive0`
    Device { rest: &'a str },
    /// `\\?\C:\dir\file`
    ExtendedLength { rest: &'a str },
    /// `\\server\share\dir\file`
    Unc {
        server: &'a str,
        share: &'a str,
        rest: &'a str,
    },
    /// `/dir/file`
    PosixAbsolute { rest: &'a str },
    /// `dir/file`
    PosixRelative { rest: &'a str },
}

impl PathKind<'_> {
    /// Whether the working directory is needed to resolve the path.
    pub fn needs_working_directory(&self) -> bool {
        matches!(
            self,
            PathKind::DriveRelative { .. }
                | PathKind::RootedRelative { .. }
                | PathKind::Relative { .. }
                | PathKind::PosixRelative { .. }
        )
    }
}

pub(crate) fn classify(path: &str, style: PathStyle) -> RandioResult<PathKind<'_>> {
    match style {
        PathStyle::Posix => Ok(match path.strip_prefix('/') {
            Some(rest) => PathKind::PosixAbsolute { rest },
            None => PathKind::PosixRelative { rest: path },
        }),
        PathStyle::Windows => classify_windows(path),
    }
}

fn classify_windows(path: &str) -> RandioResult<PathKind<'_>> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = char::from(bytes[0]);
        return Ok(match path[2..].strip_prefix('\\') {
            Some(rest) => PathKind::DriveAbsolute { drive, rest },
            None => PathKind::DriveRelative {
                drive,
                rest: &path[2..],
            },
        });
    }
    if let Some(rest) = path.strip_prefix(r"\\.\") {
        return Ok(PathKind::Device { rest });
    }
    if let Some(rest) = path.strip_prefix(r"\\?\") {
        return Ok(PathKind::ExtendedLength { rest });
    }
    if let Some(unc) = path.strip_prefix(r"\\") {
        let Some((server, after_server)) = unc.split_once('\\') else {
            bail!(Runtime, "UNC path {:?} is missing a share name", path);
        };
        if server.is_empty() {
            bail!(Runtime, "UNC path {:?} is missing a server name", path);
        }
        let (share, rest) = after_server.split_once('\\').unwrap_or((after_server, ""));
        if share.is_empty() {
            bail!(Runtime, "UNC path {:?} is missing a share name", path);
        }
        return Ok(PathKind::Unc {
            server,
            share,
            rest,
        });
    }
    if let Some(rest) = path.strip_prefix('\\') {
        return Ok(PathKind::RootedRelative { rest });
    }
    Ok(PathKind::Relative { rest: path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(path: &str) -> PathKind<'_> {
        classify(path, PathStyle::Windows).unwrap()
    }

    #[test]
    fn test_posix_forms() {
        assert_eq!(
            classify("/usr/lib", PathStyle::Posix).unwrap(),
            PathKind::PosixAbsolute { rest: "usr/lib" }
        );
        assert_eq!(
            classify("lib/x", PathStyle::Posix).unwrap(),
            PathKind::PosixRelative { rest: "lib/x" }
        );
    }

    #[test]
    fn test_drive_forms() {
        assert_eq!(
            windows(r"C:\dir\f"),
            PathKind::DriveAbsolute {
                drive: 'C',
                rest: r"dir\f"
            }
        );
        assert_eq!(
            windows("d:file.txt"),
            PathKind::DriveRelative {
                drive: 'd',
                rest: "file.txt"
            }
        );
        assert_eq!(windows("C:"), PathKind::DriveRelative { drive: 'C', rest: "" });
    }

    #[test]
    fn test_prefixed_forms() {
        assert_eq!(
            windows(r"\\.\PhysicalDrive0"),
            PathKind::Device {
                rest: "PhysicalDrive0"
            }
        );
        assert_eq!(
            windows(r"\\?\C:\x"),
            PathKind::ExtendedLength { rest: r"C:\x" }
        );
        assert_eq!(
            windows(r"\\srv\share\a\b"),
            PathKind::Unc {
                server: "srv",
                share: "share",
                rest: r"a\b"
            }
        );
        assert_eq!(
            windows(r"\\srv\share"),
            PathKind::Unc {
                server: "srv",
                share: "share",
                rest: ""
            }
        );
    }

    #[test]
    fn test_relative_forms() {
        assert_eq!(windows(r"\dir"), PathKind::RootedRelative { rest: "dir" });
        assert_eq!(windows(r"..\dir"), PathKind::Relative { rest: r"..\dir" });
        assert!(windows("x").needs_working_directory());
        assert!(!windows(r"C:\x").needs_working_directory());
    }

    #[test]
    fn test_unc_without_share_is_runtime_error() {
        for path in [r"\\srv", r"\\srv\", r"\\\share"] {
            let err = classify(path, PathStyle::Windows).unwrap_err();
            assert_eq!(err.kind().name(), "RuntimeError", "{}", path);
        }
    }
}
