use randio_base::{EnvHandle, RandioResult, ResultExt, bail};
use tracing::{debug, instrument, warn};

use super::classify::{PathKind, classify};
use super::{CanonicalPath, PathStyle};

/// Turns raw paths into canonical absolute paths.
///
/// ```
/// use randio::{PathResolver, PathStyle};
/// use randio_base::{EnvHandle, MockEnvironment};
///
/// let env = EnvHandle::new(MockEnvironment::new("/a/b/c"));
/// let resolver = PathResolver::new(env).with_style(PathStyle::Posix);
/// assert_eq!(resolver.resolve("../d/./e").unwrap().as_str(), "/a/b/d/e");
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    env: EnvHandle,
    style: PathStyle,
    extended_length_prefix: bool,
}

/// Volume a Windows path is rooted at.
#[derive(Debug)]
enum Root<'a> {
    Drive(char),
    Unc { server: &'a str, share: &'a str },
    /// Volume of an extended-length path, e.g. `C:` or `UNC\server\share`.
    Extended(String),
}

/// Switches the working directory and switches it back when dropped.
struct RestoreDir<'a> {
    env: &'a EnvHandle,
    saved: Option<String>,
}

impl<'a> RestoreDir<'a> {
    fn switch(env: &'a EnvHandle, target: &str) -> RandioResult<Self> {
        let saved = env
            .current_dir()
            .context("saving the working directory")?;
        env.set_current_dir(target)
            .with_context(|| format!("switching the working directory to {}", target))?;
        Ok(Self {
            env,
            saved: Some(saved),
        })
    }

    fn restore(mut self) -> RandioResult<()> {
        match self.saved.take() {
            Some(saved) => self
                .env
                .set_current_dir(&saved)
                .with_context(|| format!("restoring the working directory to {}", saved)),
            None => Ok(()),
        }
    }
}

impl Drop for RestoreDir<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(error) = self.env.set_current_dir(&saved) {
                warn!(dir = %saved, error = %error, "failed to restore the working directory");
            }
        }
    }
}

/// Folds `input` onto `stack`: drops empty and `.` segments, pops on `..`.
fn push_segments<'a>(
    stack: &mut Vec<&'a str>,
    input: &'a str,
    separator: char,
) -> RandioResult<()> {
    for segment in input.split(separator) {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    bail!(
                        Runtime,
                        "path {:?} refers above the root of its volume",
                        input
                    );
                }
            }
            _ => stack.push(segment),
        }
    }
    Ok(())
}

/// Splits the volume off the remainder of an extended-length path.
fn extended_volume(rest: &str) -> RandioResult<(String, &str)> {
    let (volume, after) = rest.split_once('\\').unwrap_or((rest, ""));
    if volume.is_empty() {
        bail!(Runtime, "extended-length path is missing a volume name");
    }
    if !volume.eq_ignore_ascii_case("UNC") {
        return Ok((volume.to_string(), after));
    }
    let mut parts = after.splitn(3, '\\');
    let server = parts.next().unwrap_or_default();
    let share = parts.next().unwrap_or_default();
    if server.is_empty() || share.is_empty() {
        bail!(Runtime, "extended-length UNC path is missing a server or share name");
    }
    Ok((
        format!("{}\\{}\\{}", volume, server, share),
        parts.next().unwrap_or_default(),
    ))
}

impl PathResolver {
    /// A resolver for the host's path style, reading the working directory through `env`.
    pub fn new(env: EnvHandle) -> Self {
        Self {
            env,
            style: PathStyle::native(),
            extended_length_prefix: false,
        }
    }

    pub fn with_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }

    /// Prefixes resolved Windows drive paths with `\\?\`.
    pub fn extended_length_prefix(mut self, enabled: bool) -> Self {
        self.extended_length_prefix = enabled;
        self
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// Resolves `raw` to a canonical absolute path.
    ///
    /// Only the working directory is consulted; the path itself need not exist.
    #[instrument(skip(self), fields(style = ?self.style))]
    pub fn resolve(&self, raw: &str) -> RandioResult<CanonicalPath> {
        self.check_length(raw, "path")?;
        if raw.contains('\0') {
            bail!(Argument, "path contains a NUL character");
        }
        let kind = classify(raw, self.style)?;
        let resolved = match kind {
            PathKind::PosixAbsolute { rest } => self.posix(Vec::new(), rest)?,
            PathKind::PosixRelative { rest } => {
                let cwd = self.current_dir()?;
                let Some(cwd_rest) = cwd.strip_prefix('/') else {
                    bail!(Runtime, "working directory {:?} is not absolute", cwd);
                };
                let mut base = Vec::new();
                push_segments(&mut base, cwd_rest, '/')?;
                self.posix(base, rest)?
            }
            PathKind::Device { rest } => {
                if rest.is_empty() {
                    bail!(Runtime, "device path is missing a device name");
                }
                format!(r"\\.\{}", rest)
            }
            PathKind::ExtendedLength { rest } => {
                let (volume, rest) = extended_volume(rest)?;
                self.windows(Root::Extended(volume), Vec::new(), rest)?
            }
            PathKind::Unc {
                server,
                share,
                rest,
            } => self.windows(Root::Unc { server, share }, Vec::new(), rest)?,
            PathKind::DriveAbsolute { drive, rest } => {
                self.windows(Root::Drive(drive), Vec::new(), rest)?
            }
            PathKind::DriveRelative { drive, rest } => {
                let cwd = self.drive_dir(drive)?;
                self.windows_relative(&cwd, rest, false)?
            }
            PathKind::RootedRelative { rest } => {
                let cwd = self.current_dir()?;
                self.windows_relative(&cwd, rest, true)?
            }
            PathKind::Relative { rest } => {
                let cwd = self.current_dir()?;
                self.windows_relative(&cwd, rest, false)?
            }
        };
        self.check_length(&resolved, "resolved path")?;
        debug!(
            resolved = %resolved,
            used_cwd = kind.needs_working_directory(),
            "resolved path"
        );
        Ok(CanonicalPath::new(resolved))
    }

    fn check_length(&self, path: &str, what: &str) -> RandioResult<()> {
        if path.is_empty() {
            bail!(Argument, "{} is empty", what);
        }
        let max = self.style.max_path_length();
        if path.len() > max {
            bail!(
                Argument,
                "{} of {} bytes exceeds the maximum of {}",
                what,
                path.len(),
                max
            );
        }
        Ok(())
    }

    fn current_dir(&self) -> RandioResult<String> {
        self.env
            .current_dir()
            .context("reading the working directory")
    }

    /// Working directory of `drive`, read by switching to the drive and back.
    #[instrument(skip(self))]
    fn drive_dir(&self, drive: char) -> RandioResult<String> {
        let guard = RestoreDir::switch(&self.env, &format!("{}:", drive))?;
        let dir = self
            .env
            .current_dir()
            .with_context(|| format!("reading the working directory of drive {}", drive))?;
        guard.restore()?;
        debug!(dir = %dir, "read drive working directory");
        Ok(dir)
    }

    fn posix<'a>(&self, mut stack: Vec<&'a str>, rest: &'a str) -> RandioResult<String> {
        push_segments(&mut stack, rest, '/')?;
        Ok(format!("/{}", stack.join("/")))
    }

    /// Resolves a relative Windows path against `cwd`. With `rooted`, only
    /// the volume of `cwd` is kept.
    fn windows_relative(&self, cwd: &str, rest: &str, rooted: bool) -> RandioResult<String> {
        let (root, cwd_rest) = match classify(cwd, PathStyle::Windows)? {
            PathKind::DriveAbsolute { drive, rest } => (Root::Drive(drive), rest),
            PathKind::Unc {
                server,
                share,
                rest,
            } => (Root::Unc { server, share }, rest),
            PathKind::ExtendedLength { rest } => {
                let (volume, rest) = extended_volume(rest)?;
                (Root::Extended(volume), rest)
            }
            PathKind::Device { .. } => {
                bail!(Runtime, "working directory {:?} is a device path", cwd)
            }
            _ => bail!(Runtime, "working directory {:?} is not absolute", cwd),
        };
        let mut base = Vec::new();
        if !rooted {
            push_segments(&mut base, cwd_rest, '\\')?;
        }
        self.windows(root, base, rest)
    }

    fn windows<'a>(
        &self,
        root: Root<'_>,
        mut stack: Vec<&'a str>,
        rest: &'a str,
    ) -> RandioResult<String> {
        push_segments(&mut stack, rest, '\\')?;
        let joined = stack.join("\\");
        let resolved = match root {
            Root::Drive(drive) => {
                let prefix = if self.extended_length_prefix { r"\\?\" } else { "" };
                format!("{}{}:\\{}", prefix, drive, joined)
            }
            Root::Unc { server, share } => {
                with_segments(format!(r"\\?\UNC\{}\{}", server, share), &joined)
            }
            Root::Extended(volume) => with_segments(format!(r"\\?\{}", volume), &joined),
        };
        Ok(resolved)
    }
}

fn with_segments(mut prefix: String, joined: &str) -> String {
    if !joined.is_empty() {
        prefix.push('\\');
        prefix.push_str(joined);
    }
    prefix
}
