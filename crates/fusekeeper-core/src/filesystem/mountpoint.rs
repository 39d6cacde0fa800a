//! Mount-point detection.
//!
//! A path is treated as a mount point when its device id differs from its
//! parent's, or when it is listed in the mount table. The second check
//! catches bind mounts of the same device.

use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use fusekeeper_common::error::{MountError, Result};
use nix::errno::Errno;

/// Default location of the calling process's mount table.
pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Answers whether a path is currently a mount point.
pub trait MountProbe: Send + Sync {
    /// Returns `true` if `path` is a mount point.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be inspected.
    fn is_mount_point(&self, path: &Path) -> Result<bool>;
}

/// Probe backed by `stat(2)` and `/proc/self/mountinfo`.
#[derive(Debug, Clone)]
pub struct ProcMountProbe {
    mountinfo: PathBuf,
}

impl ProcMountProbe {
    /// Creates a probe reading the calling process's mount table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mountinfo: PathBuf::from(PROC_MOUNTINFO),
        }
    }

    /// Creates a probe reading an alternative mountinfo file.
    #[must_use]
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: path.into(),
        }
    }

    fn listed_in_mountinfo(&self, path: &Path) -> Result<bool> {
        let contents = match std::fs::read_to_string(&self.mountinfo) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(MountError::Io {
                    path: self.mountinfo.clone(),
                    source: e,
                });
            }
        };
        Ok(parse_mount_points(&contents).iter().any(|m| m == path))
    }
}

impl Default for ProcMountProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MountProbe for ProcMountProbe {
    fn is_mount_point(&self, path: &Path) -> Result<bool> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            // FUSE endpoint whose driver has not attached yet, or has gone.
            Err(e) if e.raw_os_error() == Some(Errno::ENOTCONN as i32) => return Ok(false),
            Err(e) => {
                return Err(MountError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        let Some(parent) = path.parent() else {
            return Ok(true);
        };
        let parent_meta = std::fs::metadata(parent).map_err(|e| MountError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
        if meta.dev() != parent_meta.dev() {
            return Ok(true);
        }
        self.listed_in_mountinfo(path)
    }
}

/// Extracts the mount point column from `mountinfo` contents.
#[must_use]
pub fn parse_mount_points(contents: &str) -> Vec<PathBuf> {
    contents
        .lines()
        .filter_map(|line| {
            let (left, _) = line.split_once(" - ")?;
            let field = left.split_whitespace().nth(4)?;
            Some(PathBuf::from(unescape_octal(field)))
        })
        .collect()
}

/// Decodes the `\ooo` escapes the kernel uses for whitespace and backslashes.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..=i + 3]) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
