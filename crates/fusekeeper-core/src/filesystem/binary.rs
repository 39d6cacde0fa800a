//! Copy-if-stale installation of the driver binary on the host.
//!
//! Staleness is judged by size and modification time only. The destination
//! is removed before the copy so a running executable is never overwritten
//! in place (`ETXTBSY`).

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use filetime::FileTime;
use fusekeeper_common::error::{MountError, Result};

/// Result of a [`sync_binary`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Destination already matched the source; nothing was written.
    UpToDate,
    /// Destination was missing or stale and has been replaced.
    Copied,
}

/// Makes `to` a copy of `from` unless size and mtime already match.
///
/// The copy is made executable (`0755`) and stamped with the source's
/// modification time so the next call sees it as current.
///
/// # Errors
///
/// Returns [`MountError::BinarySync`] if any stat, remove, copy, or
/// timestamp operation fails.
pub fn sync_binary(from: &Path, to: &Path) -> Result<SyncAction> {
    let fail = |source: std::io::Error| MountError::BinarySync {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let src = fs::metadata(from).map_err(fail)?;
    let src_mtime = FileTime::from_last_modification_time(&src);

    match fs::metadata(to) {
        Ok(dst) => {
            if dst.len() == src.len() && FileTime::from_last_modification_time(&dst) == src_mtime {
                tracing::debug!(path = %to.display(), "driver binary up to date");
                return Ok(SyncAction::UpToDate);
            }
            fs::remove_file(to).map_err(fail)?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(fail(e)),
    }

    let _ = fs::copy(from, to).map_err(fail)?;
    fs::set_permissions(to, fs::Permissions::from_mode(0o755)).map_err(fail)?;
    filetime::set_file_times(to, src_mtime, src_mtime).map_err(fail)?;

    tracing::info!(
        from = %from.display(),
        to = %to.display(),
        bytes = src.len(),
        "driver binary copied"
    );
    Ok(SyncAction::Copied)
}
