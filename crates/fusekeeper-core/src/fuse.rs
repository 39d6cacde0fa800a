//! Foreground FUSE mounts and detaching.
//!
//! The driver daemonizes once the mount is attached, so running it to
//! completion and then polling the target is enough to confirm success.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use fusekeeper_common::error::{MountError, Result};

use crate::readiness::ReadinessWaiter;

/// Runs `command` with `args` and waits for `target` to become a mount point.
///
/// `env` is applied to the child only; the calling process's environment
/// is not modified. Standard error is inherited so the driver's log
/// reaches the caller's log stream.
///
/// # Errors
///
/// Returns [`MountError::Spawn`] if the command cannot be started or exits
/// unsuccessfully, or [`MountError::ReadinessTimeout`] if the target never
/// becomes a mount point within `timeout`.
pub async fn fuse_mount(
    waiter: &ReadinessWaiter,
    target: &Path,
    command: &str,
    args: &[String],
    env: &[(String, String)],
    timeout: Duration,
) -> Result<()> {
    tracing::info!(mountpoint = %target.display(), command, ?args, "mounting fuse");

    let output = tokio::process::Command::new(command)
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .await
        .map_err(|e| MountError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(MountError::Spawn {
            command: command.to_string(),
            message: format!(
                "{}; output: {}",
                output.status,
                String::from_utf8_lossy(&output.stdout).trim()
            ),
        });
    }

    waiter.wait(target, timeout).await
}

/// Lazily detaches the filesystem mounted at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn fuse_unmount(target: &Path) -> Result<()> {
    nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
        MountError::Io {
            path: target.to_path_buf(),
            source: std::io::Error::from(e),
        }
    })?;
    tracing::info!(mountpoint = %target.display(), "fuse mount detached");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; detaching mounts requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn fuse_unmount(_target: &Path) -> Result<()> {
    Err(MountError::Config {
        message: "Linux required for unmounting".into(),
    })
}
