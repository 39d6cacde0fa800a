//! Bounded wait for a target to become a mount point.
//!
//! The wait is a plain future: an enclosing timeout or task abort drops it
//! between polls, so cancellation needs no extra plumbing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fusekeeper_common::constants::READY_POLL_INTERVAL;
use fusekeeper_common::error::{MountError, Result};
use tokio::time::Instant;

use crate::filesystem::mountpoint::{MountProbe, ProcMountProbe};

/// Polls a [`MountProbe`] at a fixed interval.
#[derive(Clone)]
pub struct ReadinessWaiter {
    probe: Arc<dyn MountProbe>,
    interval: Duration,
}

impl ReadinessWaiter {
    /// Creates a waiter using the given probe and poll interval.
    #[must_use]
    pub fn new(probe: Arc<dyn MountProbe>, interval: Duration) -> Self {
        Self { probe, interval }
    }

    /// Waits until `target` is a mount point or `timeout` elapses.
    ///
    /// The probe is consulted once before the deadline is checked, so a
    /// target that is already mounted succeeds even with a zero timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::ReadinessTimeout`] when the deadline elapses,
    /// or the probe's own error if the target cannot be inspected.
    pub async fn wait(&self, target: &Path, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            if self.probe.is_mount_point(target)? {
                tracing::info!(
                    mountpoint = %target.display(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "mount is ready"
                );
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::warn!(mountpoint = %target.display(), ?timeout, "mount never became ready");
                return Err(MountError::ReadinessTimeout {
                    target: target.to_path_buf(),
                    timeout,
                });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(Arc::new(ProcMountProbe::new()), READY_POLL_INTERVAL)
    }
}

impl std::fmt::Debug for ReadinessWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessWaiter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
