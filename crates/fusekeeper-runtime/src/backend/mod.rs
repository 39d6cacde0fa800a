//! Execution path abstraction.

pub mod direct;
pub mod pod;
pub mod systemd;

use async_trait::async_trait;
use fusekeeper_common::error::Result;
use fusekeeper_common::types::{MountMode, MountRequest};

/// One way of launching and supervising the driver process.
///
/// Implementors receive the argument vector built by
/// [`crate::plan::plan`] and prepend their own path-specific flags.
#[async_trait]
pub trait MountBackend: Send + Sync {
    /// The mode this backend implements.
    fn mode(&self) -> MountMode;

    /// Launches the driver for `request` and returns once the target is mounted.
    ///
    /// # Errors
    ///
    /// Returns an error if the launch is rejected, conflicts with an existing
    /// mount, or the target never becomes a mount point.
    async fn mount(&self, request: &MountRequest, args: &[String]) -> Result<()>;
}

/// Builds the driver flags common to every path:
/// `--endpoint <e> -o allow_other`.
pub(crate) fn endpoint_flags(endpoint: &str) -> [String; 4] {
    [
        "--endpoint".to_string(),
        endpoint.to_string(),
        "-o".to_string(),
        "allow_other".to_string(),
    ]
}
