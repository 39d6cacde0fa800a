//! Foreground execution of the driver.
//!
//! No supervision beyond the current process: if the plugin container
//! goes away the mount goes with it.

use std::time::Duration;

use async_trait::async_trait;
use fusekeeper_common::config::MounterConfig;
use fusekeeper_common::constants::DRIVER_LOG_FILE;
use fusekeeper_common::error::Result;
use fusekeeper_common::types::{MountMode, MountRequest};
use fusekeeper_core::fuse::fuse_mount;
use fusekeeper_core::readiness::ReadinessWaiter;

use super::{MountBackend, endpoint_flags};

/// Runs the driver as a child of the current process.
#[derive(Debug, Clone)]
pub struct DirectBackend {
    command: String,
    waiter: ReadinessWaiter,
    timeout: Duration,
}

impl DirectBackend {
    /// Creates a direct backend from the mounter configuration.
    #[must_use]
    pub fn new(config: &MounterConfig, waiter: ReadinessWaiter) -> Self {
        Self {
            command: config.driver_command.clone(),
            waiter,
            timeout: config.service_ready_timeout,
        }
    }

    /// Full driver argument vector for a request.
    #[must_use]
    pub fn driver_args(request: &MountRequest, args: &[String]) -> Vec<String> {
        let mut argv = endpoint_flags(&request.endpoint).to_vec();
        argv.push("--log-file".to_string());
        argv.push(DRIVER_LOG_FILE.to_string());
        argv.extend_from_slice(args);
        argv
    }
}

#[async_trait]
impl MountBackend for DirectBackend {
    fn mode(&self) -> MountMode {
        MountMode::Direct
    }

    async fn mount(&self, request: &MountRequest, args: &[String]) -> Result<()> {
        let argv = Self::driver_args(request, args);
        fuse_mount(
            &self.waiter,
            &request.target,
            &self.command,
            &argv,
            &request.credentials.env_pairs(),
            self.timeout,
        )
        .await
    }
}
