//! Global configuration model for the mounter.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration shared by all three execution paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MounterConfig {
    /// Driver program name, resolved through `PATH` on the direct path.
    pub driver_command: String,
    /// Driver binary packaged in the plugin image.
    pub driver_source: PathBuf,
    /// Destination of the host copy, as seen from the plugin container.
    pub driver_host_copy: PathBuf,
    /// Host path of the plugin directory (where the host copy lives).
    pub plugin_dir: PathBuf,
    /// Name of the node this process runs on.
    pub node_name: String,
    /// Image used for helper pods.
    pub helper_image: String,
    /// Namespace helper pods are created in.
    pub helper_namespace: String,
    /// Readiness deadline for the systemd and direct paths.
    pub service_ready_timeout: Duration,
    /// Readiness deadline for the helper pod path.
    pub pod_ready_timeout: Duration,
    /// Interval between mount-point checks.
    pub poll_interval: Duration,
}

impl Default for MounterConfig {
    fn default() -> Self {
        Self {
            driver_command: constants::DRIVER_NAME.to_string(),
            driver_source: PathBuf::from(constants::DRIVER_SOURCE_PATH),
            driver_host_copy: PathBuf::from(constants::DRIVER_HOST_COPY_PATH),
            plugin_dir: PathBuf::from(constants::DEFAULT_PLUGIN_DIR),
            node_name: String::new(),
            helper_image: String::new(),
            helper_namespace: constants::HELPER_NAMESPACE.to_string(),
            service_ready_timeout: constants::SERVICE_READY_TIMEOUT,
            pod_ready_timeout: constants::POD_READY_TIMEOUT,
            poll_interval: constants::READY_POLL_INTERVAL,
        }
    }
}

impl MounterConfig {
    /// Builds the configuration from the process environment.
    ///
    /// Reads `MY_NODE_NAME`, `MY_CONTAINER_IMAGE`, and `PLUGIN_DIR`; unset
    /// or empty variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();
        if let Some(node) = get(constants::NODE_NAME_ENV) {
            config.node_name = node;
        }
        if let Some(image) = get(constants::CONTAINER_IMAGE_ENV) {
            config.helper_image = image;
        }
        if let Some(dir) = get(constants::PLUGIN_DIR_ENV) {
            config.plugin_dir = PathBuf::from(dir);
        }
        config
    }

    /// Host path the systemd unit executes.
    #[must_use]
    pub fn host_driver_path(&self) -> PathBuf {
        self.plugin_dir.join(&self.driver_command)
    }
}
