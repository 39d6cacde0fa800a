//! System-wide constants and default paths.

use std::time::Duration;

/// Name of the FUSE driver binary.
pub const DRIVER_NAME: &str = "geesefs";

/// Where the driver is installed inside the plugin image.
pub const DRIVER_SOURCE_PATH: &str = "/usr/bin/geesefs";

/// Where the plugin container sees the host plugin directory.
pub const DRIVER_HOST_COPY_PATH: &str = "/csi/geesefs";

/// Host-side plugin directory used when `PLUGIN_DIR` is unset.
pub const DEFAULT_PLUGIN_DIR: &str = "/var/lib/kubelet/plugins/ru.yandex.s3.csi";

/// Namespace the helper pods are created in.
pub const HELPER_NAMESPACE: &str = "kube-system";

/// Prefix of every helper pod name.
pub const HELPER_POD_PREFIX: &str = "geesefs-mount";

/// Prefix of every transient systemd unit name.
pub const UNIT_PREFIX: &str = "geesefs";

/// Local FUSE character device.
pub const FUSE_DEVICE: &str = "/dev/fuse";

/// Capability the helper container needs to perform a FUSE mount.
pub const FUSE_MOUNT_CAPABILITY: &str = "SYS_ADMIN";

/// Log destination handed to the driver.
pub const DRIVER_LOG_FILE: &str = "/dev/stderr";

/// Unprivileged uid/gid (`nobody`/`nogroup`) the driver drops to.
pub const UNPRIVILEGED_ID: &str = "65534";

/// Mount option token selecting the systemd path.
pub const USE_SYSTEMD_TOKEN: &str = "use-systemd";

/// Mount option token selecting the direct path.
pub const USE_EXEC_TOKEN: &str = "use-exec";

/// Environment variable holding the access key id.
pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable holding the secret access key.
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Environment variable naming the local node.
pub const NODE_NAME_ENV: &str = "MY_NODE_NAME";

/// Environment variable naming the plugin's own container image.
pub const CONTAINER_IMAGE_ENV: &str = "MY_CONTAINER_IMAGE";

/// Environment variable overriding the host plugin directory.
pub const PLUGIN_DIR_ENV: &str = "PLUGIN_DIR";

/// Readiness deadline for the systemd and direct paths.
pub const SERVICE_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Readiness deadline for the helper pod path.
pub const POD_READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Interval between mount-point checks.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Application name, recorded on the resources it creates.
pub const APP_NAME: &str = "fusekeeper";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "fkeep";
