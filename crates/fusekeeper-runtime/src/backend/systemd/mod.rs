//! Service-managed execution: the driver runs as a transient systemd unit
//! on the host, so the mount survives restarts of the plugin container.

pub mod bus;
pub mod dbus;

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fusekeeper_common::config::MounterConfig;
use fusekeeper_common::constants::UNIT_PREFIX;
use fusekeeper_common::error::{MountError, Result};
use fusekeeper_common::types::{MountMode, MountRequest, VolumeId};
use fusekeeper_core::filesystem::binary::sync_binary;
use fusekeeper_core::readiness::ReadinessWaiter;

use self::bus::{BusConnector, ExecCommand, TransientUnit, UnitBus, UnitProperties};
use super::{MountBackend, endpoint_flags};
use crate::plan::mount_tail;

const COLLECT_MODE: &str = "inactive-or-failed";

/// Escapes a string the way systemd escapes bus object path elements.
///
/// ASCII letters are kept, digits are kept except in the first position,
/// and every other byte becomes `_` followed by its lowercase hex value.
#[must_use]
pub fn bus_escape(s: &str) -> String {
    if s.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(s.len());
    for (i, b) in s.bytes().enumerate() {
        if b.is_ascii_alphabetic() || (i > 0 && b.is_ascii_digit()) {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "_{b:x}");
        }
    }
    out
}

/// Name of the transient unit that owns a volume's mount.
#[must_use]
pub fn unit_name(volume_id: &VolumeId) -> String {
    format!("{UNIT_PREFIX}-{}.service", bus_escape(volume_id.as_str()))
}

/// Launches the driver as a transient unit through the host's service
/// manager.
pub struct SystemdBackend {
    connector: Arc<dyn BusConnector>,
    driver_command: String,
    driver_source: PathBuf,
    driver_host_copy: PathBuf,
    host_driver_path: PathBuf,
    waiter: ReadinessWaiter,
    timeout: Duration,
}

impl SystemdBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new(
        config: &MounterConfig,
        connector: Arc<dyn BusConnector>,
        waiter: ReadinessWaiter,
    ) -> Self {
        Self {
            connector,
            driver_command: config.driver_command.clone(),
            driver_source: config.driver_source.clone(),
            driver_host_copy: config.driver_host_copy.clone(),
            host_driver_path: config.host_driver_path(),
            waiter,
            timeout: config.service_ready_timeout,
        }
    }

    /// Builds the unit descriptor for a request.
    #[must_use]
    pub fn transient_unit(&self, request: &MountRequest, args: &[String]) -> TransientUnit {
        let program = self.host_driver_path.to_string_lossy().into_owned();
        let mut argv = Vec::with_capacity(args.len() + 7);
        argv.push(program.clone());
        argv.push("-f".to_string());
        let [endpoint_flag, endpoint, o_flag, allow_other] = endpoint_flags(&request.endpoint);
        argv.extend([o_flag, allow_other, endpoint_flag, endpoint]);
        argv.extend_from_slice(args);

        TransientUnit {
            name: unit_name(&request.volume_id),
            description: format!("GeeseFS mount for Kubernetes volume {}", request.volume_id),
            exec: ExecCommand { path: program, argv },
            environment: request
                .credentials
                .env_pairs()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
            collect_mode: COLLECT_MODE.to_string(),
        }
    }

    /// Extracts the mount target a live unit was started with.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::MalformedState`] unless the unit has exactly
    /// one start command that runs the driver and ends with a remote path
    /// and an absolute target.
    pub fn recorded_target(&self, unit: &str, props: &UnitProperties) -> Result<PathBuf> {
        let malformed = |message: String| MountError::MalformedState {
            resource: unit.to_string(),
            message,
        };
        let [command] = props.exec_start.as_slice() else {
            return Err(malformed(format!(
                "expected one ExecStart command, found {}",
                props.exec_start.len()
            )));
        };
        if Path::new(&command.path).file_name() != Some(OsStr::new(&self.driver_command)) {
            return Err(malformed(format!(
                "ExecStart runs {}, not {}",
                command.path, self.driver_command
            )));
        }
        mount_tail(&command.argv)
            .map(|(_, target)| target.to_path_buf())
            .ok_or_else(|| malformed("ExecStart does not end with <remote> <target>".to_string()))
    }

    /// Clears a dead unit so its name can be reused. Errors are ignored.
    async fn reset(bus: &dyn UnitBus, name: &str) {
        if let Err(e) = bus.stop_unit(name).await {
            tracing::debug!(unit = name, error = %e, "stop of dead unit failed");
        }
        if let Err(e) = bus.reset_failed_unit(name).await {
            tracing::debug!(unit = name, error = %e, "reset of dead unit failed");
        }
    }
}

impl std::fmt::Debug for SystemdBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemdBackend")
            .field("host_driver_path", &self.host_driver_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MountBackend for SystemdBackend {
    fn mode(&self) -> MountMode {
        MountMode::ServiceManaged
    }

    async fn mount(&self, request: &MountRequest, args: &[String]) -> Result<()> {
        let bus = self.connector.connect().await?;
        let _ = sync_binary(&self.driver_source, &self.driver_host_copy)?;

        let name = unit_name(&request.volume_id);
        if let Some(props) = bus.unit_properties(&name).await? {
            if props.active_state.is_live() {
                let existing = self.recorded_target(&name, &props)?;
                if existing == request.target {
                    tracing::info!(
                        unit = %name,
                        mountpoint = %existing.display(),
                        "unit already serves this target"
                    );
                    return Ok(());
                }
                return Err(MountError::Conflict {
                    volume_id: request.volume_id.to_string(),
                    requested: request.target.clone(),
                    existing,
                });
            }
            tracing::debug!(unit = %name, state = ?props.active_state, "clearing dead unit");
            Self::reset(bus.as_ref(), &name).await;
        }

        let unit = self.transient_unit(request, args);
        bus.start_transient_unit(&unit).await?;
        tracing::info!(unit = %name, volume = %request.volume_id, "started transient unit");

        self.waiter.wait(&request.target, self.timeout).await
    }
}
