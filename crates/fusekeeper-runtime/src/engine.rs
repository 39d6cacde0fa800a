//! Entry point that routes a mount request to its execution path.

use std::sync::Arc;

use fusekeeper_common::config::MounterConfig;
use fusekeeper_common::error::Result;
use fusekeeper_common::types::{MountMode, MountOutcome, MountRequest};
use fusekeeper_core::filesystem::mountpoint::ProcMountProbe;
use fusekeeper_core::readiness::ReadinessWaiter;

use crate::backend::MountBackend;
use crate::backend::direct::DirectBackend;
use crate::backend::pod::PodBackend;
use crate::backend::pod::api::{KubePodApi, PodApi};
use crate::backend::systemd::SystemdBackend;
use crate::backend::systemd::bus::BusConnector;
use crate::backend::systemd::dbus::SystemBusConnector;
use crate::plan::plan;

/// Owns one backend per execution path.
#[derive(Debug)]
pub struct Mounter {
    direct: DirectBackend,
    systemd: SystemdBackend,
    pod: PodBackend,
}

impl Mounter {
    /// Creates a mounter with explicit collaborators.
    #[must_use]
    pub fn new(
        config: &MounterConfig,
        bus: Arc<dyn BusConnector>,
        pods: Arc<dyn PodApi>,
        waiter: ReadinessWaiter,
    ) -> Self {
        Self {
            direct: DirectBackend::new(config, waiter.clone()),
            systemd: SystemdBackend::new(config, bus, waiter.clone()),
            pod: PodBackend::new(config, pods, waiter),
        }
    }

    /// Creates a mounter wired to the system bus, the in-cluster API
    /// server, and `/proc/self/mountinfo`.
    #[must_use]
    pub fn from_config(config: &MounterConfig) -> Self {
        let waiter = ReadinessWaiter::new(Arc::new(ProcMountProbe::new()), config.poll_interval);
        Self::new(
            config,
            Arc::new(SystemBusConnector),
            Arc::new(KubePodApi::in_cluster()),
            waiter,
        )
    }

    /// Backend for a mode.
    #[must_use]
    pub fn backend(&self, mode: MountMode) -> &dyn MountBackend {
        match mode {
            MountMode::Direct => &self.direct,
            MountMode::ServiceManaged => &self.systemd,
            MountMode::ContainerManaged => &self.pod,
        }
    }

    /// Mounts `request.remote` at `request.target`.
    ///
    /// # Errors
    ///
    /// Returns the selected backend's error unchanged.
    pub async fn mount(&self, request: &MountRequest) -> Result<()> {
        let plan = plan(request);
        tracing::info!(
            volume = %request.volume_id,
            mode = %plan.mode,
            mountpoint = %request.target.display(),
            "mounting volume"
        );
        let result = self.backend(plan.mode).mount(request, &plan.args).await;
        if let Err(e) = &result {
            tracing::error!(volume = %request.volume_id, kind = %e.kind(), error = %e, "mount failed");
        }
        result
    }

    /// Like [`Mounter::mount`], reporting the result as a serializable outcome.
    pub async fn mount_outcome(&self, request: &MountRequest) -> MountOutcome {
        MountOutcome::from(&self.mount(request).await)
    }
}
