//! [`UnitBus`] over the system D-Bus, via `zbus`.

use async_trait::async_trait;
use fusekeeper_common::error::{MountError, Result};
use zbus::Connection;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Type, Value};

use super::bus::{ActiveState, BusConnector, ExecCommand, TransientUnit, UnitBus, UnitProperties};

const SERVICE: &str = "systemd";
const NO_SUCH_UNIT: &str = "org.freedesktop.systemd1.NoSuchUnit";
const JOB_MODE: &str = "replace";

#[zbus::proxy(
    gen_blocking = false,
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait Manager {
    fn get_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    fn start_transient_unit(
        &self,
        name: &str,
        mode: &str,
        properties: &[(&str, Value<'_>)],
        aux: &[(&str, Vec<(&str, Value<'_>)>)],
    ) -> zbus::Result<OwnedObjectPath>;

    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    fn reset_failed_unit(&self, name: &str) -> zbus::Result<()>;
}

#[zbus::proxy(
    gen_blocking = false,
    interface = "org.freedesktop.systemd1.Unit",
    default_service = "org.freedesktop.systemd1"
)]
trait Unit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;
}

#[zbus::proxy(
    gen_blocking = false,
    interface = "org.freedesktop.systemd1.Service",
    default_service = "org.freedesktop.systemd1"
)]
trait Service {
    #[zbus(property)]
    fn exec_start(&self) -> zbus::Result<Vec<ExecStartRecord>>;
}

/// Wire layout of one `ExecStart` entry, signature `(sasbttttuii)`.
#[derive(Debug, Clone, Type, Value, OwnedValue)]
#[allow(dead_code)]
struct ExecStartRecord {
    path: String,
    argv: Vec<String>,
    ignore_errors: bool,
    start_realtime: u64,
    start_monotonic: u64,
    exit_realtime: u64,
    exit_monotonic: u64,
    pid: u32,
    code: i32,
    status: i32,
}

impl From<ExecStartRecord> for ExecCommand {
    fn from(record: ExecStartRecord) -> Self {
        Self {
            path: record.path,
            argv: record.argv,
        }
    }
}

/// Connects to the host's system bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBusConnector;

#[async_trait]
impl BusConnector for SystemBusConnector {
    async fn connect(&self) -> Result<Box<dyn UnitBus>> {
        let conn = Connection::system().await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to systemd over D-Bus");
            MountError::Connectivity {
                service: SERVICE,
                message: e.to_string(),
            }
        })?;
        Ok(Box::new(SystemdBus { conn }))
    }
}

/// A live system bus connection.
#[derive(Debug, Clone)]
pub struct SystemdBus {
    conn: Connection,
}

impl SystemdBus {
    async fn manager(&self) -> Result<ManagerProxy<'_>> {
        ManagerProxy::new(&self.conn).await.map_err(connectivity)
    }
}

fn connectivity(e: zbus::Error) -> MountError {
    MountError::Connectivity {
        service: SERVICE,
        message: e.to_string(),
    }
}

fn malformed(unit: &str, e: &zbus::Error) -> MountError {
    MountError::MalformedState {
        resource: unit.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl UnitBus for SystemdBus {
    async fn unit_properties(&self, name: &str) -> Result<Option<UnitProperties>> {
        let path = match self.manager().await?.get_unit(name).await {
            Ok(path) => path,
            Err(zbus::Error::MethodError(err, _, _)) if err.as_str() == NO_SUCH_UNIT => {
                return Ok(None);
            }
            Err(e) => return Err(connectivity(e)),
        };

        let unit = UnitProxy::builder(&self.conn)
            .path(path.clone())
            .map_err(connectivity)?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(connectivity)?;
        let active_state = unit.active_state().await.map_err(|e| malformed(name, &e))?;

        let service = ServiceProxy::builder(&self.conn)
            .path(path)
            .map_err(connectivity)?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(connectivity)?;
        let exec_start = service.exec_start().await.map_err(|e| malformed(name, &e))?;

        Ok(Some(UnitProperties {
            active_state: ActiveState::parse(&active_state),
            exec_start: exec_start.into_iter().map(ExecCommand::from).collect(),
        }))
    }

    async fn start_transient_unit(&self, unit: &TransientUnit) -> Result<()> {
        let exec: Vec<(String, Vec<String>, bool)> =
            vec![(unit.exec.path.clone(), unit.exec.argv.clone(), false)];
        let properties: Vec<(&str, Value<'_>)> = vec![
            ("Description", Value::from(unit.description.as_str())),
            ("ExecStart", Value::from(exec)),
            ("Environment", Value::from(unit.environment.clone())),
            ("CollectMode", Value::from(unit.collect_mode.as_str())),
        ];
        let aux: Vec<(&str, Vec<(&str, Value<'_>)>)> = Vec::new();

        let _ = self
            .manager()
            .await?
            .start_transient_unit(&unit.name, JOB_MODE, &properties, &aux)
            .await
            .map_err(|e| MountError::Launch {
                resource: unit.name.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn stop_unit(&self, name: &str) -> Result<()> {
        let _ = self
            .manager()
            .await?
            .stop_unit(name, JOB_MODE)
            .await
            .map_err(connectivity)?;
        Ok(())
    }

    async fn reset_failed_unit(&self, name: &str) -> Result<()> {
        self.manager()
            .await?
            .reset_failed_unit(name)
            .await
            .map_err(connectivity)
    }
}

