//! Typed view of the systemd manager operations the mounter needs.

use async_trait::async_trait;
use fusekeeper_common::error::Result;

/// `ActiveState` of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    /// Running.
    Active,
    /// Reloading its configuration.
    Reloading,
    /// Not running.
    Inactive,
    /// Exited with an error.
    Failed,
    /// Starting up.
    Activating,
    /// Shutting down.
    Deactivating,
    /// Any state this crate does not know about.
    Other(String),
}

impl ActiveState {
    /// Parses the string systemd reports.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "reloading" => Self::Reloading,
            "inactive" => Self::Inactive,
            "failed" => Self::Failed,
            "activating" => Self::Activating,
            "deactivating" => Self::Deactivating,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether a unit in this state still owns its mount.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Activating | Self::Reloading)
    }
}

/// One entry of a unit's `ExecStart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    /// Program path.
    pub path: String,
    /// Full argument vector, including `argv[0]`.
    pub argv: Vec<String>,
}

/// The properties of an existing unit the mounter inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitProperties {
    /// Current activation state.
    pub active_state: ActiveState,
    /// Recorded start commands.
    pub exec_start: Vec<ExecCommand>,
}

/// Descriptor of the transient unit to start.
#[derive(Clone, PartialEq, Eq)]
pub struct TransientUnit {
    /// Unit name, `geesefs-<escaped volume id>.service`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Command to run.
    pub exec: ExecCommand,
    /// `KEY=VALUE` environment entries.
    pub environment: Vec<String>,
    /// Garbage-collection policy.
    pub collect_mode: String,
}

impl std::fmt::Debug for TransientUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&str> = self
            .environment
            .iter()
            .map(|e| e.split_once('=').map_or(e.as_str(), |(k, _)| k))
            .collect();
        f.debug_struct("TransientUnit")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("exec", &self.exec)
            .field("environment", &env_keys)
            .field("collect_mode", &self.collect_mode)
            .finish()
    }
}

/// Connection to the host service manager.
#[async_trait]
pub trait UnitBus: Send + Sync {
    /// Returns the unit's properties, or `None` if systemd has no such unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus call fails or the reply cannot be decoded.
    async fn unit_properties(&self, name: &str) -> Result<Option<UnitProperties>>;

    /// Starts a transient unit in `replace` mode.
    ///
    /// # Errors
    ///
    /// Returns an error if systemd rejects the unit.
    async fn start_transient_unit(&self, unit: &TransientUnit) -> Result<()>;

    /// Stops a unit in `replace` mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus call fails.
    async fn stop_unit(&self, name: &str) -> Result<()>;

    /// Clears a unit's failed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus call fails.
    async fn reset_failed_unit(&self, name: &str) -> Result<()>;
}

/// Opens [`UnitBus`] connections.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Connects to the service manager.
    ///
    /// # Errors
    ///
    /// Returns [`fusekeeper_common::error::MountError::Connectivity`] if
    /// the bus is unreachable.
    async fn connect(&self) -> Result<Box<dyn UnitBus>>;
}
