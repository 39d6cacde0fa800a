//! Unified error types for the fusekeeper workspace.
//!
//! Every public entry point either succeeds or returns exactly one of these
//! variants. No variant carries credential material.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MountError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The service bus or the cluster control plane could not be reached.
    #[error("{service} unreachable: {message}")]
    Connectivity {
        /// Which collaborator failed.
        service: &'static str,
        /// Underlying client error.
        message: String,
    },

    /// The driver binary could not be synchronized to the host.
    #[error("failed to sync driver binary {from} -> {to}: {source}")]
    BinarySync {
        /// Source artifact.
        from: PathBuf,
        /// Host destination.
        to: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The volume is already mounted somewhere else on this node.
    #[error(
        "volume {volume_id} is already mounted on this node, but in a different directory: \
         wanted {requested}, found {existing}"
    )]
    Conflict {
        /// Volume being mounted.
        volume_id: String,
        /// Target of the current request.
        requested: PathBuf,
        /// Target the live mount process was started with.
        existing: PathBuf,
    },

    /// A live supervisor record exists but its recorded command cannot be
    /// interpreted.
    #[error("could not determine prior state of {resource}: {message}")]
    MalformedState {
        /// Unit or pod name.
        resource: String,
        /// What did not match.
        message: String,
    },

    /// A supervisor record with the expected name belongs to another volume.
    #[error("{resource} belongs to volume {owner}, not {volume_id}")]
    NameCollision {
        /// Unit or pod name.
        resource: String,
        /// Volume being mounted.
        volume_id: String,
        /// Volume the existing record was created for.
        owner: String,
    },

    /// The supervisor rejected the launch (unit start or pod create).
    #[error("failed to launch {resource}: {message}")]
    Launch {
        /// Unit or pod name.
        resource: String,
        /// Underlying cause.
        message: String,
    },

    /// The driver process could not be run in the foreground.
    #[error("driver command {command} failed: {message}")]
    Spawn {
        /// Program that was executed.
        command: String,
        /// Exit status or spawn error.
        message: String,
    },

    /// The mount process was launched but the target never became a mount point.
    #[error("timed out after {timeout:?} waiting for {target} to become a mount point")]
    ReadinessTimeout {
        /// Path that was polled.
        target: PathBuf,
        /// Deadline that elapsed.
        timeout: Duration,
    },
}

/// Coarse classification of a [`MountError`], used by callers deciding
/// whether to retry or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Local I/O failure.
    Io,
    /// Bad or missing configuration.
    Config,
    /// Service bus or control plane unreachable.
    Connectivity,
    /// Driver binary copy failed.
    BinarySync,
    /// Volume is live at another target.
    Conflict,
    /// Existing supervisor state could not be decoded.
    MalformedState,
    /// Supervisor name is held by another volume.
    NameCollision,
    /// Supervisor rejected the launch.
    Launch,
    /// Foreground driver failed.
    Spawn,
    /// Mount never became visible.
    ReadinessTimeout,
}

impl MountError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::BinarySync { .. } => ErrorKind::BinarySync,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::MalformedState { .. } => ErrorKind::MalformedState,
            Self::NameCollision { .. } => ErrorKind::NameCollision,
            Self::Launch { .. } => ErrorKind::Launch,
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Io => "io",
            Self::Config => "config",
            Self::Connectivity => "connectivity",
            Self::BinarySync => "binary-sync",
            Self::Conflict => "conflict",
            Self::MalformedState => "malformed-state",
            Self::NameCollision => "name-collision",
            Self::Launch => "launch",
            Self::Spawn => "spawn",
            Self::ReadinessTimeout => "readiness-timeout",
        };
        f.write_str(s)
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountError>;
