//! Mount strategy selection.
//!
//! Scans the request's option tokens once, strips the two control tokens,
//! and builds the driver argument vector shared by every execution path:
//! region, privilege drop, pass-through flags, then remote and target.

use std::path::Path;

use fusekeeper_common::constants::{UNPRIVILEGED_ID, USE_EXEC_TOKEN, USE_SYSTEMD_TOKEN};
use fusekeeper_common::types::{MountMode, MountRequest};
use serde::Serialize;

/// Selected execution path and the driver arguments to pass to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPlan {
    /// Execution path.
    pub mode: MountMode,
    /// Driver arguments, ending with `<remote> <target>`.
    pub args: Vec<String>,
}

/// Builds the plan for a request.
///
/// `use-systemd` wins over `use-exec` when both are present. Control
/// tokens are recognized with or without a leading `--`.
#[must_use]
pub fn plan(request: &MountRequest) -> MountPlan {
    let mut args = Vec::with_capacity(request.options.len() + 8);
    if !request.region.is_empty() {
        args.push("--region".to_string());
        args.push(request.region.clone());
    }
    for flag in ["--setuid", UNPRIVILEGED_ID, "--setgid", UNPRIVILEGED_ID] {
        args.push(flag.to_string());
    }

    let mut use_systemd = false;
    let mut use_exec = false;
    for option in &request.options {
        match option.strip_prefix("--").unwrap_or(option) {
            USE_SYSTEMD_TOKEN => use_systemd = true,
            USE_EXEC_TOKEN => use_exec = true,
            _ => args.push(option.clone()),
        }
    }

    args.push(request.remote.to_string());
    args.push(request.target.to_string_lossy().into_owned());

    let mode = if use_systemd {
        MountMode::ServiceManaged
    } else if use_exec {
        MountMode::Direct
    } else {
        MountMode::ContainerManaged
    };
    MountPlan { mode, args }
}

/// Splits the trailing `<bucket>:<prefix> <target>` pair off a recorded
/// driver command line.
///
/// Returns `None` unless the second-to-last argument looks like a remote
/// path and the last one is an absolute path.
#[must_use]
pub fn mount_tail(args: &[String]) -> Option<(&str, &Path)> {
    let [.., remote, target] = args else {
        return None;
    };
    let target = Path::new(target.as_str());
    if remote.starts_with('-') || !remote.contains(':') || !target.is_absolute() {
        return None;
    }
    Some((remote.as_str(), target))
}
