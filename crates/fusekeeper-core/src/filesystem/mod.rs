//! Filesystem helpers for the mount paths.
//!
//! Provides mount-point detection for the readiness waiter and the
//! copy-if-stale step that installs the driver on the host.

pub mod binary;
pub mod mountpoint;
