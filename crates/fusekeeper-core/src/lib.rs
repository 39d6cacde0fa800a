//! # fusekeeper-core
//!
//! Host-level primitives shared by every mount execution path.
//!
//! This crate provides:
//! - **Filesystem**: mount-point detection and copy-if-stale sync of the
//!   driver binary.
//! - **Readiness**: bounded polling until a target becomes a mount point.
//! - **FUSE**: running the driver in the foreground and detaching mounts.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod fuse;
pub mod readiness;
