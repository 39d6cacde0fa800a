//! Mount execution strategies for the fusekeeper mounter.
//!
//! [`engine::Mounter`] selects one of three [`backend::MountBackend`]s per
//! request: a foreground process, a transient systemd unit, or a helper
//! pod on the local node.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod engine;
pub mod plan;
