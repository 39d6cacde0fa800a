//! # fusekeeper-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire fusekeeper workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and knows nothing about systemd or Kubernetes; the
//! runtime crate maps those clients' errors into [`error::MountError`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
