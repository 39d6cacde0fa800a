//! `fkeep unmount`: Detach a mounted target.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use fusekeeper_core::fuse::fuse_unmount;

/// Arguments for the `unmount` command.
#[derive(Args, Debug)]
pub struct UnmountArgs {
    /// Mounted directory.
    pub target: PathBuf,
}

/// Executes the `unmount` command.
///
/// # Errors
///
/// Returns an error if the kernel refuses the detach.
pub fn execute(args: &UnmountArgs) -> anyhow::Result<ExitCode> {
    fuse_unmount(&args.target)?;
    tracing::info!(mountpoint = %args.target.display(), "unmounted");
    Ok(ExitCode::SUCCESS)
}
