//! `fkeep mount`: Mount a bucket and wait until it is visible.

use std::process::ExitCode;

use clap::Args;
use fusekeeper_common::config::MounterConfig;
use fusekeeper_runtime::engine::Mounter;

use super::RequestArgs;
use crate::output;

/// Exit status after an interrupt, following the shell's `128 + SIGINT`.
const INTERRUPTED: u8 = 130;

/// Arguments for the `mount` command.
#[derive(Args, Debug)]
pub struct MountArgs {
    /// Mount description.
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Executes the `mount` command.
///
/// Configuration comes from the environment (`MY_NODE_NAME`,
/// `MY_CONTAINER_IMAGE`, `PLUGIN_DIR`). Ctrl-C abandons the wait; a unit
/// or pod that was already started keeps running.
///
/// # Errors
///
/// Returns an error if the outcome cannot be written or the signal
/// handler cannot be installed.
pub async fn execute(args: MountArgs) -> anyhow::Result<ExitCode> {
    let config = MounterConfig::from_env();
    let mounter = Mounter::from_config(&config);
    let request = args.request.to_request();

    tokio::select! {
        outcome = mounter.mount_outcome(&request) => {
            output::print_json(&outcome)?;
            Ok(if outcome.succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!(volume = %request.volume_id, "interrupted while mounting");
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}
