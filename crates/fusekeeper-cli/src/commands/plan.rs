//! `fkeep plan`: Show how a mount would be executed without running it.

use std::process::ExitCode;

use clap::Args;
use fusekeeper_runtime::plan::plan;

use super::RequestArgs;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Mount description.
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Executes the `plan` command.
///
/// Prints the selected mode and the driver argument vector. Credentials
/// never appear in the argument vector, so nothing is redacted.
///
/// # Errors
///
/// Returns an error if the plan cannot be serialized.
pub fn execute(args: &PlanArgs) -> anyhow::Result<ExitCode> {
    let plan = plan(&args.request.to_request());
    output::print_json(&plan)?;
    Ok(ExitCode::SUCCESS)
}
