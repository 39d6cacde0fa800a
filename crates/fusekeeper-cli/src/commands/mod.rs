//! CLI command definitions and dispatch.

pub mod mount;
pub mod plan;
pub mod unmount;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use fusekeeper_common::constants::{ACCESS_KEY_ENV, BIN_NAME, SECRET_KEY_ENV};
use fusekeeper_common::types::{Credentials, MountRequest, RemotePath, VolumeId};

/// fusekeeper: mount object storage buckets through a FUSE driver.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mount a bucket and print the outcome as JSON.
    Mount(mount::MountArgs),
    /// Print the selected execution path and driver arguments.
    Plan(plan::PlanArgs),
    /// Lazily detach a mounted target.
    Unmount(unmount::UnmountArgs),
}

/// Fields shared by every command that describes a mount.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Bucket to mount.
    #[arg(long)]
    pub bucket: String,

    /// Prefix inside the bucket.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Local directory to mount at.
    #[arg(long)]
    pub target: PathBuf,

    /// Volume identifier, used to name the unit or helper pod.
    #[arg(long)]
    pub volume_id: String,

    /// Object storage endpoint URL.
    #[arg(long)]
    pub endpoint: String,

    /// Storage region.
    #[arg(long, default_value = "")]
    pub region: String,

    /// Mount option token, repeatable (e.g. `--option=--use-systemd`).
    ///
    /// There is no short form so that `-o` stays the driver's flag; pass it
    /// through as `--option -o --option ro`.
    #[arg(long = "option", allow_hyphen_values = true)]
    pub options: Vec<String>,

    /// Access key ID.
    #[arg(long, env = ACCESS_KEY_ENV, hide_env_values = true, default_value = "")]
    pub access_key_id: String,

    /// Secret access key.
    #[arg(long, env = SECRET_KEY_ENV, hide_env_values = true, default_value = "")]
    pub secret_access_key: String,
}

impl RequestArgs {
    /// Builds the mount request these arguments describe.
    #[must_use]
    pub fn to_request(&self) -> MountRequest {
        MountRequest {
            remote: RemotePath::new(&self.bucket, &self.prefix),
            target: self.target.clone(),
            volume_id: VolumeId::new(&self.volume_id),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            credentials: Credentials::new(&self.access_key_id, &self.secret_access_key),
            options: self.options.clone(),
        }
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command cannot run or its output cannot be
/// written.
pub async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Mount(args) => mount::execute(args).await,
        Command::Plan(args) => plan::execute(&args),
        Command::Unmount(args) => unmount::execute(&args),
    }
}
