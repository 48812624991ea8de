//! CLI argument parsing for the application builder.
//!
//! Connection flags fall back to environment variables so credentials do not
//! have to appear on the command line.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const BASE_URL_ENV: &str = "ATLAN_BASE_URL";
pub const API_KEY_ENV: &str = "ATLAN_API_KEY";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "appb",
    version,
    about = "Guided creation and update of Application assets in a metadata catalog",
    after_help = "Commands:\n  run    Connect and walk through the create/update workflow\n  check  Connect, print the current user and resolved settings\n\nAt any prompt of `run`, type :back, :restart or :quit.\n\nExamples:\n  appb run --url tenant.example.com\n  ATLAN_API_KEY=... appb check --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Check(CheckArgs),
}

/// Where to connect and which settings to use.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Catalog base URL; `https://` is assumed when no scheme is given
    #[arg(long, env = BASE_URL_ENV, value_name = "URL")]
    pub url: String,

    /// API token used as a bearer credential
    #[arg(long, env = API_KEY_ENV, value_name = "TOKEN", hide_env_values = true)]
    pub token: String,

    /// Settings file (defaults to the user config dir when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Connect and run the interactive workflow")]
pub struct RunArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Check connectivity and print the resolved settings")]
pub struct CheckArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
