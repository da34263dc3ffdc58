// server/src/cli/cli.rs

use anyhow::Result;
use clap::Parser;

use crate::cli::commands::{CliArgs, MedcorCommands};
use crate::cli::handlers;

/// Parses the command line and runs the chosen subcommand.
pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    let config = args.config.as_deref();
    match args.command {
        MedcorCommands::Serve { port } => handlers::handle_serve(config, port).await,
        MedcorCommands::Seed(seed) => handlers::handle_seed(config, seed).await,
        MedcorCommands::CreateAdmin(admin) => handlers::handle_create_admin(config, admin).await,
        MedcorCommands::CheckConfig => handlers::handle_check_config(config),
    }
}
