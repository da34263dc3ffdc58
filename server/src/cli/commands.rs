// server/src/cli/commands.rs

// Command-line arguments and subcommands of the `medcor` binary.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "medcor")]
#[command(version)]
#[command(about = "Multi-tenant hospital administration platform")]
pub struct CliArgs {
    /// YAML configuration file. Defaults to ./medcor.yaml when present.
    #[arg(long, short = 'c', global = true, env = "MEDCOR_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: MedcorCommands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum MedcorCommands {
    /// Run the REST API until interrupted
    Serve {
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Load demo plans, a demo hospital and its staff
    Seed(SeedArgs),
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
    /// Print the effective configuration
    CheckConfig,
}

#[derive(Args, Debug, PartialEq)]
pub struct SeedArgs {
    #[arg(long, default_value = "admin")]
    pub admin_username: String,
    #[arg(long, default_value = "admin@medcor.local")]
    pub admin_email: String,
    #[arg(long, env = "MEDCOR_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: String,
}

#[derive(Args, Debug, PartialEq)]
pub struct CreateAdminArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "MEDCOR_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Schema name or domain of the hospital to administer. Without it the
    /// account administers the whole platform.
    #[arg(long)]
    pub tenant: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn serve_accepts_port_and_global_config() {
        let args = CliArgs::try_parse_from(["medcor", "serve", "--port", "9000", "--config", "/etc/medcor.yaml"]).unwrap();
        assert_eq!(args.command, MedcorCommands::Serve { port: Some(9000) });
        assert_eq!(args.config, Some(PathBuf::from("/etc/medcor.yaml")));
    }

    #[test]
    fn create_admin_takes_an_optional_tenant() {
        let args = CliArgs::try_parse_from([
            "medcor", "create-admin", "--username", "ops", "--email", "ops@example.org", "--password", "long-enough",
            "--tenant", "clinic",
        ])
        .unwrap();
        match args.command {
            MedcorCommands::CreateAdmin(admin) => {
                assert_eq!(admin.username, "ops");
                assert_eq!(admin.tenant.as_deref(), Some("clinic"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_subcommands_are_rejected() {
        assert!(CliArgs::try_parse_from(["medcor", "daemon", "start"]).is_err());
    }
}
