//! berth CLI - single-host container stack compiler and deployment tool
//!
//! Usage: berth <COMMAND>
//!
//! Commands:
//!   setup     Create or overwrite the stack configuration and deploy it
//!   up        Compile artifacts, ensure certificates and start the stack
//!   down      Stop the stack
//!   status    Show per-service status
//!   diagnose  Probe a live deployment
//!   config    Inspect and change the configuration
//!   profile   Manage worker profiles
//!   cert      Manage certificate material

use anyhow::Result;
use clap::Parser;

use berth::cli::{CertCommands, Cli, Commands, ConfigCommands, ProfileCommands};
use berth::commands::{
    cert_cmds, config_cmds, diagnose_cmd, lifecycle, profile, setup,
};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let dir = cli.dir.clone();

    match cli.command {
        Commands::Setup {
            stack_name,
            hosts,
            port,
            http_port,
            password,
            ssl_strategy,
            ssl_cert,
            ssl_key,
            ssl_email,
            databases,
            db_passwords,
            yes,
            no_start,
        } => {
            setup::cmd_setup(
                &dir,
                setup::SetupOptions {
                    stack_name,
                    hosts,
                    port,
                    http_port,
                    password,
                    ssl_strategy,
                    ssl_cert,
                    ssl_key,
                    ssl_email,
                    databases,
                    db_passwords,
                    yes,
                    no_start,
                },
            )?;
            Ok(0)
        }

        Commands::Up => {
            lifecycle::cmd_up(&dir)?;
            Ok(0)
        }

        Commands::Down => {
            lifecycle::cmd_down(&dir)?;
            Ok(0)
        }

        Commands::Status => {
            lifecycle::cmd_status(&dir)?;
            Ok(0)
        }

        Commands::Reset {
            containers,
            volumes,
            configs,
            certs,
            secrets,
            all,
            yes,
        } => {
            lifecycle::cmd_reset(
                &dir,
                lifecycle::ResetOptions {
                    containers,
                    volumes,
                    configs,
                    certs,
                    secrets,
                    all,
                    yes,
                },
            )?;
            Ok(0)
        }

        // Exit code convention: the number of failed checks.
        Commands::Diagnose => {
            let failed = diagnose_cmd::cmd_diagnose(&dir)?;
            Ok(i32::try_from(failed).unwrap_or(i32::MAX))
        }

        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => config_cmds::cmd_show(&dir)?,
                ConfigCommands::ChangePassword { password } => {
                    config_cmds::cmd_change_password(&dir, password)?
                }
                ConfigCommands::ChangePort { port } => {
                    config_cmds::cmd_change_port(&dir, port)?
                }
                ConfigCommands::Snapshots => config_cmds::cmd_snapshots(&dir)?,
                ConfigCommands::Restore { snapshot, yes } => {
                    config_cmds::cmd_restore(&dir, &snapshot, yes)?
                }
                ConfigCommands::Export => config_cmds::cmd_export(&dir)?,
                ConfigCommands::Import { data } => config_cmds::cmd_import(&dir, &data)?,
            }
            Ok(0)
        }

        Commands::Profile { command } => {
            match command {
                ProfileCommands::List => profile::cmd_list(&dir)?,
                ProfileCommands::Add {
                    name,
                    repository,
                    image,
                    tag,
                    apply,
                } => profile::cmd_add(&dir, name, repository, image, tag, apply)?,
                ProfileCommands::Remove { name, apply } => {
                    profile::cmd_remove(&dir, &name, apply)?
                }
            }
            Ok(0)
        }

        Commands::Cert { command } => {
            match command {
                CertCommands::Regenerate => cert_cmds::cmd_regenerate(&dir)?,
            }
            Ok(0)
        }
    }
}
