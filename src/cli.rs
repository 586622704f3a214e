use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// berth - single-host container stack compiler and deployment tool
#[derive(Parser, Debug)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Stack directory (holds the configuration and generated artifacts)
    #[arg(short, long, default_value = ".", global = true)]
    pub dir: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SslStrategyArg {
    /// Locally-trusted certificate from a local CA tool
    SelfSigned,
    /// Publicly-issued certificate via automated domain validation
    Acme,
    /// Operator-supplied certificate and key files
    Manual,
    /// TLS terminates at an outer proxy
    External,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or overwrite the stack configuration and deploy it
    Setup {
        /// Stack name used to namespace all derived resources
        #[arg(long)]
        stack_name: Option<String>,

        /// Hostname or IP the stack answers to; repeatable
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// External port for secure traffic
        #[arg(long)]
        port: Option<u16>,

        /// Plaintext port (challenge serving, or the edge port under the
        /// external strategy)
        #[arg(long)]
        http_port: Option<u16>,

        /// Administrator password (required)
        #[arg(long)]
        password: Option<String>,

        /// SSL strategy
        #[arg(long, value_enum, default_value = "self-signed")]
        ssl_strategy: SslStrategyArg,

        /// Certificate file for the manual strategy
        #[arg(long)]
        ssl_cert: Option<PathBuf>,

        /// Private key file for the manual strategy
        #[arg(long)]
        ssl_key: Option<PathBuf>,

        /// Contact email for the acme strategy
        #[arg(long)]
        ssl_email: Option<String>,

        /// Extra database instance, `name:engine[:port]`; repeatable
        #[arg(long = "database")]
        databases: Vec<String>,

        /// Password for a database instance, `name:password`; repeatable
        #[arg(long = "db-password")]
        db_passwords: Vec<String>,

        /// Overwrite an existing configuration without asking
        #[arg(short, long)]
        yes: bool,

        /// Write configuration and artifacts but do not touch the runtime
        #[arg(long)]
        no_start: bool,
    },

    /// Compile artifacts, ensure certificates and start the stack
    Up,

    /// Stop the stack
    Down,

    /// Show per-service status
    Status,

    /// Stop the stack and selectively remove its resources
    Reset {
        /// Remove containers and networks
        #[arg(long)]
        containers: bool,

        /// Remove data volumes
        #[arg(long)]
        volumes: bool,

        /// Remove the configuration file and snapshots
        #[arg(long)]
        configs: bool,

        /// Remove managed certificate material
        #[arg(long)]
        certs: bool,

        /// Remove the secrets file
        #[arg(long)]
        secrets: bool,

        /// Remove everything above
        #[arg(long)]
        all: bool,

        /// Confirm the removal
        #[arg(short, long)]
        yes: bool,
    },

    /// Probe a live deployment; exit code is the number of failed checks
    Diagnose,

    /// Inspect and change the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage worker profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage certificate material
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the configuration (secrets masked)
    Show,

    /// Change the administrator password
    ChangePassword {
        password: String,
    },

    /// Change the external port
    ChangePort {
        port: u16,
    },

    /// List configuration snapshots, newest first
    Snapshots,

    /// Restore a snapshot by id or sequence number
    Restore {
        snapshot: String,

        /// Apply without a preview confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the configuration as a compact transport string
    Export,

    /// Replace the configuration from a transport string
    Import {
        data: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List configured worker profiles
    List,

    /// Add a worker profile
    Add {
        /// Service name for the profile
        #[arg(long)]
        name: String,

        /// Registry repository
        #[arg(long, default_value = "berthstack")]
        repository: String,

        /// Image name
        #[arg(long)]
        image: String,

        /// Image tag
        #[arg(long, default_value = "latest")]
        tag: String,

        /// Restart the running stack with the new profile
        #[arg(long)]
        apply: bool,
    },

    /// Remove a worker profile by name
    Remove {
        name: String,

        /// Update the running stack after removal
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// Re-run certificate issuance for the configured strategy
    Regenerate,
}
