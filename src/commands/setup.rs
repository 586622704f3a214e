//! Setup command: build a configuration from flags, allocate unset
//! resources, persist, compile and (optionally) deploy.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::alloc;
use crate::cli::SslStrategyArg;
use crate::config::{DatabaseSpec, EngineKind, SslConfig, StackConfig};
use crate::driver::{ComposeDriver, DeploymentDriver, TeardownSelectors};
use crate::fsutil;
use crate::paths::StackPaths;

pub struct SetupOptions {
    pub stack_name: Option<String>,
    pub hosts: Vec<String>,
    pub port: Option<u16>,
    pub http_port: Option<u16>,
    pub password: Option<String>,
    pub ssl_strategy: SslStrategyArg,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
    pub ssl_email: Option<String>,
    pub databases: Vec<String>,
    pub db_passwords: Vec<String>,
    pub yes: bool,
    pub no_start: bool,
}

pub fn cmd_setup(dir: &Path, options: SetupOptions) -> Result<()> {
    let store = super::store_for(dir);
    let paths = store.paths().clone();

    if store.exists() {
        if !options.yes {
            bail!(
                "an existing configuration was found at {} - pass --yes to overwrite it",
                paths.config_file().display()
            );
        }
        stop_previous_stack(&store, &paths, options.no_start);
    }

    let config = build_config(&options)?;

    paths.ensure_directories()?;
    store.save(&config)?;
    println!("Configuration saved to {}", paths.config_file().display());

    let artifacts = super::compile_and_write(&paths, &config)?;
    println!("Artifacts written: compose.yaml, .env, data/edge/conf/edge.conf");

    if options.no_start {
        println!("Skipping certificate and runtime steps (--no-start).");
        return Ok(());
    }

    let report = super::run_certificate_machine(&paths, &config, false)?;
    println!("{}", super::describe_cert_report(&report));

    let driver = ComposeDriver::detect()?;
    let services = super::startable_services(&artifacts);
    driver
        .apply(&config.stack_name, &paths.compose_file(), &services)
        .context("could not start the stack")?;

    let host = config.hosts.first().map(String::as_str).unwrap_or("localhost");
    match &config.ssl {
        SslConfig::External => println!(
            "Setup complete. The stack serves plaintext on port {} behind your proxy.",
            config.http_port
        ),
        _ => println!(
            "Setup complete. The stack is reachable at https://{host}:{}",
            config.external_port
        ),
    }
    Ok(())
}

fn stop_previous_stack(store: &crate::config::ConfigStore, paths: &StackPaths, no_start: bool) {
    if no_start {
        return;
    }
    // Best effort: a broken previous deployment must not block re-setup.
    let Ok(previous) = store.load() else {
        return;
    };
    let Ok(driver) = ComposeDriver::detect() else {
        return;
    };
    if let Err(e) = driver.teardown(
        &previous.stack_name,
        &paths.compose_file(),
        TeardownSelectors {
            containers: true,
            volumes: false,
        },
    ) {
        eprintln!("warning: could not stop the previous stack cleanly: {e}");
    }
}

fn build_config(options: &SetupOptions) -> Result<StackConfig> {
    let mut config = StackConfig::default();

    if let Some(name) = &options.stack_name {
        config.stack_name = name.clone();
    }
    if !options.hosts.is_empty() {
        config.hosts = options.hosts.clone();
    }
    if let Some(port) = options.port {
        config.external_port = port;
    }
    if let Some(port) = options.http_port {
        config.http_port = port;
    }
    config.admin_password = match &options.password {
        Some(password) => password.clone(),
        None => bail!("--password is required"),
    };

    config.ssl = match options.ssl_strategy {
        SslStrategyArg::SelfSigned => SslConfig::SelfSigned,
        SslStrategyArg::Acme => SslConfig::Acme {
            email: options
                .ssl_email
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--ssl-email is required for the acme strategy"))?,
        },
        SslStrategyArg::Manual => {
            let cert_path = options
                .ssl_cert
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--ssl-cert is required for the manual strategy"))?;
            let key_path = options
                .ssl_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--ssl-key is required for the manual strategy"))?;
            for path in [&cert_path, &key_path] {
                if !fsutil::expand_home(path).is_file() {
                    bail!("file not found: {}", path.display());
                }
            }
            SslConfig::Manual {
                cert_path,
                key_path,
            }
        }
        SslStrategyArg::External => SslConfig::External,
    };

    add_databases(&mut config, &options.databases, &options.db_passwords)?;

    config.network = choose_network(options.no_start);

    Ok(config)
}

/// Parse `name:engine[:port]` specs and allocate ports for the unset ones.
///
/// Instances are processed in the order given; each allocation claims its
/// port before the next runs, so two postgres instances get 5432 and 5433.
fn add_databases(
    config: &mut StackConfig,
    specs: &[String],
    passwords: &[String],
) -> Result<()> {
    let password_for = |name: &str| -> Option<String> {
        passwords.iter().find_map(|entry| {
            entry
                .split_once(':')
                .filter(|(n, _)| *n == name)
                .map(|(_, pw)| pw.to_string())
        })
    };

    let mut claimed: BTreeSet<u16> = config.claimed_ports().into_iter().collect();

    for spec in specs {
        let mut parts = spec.splitn(3, ':');
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid database spec '{spec}'"))?;
        let engine: EngineKind = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("database spec '{spec}' is missing an engine"))?
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let port = match parts.next() {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid port in database spec '{spec}'"))?,
            None => alloc::suggest_port(engine.default_port(), &claimed)?,
        };
        claimed.insert(port);

        let password = password_for(name).unwrap_or_else(|| format!("{}_password", engine.as_str()));
        if config
            .databases
            .insert(
                name.to_string(),
                DatabaseSpec {
                    engine,
                    port,
                    user: engine.default_user().to_string(),
                    password,
                },
            )
            .is_some()
        {
            bail!("database '{name}' was specified more than once");
        }
    }
    Ok(())
}

fn choose_network(no_start: bool) -> crate::config::NetworkChoice {
    if no_start {
        // Nothing may touch the runtime: allocate against an empty
        // inventory, which deterministically picks the first candidate.
        return alloc::choose_subnet([]);
    }
    let existing = ComposeDriver::detect()
        .and_then(|driver| driver.existing_subnets())
        .unwrap_or_else(|e| {
            eprintln!("warning: could not inspect existing networks: {e}");
            Vec::new()
        });
    alloc::choose_subnet(existing.iter().map(String::as_str))
}
