//! Stack lifecycle commands: up, down, status, reset.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::driver::{ComposeDriver, DeploymentDriver, TeardownSelectors};

pub fn cmd_up(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let paths = store.paths().clone();
    let config = store.load()?;

    paths.ensure_directories()?;
    let artifacts = super::compile_and_write(&paths, &config)?;

    let report = super::run_certificate_machine(&paths, &config, false)?;
    println!("{}", super::describe_cert_report(&report));

    let driver = ComposeDriver::detect()?;
    let services = super::startable_services(&artifacts);
    let report = driver
        .apply(&config.stack_name, &paths.compose_file(), &services)
        .context("could not start the stack")?;

    for (service, state) in &report.services {
        println!("  {service}: {state}");
    }
    println!("Stack '{}' is up.", config.stack_name);
    Ok(())
}

pub fn cmd_down(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let config = store.load()?;
    let driver = ComposeDriver::detect()?;

    driver.teardown(
        &config.stack_name,
        &store.paths().compose_file(),
        TeardownSelectors {
            containers: true,
            volumes: false,
        },
    )?;
    println!("Stack '{}' is down.", config.stack_name);
    Ok(())
}

pub fn cmd_status(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let config = store.load()?;
    let artifacts = crate::compile::compile(&config)?;
    let driver = ComposeDriver::detect()?;

    let services = super::startable_services(&artifacts);
    let states = driver.status(&config.stack_name, &store.paths().compose_file(), &services)?;

    println!("Stack '{}':", config.stack_name);
    for (service, state) in &states {
        println!("  {service}: {state}");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct ResetOptions {
    pub containers: bool,
    pub volumes: bool,
    pub configs: bool,
    pub certs: bool,
    pub secrets: bool,
    pub all: bool,
    pub yes: bool,
}

pub fn cmd_reset(dir: &Path, options: ResetOptions) -> Result<()> {
    let containers = options.containers || options.all;
    let volumes = options.volumes || options.all;
    let configs = options.configs || options.all;
    let certs = options.certs || options.all;
    let secrets = options.secrets || options.all;

    if !(containers || volumes || configs || certs || secrets) {
        bail!("nothing selected - pass --containers, --volumes, --configs, --certs, --secrets or --all");
    }
    if !options.yes {
        bail!("reset is destructive - re-run with --yes to confirm");
    }

    let store = super::store_for(dir);
    let paths = store.paths().clone();

    if containers || volumes {
        let config = store.load()?;
        let driver = ComposeDriver::detect()?;
        driver.teardown(
            &config.stack_name,
            &paths.compose_file(),
            TeardownSelectors {
                containers,
                volumes,
            },
        )?;
        println!("Runtime resources removed.");
    }

    if certs {
        remove_if_present(&paths.cert_file())?;
        remove_if_present(&paths.key_file())?;
        println!("Certificate material removed.");
    }

    if secrets {
        remove_if_present(&paths.secrets_file())?;
        println!("Secrets file removed.");
    }

    if configs {
        remove_if_present(&paths.config_file())?;
        remove_if_present(&paths.compose_file())?;
        remove_if_present(&paths.edge_conf())?;
        let snapshots = paths.snapshots_dir();
        if snapshots.is_dir() {
            std::fs::remove_dir_all(&snapshots)?;
        }
        println!("Configuration and snapshots removed.");
    }

    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("could not remove {}", path.display())),
    }
}
