//! Worker profile commands.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::ProfileSpec;
use crate::driver::{ComposeDriver, DeploymentDriver};

pub fn cmd_list(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let config = store.load()?;

    if config.profiles.is_empty() {
        println!("No profiles configured.");
        return Ok(());
    }
    for (name, profile) in &config.profiles {
        println!("  {name}  {}", profile.image_ref());
    }
    Ok(())
}

pub fn cmd_add(
    dir: &Path,
    name: String,
    repository: String,
    image: String,
    tag: String,
    apply: bool,
) -> Result<()> {
    let store = super::store_for(dir);
    let mut config = store.load()?;

    if config.profiles.contains_key(&name) {
        bail!("a profile named '{name}' already exists");
    }
    config.profiles.insert(
        name.clone(),
        ProfileSpec {
            repository,
            image,
            tag,
        },
    );

    store.save(&config)?;
    let artifacts = super::compile_and_write(store.paths(), &config)?;
    println!("Profile '{name}' added.");

    if apply {
        let driver = ComposeDriver::detect()?;
        driver
            .apply(
                &config.stack_name,
                &store.paths().compose_file(),
                &super::startable_services(&artifacts),
            )
            .context("could not apply the updated topology")?;
        println!("Stack updated; the new worker is starting.");
    } else {
        println!("Run 'berth up' to start the new worker.");
    }
    Ok(())
}

pub fn cmd_remove(dir: &Path, name: &str, apply: bool) -> Result<()> {
    let store = super::store_for(dir);
    let mut config = store.load()?;

    if config.profiles.remove(name).is_none() {
        bail!("profile '{name}' not found");
    }

    store.save(&config)?;
    let artifacts = super::compile_and_write(store.paths(), &config)?;
    println!("Profile '{name}' removed.");

    if apply {
        let driver = ComposeDriver::detect()?;
        // Apply prunes orphans, so the removed worker's container goes away.
        driver
            .apply(
                &config.stack_name,
                &store.paths().compose_file(),
                &super::startable_services(&artifacts),
            )
            .context("could not apply the updated topology")?;
        println!("Stack updated; the worker's container is gone.");
    } else {
        println!("Run 'berth up' to apply the removal.");
    }
    Ok(())
}
