//! Certificate commands.

use std::path::Path;

use anyhow::Result;

pub fn cmd_regenerate(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let paths = store.paths().clone();
    let config = store.load()?;

    // The bootstrap sequence drives the edge through the compose file, so
    // the artifacts must be current before the state machine runs.
    paths.ensure_directories()?;
    super::compile_and_write(&paths, &config)?;

    let report = super::run_certificate_machine(&paths, &config, true)?;
    println!("{}", super::describe_cert_report(&report));
    println!("Run 'berth up' to serve the new certificate.");
    Ok(())
}
