//! Configuration commands: show, change, snapshots, restore,
//! export/import.

use std::path::Path;

use anyhow::{bail, Context, Result};
use similar::TextDiff;

use crate::config::{export, import, StackConfig};

pub fn cmd_show(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let (config, warnings) = store.load_with_warnings()?;
    for warning in &warnings {
        eprintln!("warning: unknown configuration key '{}'", warning.key);
    }
    println!("{}", masked_document(&config)?);
    Ok(())
}

/// The configuration with every secret-bearing field masked; only the
/// secrets artifact carries real values.
fn masked_document(config: &StackConfig) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Some(password) = value.get_mut("admin_password") {
        *password = serde_json::Value::String("********".to_string());
    }
    if let Some(databases) = value.get_mut("databases").and_then(|d| d.as_object_mut()) {
        for db in databases.values_mut() {
            if let Some(password) = db.get_mut("password") {
                *password = serde_json::Value::String("********".to_string());
            }
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn cmd_change_password(dir: &Path, password: String) -> Result<()> {
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }
    let store = super::store_for(dir);
    let mut config = store.load()?;
    config.admin_password = password;
    store.save(&config)?;
    super::compile_and_write(store.paths(), &config)?;
    println!("Password updated. Run 'berth up' to apply the change.");
    Ok(())
}

pub fn cmd_change_port(dir: &Path, port: u16) -> Result<()> {
    let store = super::store_for(dir);
    let mut config = store.load()?;
    config.external_port = port;
    store.save(&config)?;
    super::compile_and_write(store.paths(), &config)?;
    println!("External port changed to {port}. Run 'berth up' to apply the change.");
    Ok(())
}

pub fn cmd_snapshots(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let snapshots = store.snapshots()?;
    if snapshots.is_empty() {
        println!("No snapshots found.");
        return Ok(());
    }
    for snapshot in snapshots {
        println!(
            "  {}  {}",
            snapshot.id,
            snapshot.taken.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn cmd_restore(dir: &Path, snapshot: &str, yes: bool) -> Result<()> {
    let store = super::store_for(dir);
    let restored = store.restore(snapshot)?;
    let current = store.load()?;

    if restored == current {
        println!("The snapshot matches the current configuration; nothing to do.");
        return Ok(());
    }

    let before = serde_json::to_string_pretty(&current)?;
    let after = serde_json::to_string_pretty(&restored)?;
    let diff = TextDiff::from_lines(&before, &after);
    print!(
        "{}",
        diff.unified_diff()
            .header("current", &format!("snapshot {snapshot}"))
    );

    if !yes {
        println!("\nPreview only - re-run with --yes to restore this snapshot.");
        return Ok(());
    }

    store
        .save(&restored)
        .context("could not activate the restored configuration")?;
    super::compile_and_write(store.paths(), &restored)?;
    println!("Snapshot {snapshot} restored. Run 'berth up' to apply it.");
    Ok(())
}

pub fn cmd_export(dir: &Path) -> Result<()> {
    let store = super::store_for(dir);
    let config = store.load()?;
    println!("{}", export(&config)?);
    Ok(())
}

pub fn cmd_import(dir: &Path, data: &str) -> Result<()> {
    let store = super::store_for(dir);
    let config = import(data)?;
    store.save(&config)?;
    store.paths().ensure_directories()?;
    super::compile_and_write(store.paths(), &config)?;
    println!(
        "Configuration for stack '{}' imported. Run 'berth up' to apply it.",
        config.stack_name
    );
    Ok(())
}
