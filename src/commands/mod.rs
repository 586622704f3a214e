//! Command handlers.
//!
//! Thin orchestration over the library: load configuration, mutate it
//! through the store, recompile artifacts, drive the runtime. Handlers
//! return `anyhow::Result` and leave typed errors to the library layer.

pub mod cert_cmds;
pub mod config_cmds;
pub mod diagnose_cmd;
pub mod lifecycle;
pub mod profile;
pub mod setup;

use std::path::Path;

use anyhow::Result;

use crate::cert::{AcmeDeps, CertManager, CertReport, CertbotRunner, MkcertCa};
use crate::compile::{self, naming, Artifacts};
use crate::config::{ConfigStore, SslConfig, StackConfig};
use crate::driver::ComposeDriver;
use crate::error::BerthResult;
use crate::fsutil;
use crate::paths::StackPaths;

pub(crate) fn store_for(dir: &Path) -> ConfigStore {
    ConfigStore::new(StackPaths::new(dir))
}

/// Write the three compiled artifacts to their fixed locations.
pub(crate) fn write_artifacts(paths: &StackPaths, artifacts: &Artifacts) -> BerthResult<()> {
    fsutil::atomic_write(
        &paths.compose_file(),
        artifacts.compose_yaml()?.as_bytes(),
    )?;
    fsutil::atomic_write(
        &paths.secrets_file(),
        artifacts.secrets.render().as_bytes(),
    )?;
    fsutil::atomic_write(&paths.edge_conf(), artifacts.routing.conf.as_bytes())?;
    Ok(())
}

/// Compile the configuration and write the artifacts.
pub(crate) fn compile_and_write(
    paths: &StackPaths,
    config: &StackConfig,
) -> BerthResult<Artifacts> {
    let artifacts = compile::compile(config)?;
    write_artifacts(paths, &artifacts)?;
    Ok(artifacts)
}

/// Services a plain `up` starts (profiled helpers excluded).
pub(crate) fn startable_services(artifacts: &Artifacts) -> Vec<String> {
    artifacts
        .topology
        .services
        .iter()
        .filter(|(_, svc)| svc.profiles.is_empty())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Run the certificate state machine for the configured strategy,
/// constructing only the collaborators that strategy needs.
pub(crate) fn run_certificate_machine(
    paths: &StackPaths,
    config: &StackConfig,
    regenerate: bool,
) -> Result<CertReport> {
    let manager = CertManager::new(paths.clone());

    let report = match &config.ssl {
        SslConfig::Acme { .. } => {
            let driver = ComposeDriver::detect()?;
            let client = CertbotRunner {
                driver: &driver,
                project: config.stack_name.clone(),
                compose_file: paths.compose_file(),
                acme_service: naming::role_service(config, naming::ROLE_ACME),
                acme_dir: paths.acme_dir(),
            };
            let deps = AcmeDeps {
                client: &client,
                driver: &driver,
            };
            if regenerate {
                manager.regenerate(config, &MkcertCa, Some(deps))?
            } else {
                manager.ensure_ready(config, &MkcertCa, Some(deps))?
            }
        }
        _ => {
            if regenerate {
                manager.regenerate(config, &MkcertCa, None)?
            } else {
                manager.ensure_ready(config, &MkcertCa, None)?
            }
        }
    };
    Ok(report)
}

pub(crate) fn describe_cert_report(report: &CertReport) -> String {
    match report {
        CertReport::SelfSigned { state } => format!("self-signed certificate: {state:?}"),
        CertReport::Acme { states } => {
            let walk: Vec<String> = states.iter().map(|s| format!("{s:?}")).collect();
            format!("acme bootstrap: {}", walk.join(" -> "))
        }
        CertReport::Manual { state } => format!("user-supplied certificate: {state:?}"),
        CertReport::External => "pass-through strategy: no certificate managed".to_string(),
    }
}
