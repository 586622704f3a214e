//! Bootstrap sequence for publicly-issued certificates.
//!
//! The chicken-and-egg problem: the secure edge cannot exist before the
//! certificate does, and the validation authority must reach the host
//! before issuing one. The saga below serves the validation challenge
//! over a minimal plaintext rule set, and has a single compensating
//! action: restore the previous routing config and stop the bootstrap
//! edge. Failure never tears down a previously working topology.

use std::fs;
use std::path::Path;

use crate::cert::AcmeClient;
use crate::compile::{self, naming};
use crate::config::{SslConfig, StackConfig};
use crate::driver::{DeploymentDriver, ServiceState};
use crate::error::{BerthError, BerthResult};
use crate::fsutil;
use crate::paths::StackPaths;

/// States of the publicly-issued strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcmeState {
    Unconfigured,
    BootstrapListening,
    ChallengeServed,
    Validated,
    CertIssued,
    Failed,
}

/// Records every state the saga passes through, for reporting and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapTrace {
    pub states: Vec<AcmeState>,
}

impl BootstrapTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&mut self, state: AcmeState) {
        self.states.push(state);
    }
}

/// Run the bootstrap saga to completion.
///
/// On success the issued material sits at the managed paths and the full
/// routing rules are active. On failure the routing config is byte-for-byte
/// what it was before, the bootstrap edge is stopped if it was not already
/// running, and a `Certificate` error is returned.
pub fn run(
    trace: &mut BootstrapTrace,
    paths: &StackPaths,
    config: &StackConfig,
    acme: &dyn AcmeClient,
    driver: &dyn DeploymentDriver,
) -> BerthResult<()> {
    let SslConfig::Acme { email } = &config.ssl else {
        return Err(BerthError::certificate(
            "bootstrap requested for a non-acme strategy",
        ));
    };

    let artifacts = compile::compile(config)?;
    let challenge_conf = artifacts.routing.challenge_conf.as_deref().ok_or_else(|| {
        BerthError::compile("acme configuration compiled without a challenge rule set")
    })?;

    trace.enter(AcmeState::Unconfigured);

    let edge_service = naming::role_service(config, naming::ROLE_EDGE);
    let compose_file = paths.compose_file();
    let edge_conf = paths.edge_conf();

    // Remember what to put back if anything below fails.
    let previous_conf = match fs::read(&edge_conf) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let edge_was_running = driver
        .status(&config.stack_name, &compose_file, std::slice::from_ref(&edge_service))?
        .get(&edge_service)
        .is_some_and(|state| *state == ServiceState::Running);

    let compensate = |driver: &dyn DeploymentDriver| {
        restore_conf(&edge_conf, previous_conf.as_deref());
        if !edge_was_running {
            let _ = driver.stop_service(&config.stack_name, &compose_file, &edge_service);
        }
    };

    // Phase 1: minimal plaintext topology serving only the challenge path.
    fs::create_dir_all(paths.webroot_dir())?;
    fsutil::atomic_write(&edge_conf, challenge_conf.as_bytes())?;
    if let Err(e) = driver.start_service(&config.stack_name, &compose_file, &edge_service) {
        compensate(driver);
        trace.enter(AcmeState::Failed);
        return Err(BerthError::certificate(format!(
            "could not start the bootstrap edge: {e}"
        )));
    }
    trace.enter(AcmeState::BootstrapListening);

    // Phase 2: the client writes the challenge artifact into the shared
    // webroot and the authority fetches it over the plaintext route.
    let material = match acme.request(&config.hosts, email) {
        Ok(material) => material,
        Err(e) => {
            compensate(driver);
            trace.enter(AcmeState::Failed);
            return Err(BerthError::certificate(format!(
                "domain validation failed: {e}"
            )));
        }
    };
    trace.enter(AcmeState::ChallengeServed);
    trace.enter(AcmeState::Validated);

    // Phase 3: relocate the issued material to where the full topology
    // expects it.
    if let Err(e) = install_material(paths, &material.cert, &material.key) {
        compensate(driver);
        trace.enter(AcmeState::Failed);
        return Err(e);
    }
    trace.enter(AcmeState::CertIssued);

    // Phase 4: retire the bootstrap-only rule set; the full routing takes
    // over.
    fsutil::atomic_write(&edge_conf, artifacts.routing.conf.as_bytes())?;
    Ok(())
}

fn restore_conf(edge_conf: &Path, previous: Option<&[u8]>) {
    match previous {
        Some(bytes) => {
            let _ = fsutil::atomic_write(edge_conf, bytes);
        }
        None => {
            let _ = fs::remove_file(edge_conf);
        }
    }
}

fn install_material(paths: &StackPaths, cert: &Path, key: &Path) -> BerthResult<()> {
    fs::create_dir_all(paths.certs_dir())?;
    fs::copy(cert, paths.cert_file()).map_err(|e| {
        BerthError::certificate(format!("could not install certificate: {e}"))
    })?;
    fs::copy(key, paths.key_file()).map_err(|e| {
        BerthError::certificate(format!("could not install private key: {e}"))
    })?;
    Ok(())
}
