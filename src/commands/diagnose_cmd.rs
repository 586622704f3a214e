//! Diagnose command: run the prober against the live deployment.

use std::path::Path;

use anyhow::Result;

use crate::diagnose::{self, Check};
use crate::driver::{ComposeDriver, DeploymentDriver, ServiceState};

/// Run all check categories. Returns the number of failed checks, which
/// becomes the process exit code.
pub fn cmd_diagnose(dir: &Path) -> Result<usize> {
    let store = super::store_for(dir);
    let paths = store.paths().clone();
    let config = store.load()?;
    let artifacts = crate::compile::compile(&config)?;

    let mut checks = vec![
        diagnose::artifacts_check(&paths),
        diagnose::port_check(&config),
        diagnose::certificate_check(&paths, &config),
    ];
    checks.push(services_check(&config, &paths, &artifacts));

    println!(
        "Running {} checks (poll {}s, ceiling {}s per check)...",
        checks.len(),
        diagnose::POLL_INTERVAL.as_secs(),
        diagnose::CHECK_CEILING.as_secs()
    );

    let report = diagnose::run_checks(
        checks,
        diagnose::POLL_INTERVAL,
        diagnose::CHECK_CEILING,
    );

    for check in &report.checks {
        let mark = if check.passed { "ok" } else { "FAILED" };
        println!("  [{mark}] {}: {}", check.name, check.detail);
    }

    let failed = report.failed_count();
    if failed == 0 {
        println!("All checks passed.");
    } else {
        println!("{failed} check(s) failed.");
    }
    Ok(failed)
}

fn services_check(
    config: &crate::config::StackConfig,
    paths: &crate::paths::StackPaths,
    artifacts: &crate::compile::Artifacts,
) -> Check {
    let project = config.stack_name.clone();
    let compose_file = paths.compose_file();
    let services = super::startable_services(artifacts);

    diagnose::services_check(move || {
        let driver = ComposeDriver::detect()?;
        let states = driver.status(&project, &compose_file, &services)?;
        Ok(states
            .into_iter()
            .map(|(name, state)| (name, state == ServiceState::Running))
            .collect())
    })
}
