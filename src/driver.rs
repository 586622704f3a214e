//! Deployment driver: the adapter over the container runtime.
//!
//! The rest of the crate only sees the [`DeploymentDriver`] trait; the
//! production implementation shells out to `docker compose` (falling back
//! to the standalone `docker-compose` binary). Applying a topology is
//! idempotent, and partial application is reported per service.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::{BerthError, BerthResult};

/// Observed state of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
    Missing,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// Per-service outcome of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub services: BTreeMap<String, ServiceState>,
}

/// What `teardown` removes; anything not selected is left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSelectors {
    pub containers: bool,
    pub volumes: bool,
}

/// Narrow interface to the container runtime.
pub trait DeploymentDriver {
    /// Bring the topology up. Applying the same topology twice produces
    /// no observable change.
    fn apply(&self, project: &str, compose_file: &Path, services: &[String])
        -> BerthResult<ApplyReport>;

    /// Per-service state of the stack.
    fn status(
        &self,
        project: &str,
        compose_file: &Path,
        services: &[String],
    ) -> BerthResult<BTreeMap<String, ServiceState>>;

    /// Remove the selected resources.
    fn teardown(
        &self,
        project: &str,
        compose_file: &Path,
        selectors: TeardownSelectors,
    ) -> BerthResult<()>;

    /// Start a single service.
    fn start_service(&self, project: &str, compose_file: &Path, service: &str) -> BerthResult<()>;

    /// Stop a single service.
    fn stop_service(&self, project: &str, compose_file: &Path, service: &str) -> BerthResult<()>;

    /// Run a one-off command in a service container, waiting for it to
    /// finish.
    fn run_oneshot(
        &self,
        project: &str,
        compose_file: &Path,
        service: &str,
        args: &[String],
    ) -> BerthResult<()>;

    /// Subnets of the networks that already exist on this host, in CIDR
    /// notation. Used by the allocator to avoid collisions.
    fn existing_subnets(&self) -> BerthResult<Vec<String>>;
}

/// Production driver shelling out to the compose CLI.
pub struct ComposeDriver {
    /// `["docker", "compose"]` or `["docker-compose"]`.
    compose: Vec<String>,
}

impl ComposeDriver {
    /// Detect the available compose command, preferring V2.
    pub fn detect() -> BerthResult<Self> {
        if probe(&["docker", "compose", "version"]) {
            return Ok(Self {
                compose: vec!["docker".to_string(), "compose".to_string()],
            });
        }
        if probe(&["docker-compose", "--version"]) {
            return Ok(Self {
                compose: vec!["docker-compose".to_string()],
            });
        }
        Err(BerthError::driver(
            "docker compose is not available - install Docker with the compose plugin",
        ))
    }

    fn compose_command(&self, project: &str, compose_file: &Path) -> Command {
        let mut cmd = Command::new(&self.compose[0]);
        for arg in &self.compose[1..] {
            cmd.arg(arg);
        }
        cmd.arg("--project-name")
            .arg(project)
            .arg("--file")
            .arg(compose_file);
        cmd
    }

    fn run(&self, mut cmd: Command, context: &str) -> BerthResult<std::process::Output> {
        let output = cmd
            .output()
            .map_err(|e| BerthError::driver(format!("{context}: {e}")))?;
        if !output.status.success() {
            return Err(BerthError::driver(format!(
                "{context}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

/// One line of `compose ps --format json` output.
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "State")]
    state: String,
}

impl DeploymentDriver for ComposeDriver {
    fn apply(
        &self,
        project: &str,
        compose_file: &Path,
        services: &[String],
    ) -> BerthResult<ApplyReport> {
        let mut cmd = self.compose_command(project, compose_file);
        cmd.args(["up", "-d", "--remove-orphans"]);
        let up = cmd.output().map_err(|e| BerthError::driver(format!("compose up: {e}")))?;

        // Report per service even when `up` failed part-way: the states
        // tell the operator which services made it.
        let states = self.status(project, compose_file, services)?;
        if !up.status.success() {
            let failed: Vec<&String> = states
                .iter()
                .filter(|(_, state)| **state != ServiceState::Running)
                .map(|(name, _)| name)
                .collect();
            return Err(BerthError::driver(format!(
                "apply was partial; not running: [{}]: {}",
                failed
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                String::from_utf8_lossy(&up.stderr).trim()
            )));
        }

        Ok(ApplyReport { services: states })
    }

    fn status(
        &self,
        project: &str,
        compose_file: &Path,
        services: &[String],
    ) -> BerthResult<BTreeMap<String, ServiceState>> {
        let mut cmd = self.compose_command(project, compose_file);
        cmd.args(["ps", "--all", "--format", "json"]);
        let output = self.run(cmd, "compose ps")?;

        let mut states: BTreeMap<String, ServiceState> = services
            .iter()
            .map(|s| (s.clone(), ServiceState::Missing))
            .collect();

        // Compose emits one JSON document per line.
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: PsEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let state = if entry.state.eq_ignore_ascii_case("running") {
                ServiceState::Running
            } else {
                ServiceState::Stopped
            };
            states.insert(entry.service, state);
        }

        Ok(states)
    }

    fn teardown(
        &self,
        project: &str,
        compose_file: &Path,
        selectors: TeardownSelectors,
    ) -> BerthResult<()> {
        if !selectors.containers && !selectors.volumes {
            return Ok(());
        }
        let mut cmd = self.compose_command(project, compose_file);
        cmd.arg("down");
        if selectors.volumes {
            cmd.arg("--volumes");
        }
        self.run(cmd, "compose down")?;
        Ok(())
    }

    fn start_service(&self, project: &str, compose_file: &Path, service: &str) -> BerthResult<()> {
        let mut cmd = self.compose_command(project, compose_file);
        cmd.args(["up", "-d", service]);
        self.run(cmd, &format!("compose up {service}"))?;
        Ok(())
    }

    fn stop_service(&self, project: &str, compose_file: &Path, service: &str) -> BerthResult<()> {
        let mut cmd = self.compose_command(project, compose_file);
        cmd.args(["stop", service]);
        self.run(cmd, &format!("compose stop {service}"))?;
        Ok(())
    }

    fn run_oneshot(
        &self,
        project: &str,
        compose_file: &Path,
        service: &str,
        args: &[String],
    ) -> BerthResult<()> {
        let mut cmd = self.compose_command(project, compose_file);
        cmd.args(["run", "--rm", service]);
        cmd.args(args);
        self.run(cmd, &format!("compose run {service}"))?;
        Ok(())
    }

    fn existing_subnets(&self) -> BerthResult<Vec<String>> {
        let output = Command::new("docker")
            .args([
                "network",
                "ls",
                "--format",
                "{{.ID}}",
            ])
            .output()
            .map_err(|e| BerthError::driver(format!("docker network ls: {e}")))?;
        if !output.status.success() {
            return Err(BerthError::driver(format!(
                "docker network ls: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut inspect = Command::new("docker");
        inspect.args(["network", "inspect", "--format", "{{range .IPAM.Config}}{{.Subnet}}\n{{end}}"]);
        inspect.args(&ids);
        let output = inspect
            .output()
            .map_err(|e| BerthError::driver(format!("docker network inspect: {e}")))?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

fn probe(argv: &[&str]) -> bool {
    Command::new(argv[0])
        .args(&argv[1..])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
