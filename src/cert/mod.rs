//! Certificate manager: one state machine per SSL strategy.
//!
//! The terminal state for every strategy is "certificate ready". The acme
//! strategy owns a non-trivial bootstrap sequence (see [`bootstrap`]); the
//! others are a local CA issue, a file copy, or a no-op.

pub mod bootstrap;

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{SslConfig, StackConfig};
use crate::driver::DeploymentDriver;
use crate::error::{BerthError, BerthResult};
use crate::fsutil;
use crate::paths::StackPaths;

pub use bootstrap::{AcmeState, BootstrapTrace};

/// States of the self-signed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfSignedState {
    NoCa,
    CaInstalled,
    CertIssued,
}

/// States of the user-supplied strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualState {
    Missing,
    Copied,
}

/// What a certificate operation did, per strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertReport {
    SelfSigned { state: SelfSignedState },
    Acme { states: Vec<AcmeState> },
    Manual { state: ManualState },
    /// Pass-through: nothing to manage.
    External,
}

/// Local CA tooling (trust-anchor installation plus issuance).
pub trait LocalCa {
    /// Install the local trust anchor. Idempotent, safe to repeat.
    fn ensure_trust_anchor(&self) -> BerthResult<()>;

    /// Issue a certificate covering exactly `hosts`, overwriting any
    /// previous material at the target paths.
    fn issue(&self, hosts: &[String], cert: &Path, key: &Path) -> BerthResult<()>;
}

/// Certificate and key produced by a validation authority's client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Client of the remote validation authority.
///
/// `request` must leave the challenge artifact in the shared webroot for
/// the authority to fetch over plaintext, and returns where the issued
/// material landed.
pub trait AcmeClient {
    fn request(&self, hosts: &[String], email: &str) -> BerthResult<IssuedMaterial>;
}

/// Collaborators the acme strategy needs; the other strategies run
/// without a runtime at all.
pub struct AcmeDeps<'a> {
    pub client: &'a dyn AcmeClient,
    pub driver: &'a dyn DeploymentDriver,
}

/// Drives the certificate material for the configured strategy.
pub struct CertManager {
    paths: StackPaths,
}

impl CertManager {
    pub fn new(paths: StackPaths) -> Self {
        Self { paths }
    }

    /// Make sure the certificate material the compiled artifacts reference
    /// exists and is current. Does nothing if the strategy's terminal
    /// state has already been reached.
    pub fn ensure_ready(
        &self,
        config: &StackConfig,
        ca: &dyn LocalCa,
        acme: Option<AcmeDeps<'_>>,
    ) -> BerthResult<CertReport> {
        match &config.ssl {
            SslConfig::SelfSigned => {
                if self.material_present() {
                    return Ok(CertReport::SelfSigned {
                        state: SelfSignedState::CertIssued,
                    });
                }
                self.issue_self_signed(config, ca)
            }
            SslConfig::Acme { .. } => {
                if self.material_present() {
                    return Ok(CertReport::Acme {
                        states: vec![AcmeState::CertIssued],
                    });
                }
                self.run_bootstrap(config, acme)
            }
            SslConfig::Manual { .. } => self.copy_manual(config),
            SslConfig::External => Ok(CertReport::External),
        }
    }

    /// Re-enter the terminal-producing transition for the current
    /// strategy. Explicit operator action, never implicit.
    pub fn regenerate(
        &self,
        config: &StackConfig,
        ca: &dyn LocalCa,
        acme: Option<AcmeDeps<'_>>,
    ) -> BerthResult<CertReport> {
        match &config.ssl {
            SslConfig::SelfSigned => self.issue_self_signed(config, ca),
            SslConfig::Acme { .. } => self.run_bootstrap(config, acme),
            SslConfig::Manual { .. } => self.copy_manual(config),
            SslConfig::External => Ok(CertReport::External),
        }
    }

    pub fn material_present(&self) -> bool {
        self.paths.cert_file().is_file() && self.paths.key_file().is_file()
    }

    fn issue_self_signed(
        &self,
        config: &StackConfig,
        ca: &dyn LocalCa,
    ) -> BerthResult<CertReport> {
        std::fs::create_dir_all(self.paths.certs_dir())?;
        ca.ensure_trust_anchor()?;
        ca.issue(
            &config.hosts,
            &self.paths.cert_file(),
            &self.paths.key_file(),
        )?;
        Ok(CertReport::SelfSigned {
            state: SelfSignedState::CertIssued,
        })
    }

    fn run_bootstrap(
        &self,
        config: &StackConfig,
        acme: Option<AcmeDeps<'_>>,
    ) -> BerthResult<CertReport> {
        let deps = acme.ok_or_else(|| {
            BerthError::certificate(
                "the acme strategy needs the container runtime and validation client",
            )
        })?;
        let mut trace = BootstrapTrace::new();
        bootstrap::run(&mut trace, &self.paths, config, deps.client, deps.driver)?;
        Ok(CertReport::Acme {
            states: trace.states,
        })
    }

    fn copy_manual(&self, config: &StackConfig) -> BerthResult<CertReport> {
        let SslConfig::Manual {
            cert_path,
            key_path,
        } = &config.ssl
        else {
            return Err(BerthError::certificate(
                "manual copy requested for a non-manual strategy",
            ));
        };

        let cert_src = fsutil::expand_home(cert_path);
        let key_src = fsutil::expand_home(key_path);
        for src in [&cert_src, &key_src] {
            if !src.is_file() {
                return Err(BerthError::certificate(format!(
                    "certificate file {} does not exist",
                    src.display()
                )));
            }
        }

        std::fs::create_dir_all(self.paths.certs_dir())?;
        std::fs::copy(&cert_src, self.paths.cert_file())?;
        std::fs::copy(&key_src, self.paths.key_file())?;
        Ok(CertReport::Manual {
            state: ManualState::Copied,
        })
    }
}

/// Production local CA adapter, shelling out to `mkcert`.
pub struct MkcertCa;

impl MkcertCa {
    fn available() -> bool {
        Command::new("mkcert")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl LocalCa for MkcertCa {
    fn ensure_trust_anchor(&self) -> BerthResult<()> {
        if !Self::available() {
            return Err(BerthError::certificate(
                "mkcert is not installed - install it to use the self-signed strategy",
            ));
        }
        let output = Command::new("mkcert")
            .arg("-install")
            .output()
            .map_err(|e| BerthError::certificate(format!("mkcert -install: {e}")))?;
        if !output.status.success() {
            return Err(BerthError::certificate(format!(
                "mkcert -install failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn issue(&self, hosts: &[String], cert: &Path, key: &Path) -> BerthResult<()> {
        let output = Command::new("mkcert")
            .arg("-cert-file")
            .arg(cert)
            .arg("-key-file")
            .arg(key)
            .args(hosts)
            .output()
            .map_err(|e| BerthError::certificate(format!("mkcert: {e}")))?;
        if !output.status.success() {
            return Err(BerthError::certificate(format!(
                "mkcert failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Production ACME adapter, running the client container through the
/// deployment driver.
pub struct CertbotRunner<'a> {
    pub driver: &'a dyn DeploymentDriver,
    pub project: String,
    pub compose_file: PathBuf,
    pub acme_service: String,
    pub acme_dir: PathBuf,
}

impl AcmeClient for CertbotRunner<'_> {
    fn request(&self, hosts: &[String], email: &str) -> BerthResult<IssuedMaterial> {
        let mut args = vec![
            "certonly".to_string(),
            "--webroot".to_string(),
            "--webroot-path".to_string(),
            crate::compile::routing::CHALLENGE_ROOT.to_string(),
            "--email".to_string(),
            email.to_string(),
            "--agree-tos".to_string(),
            "--no-eff-email".to_string(),
            "--force-renewal".to_string(),
        ];
        for host in hosts {
            args.push("-d".to_string());
            args.push(host.clone());
        }

        self.driver
            .run_oneshot(&self.project, &self.compose_file, &self.acme_service, &args)?;

        let first = hosts.first().ok_or_else(|| {
            BerthError::certificate("no hosts configured for validation")
        })?;
        let live = self.acme_dir.join("live").join(first);
        let material = IssuedMaterial {
            cert: live.join("fullchain.pem"),
            key: live.join("privkey.pem"),
        };
        if !material.cert.is_file() || !material.key.is_file() {
            return Err(BerthError::certificate(format!(
                "validation client reported success but no material at {}",
                live.display()
            )));
        }
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::RecordingDriver;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// LocalCa double recording its calls.
    #[derive(Clone, Default)]
    struct StubCa {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl LocalCa for StubCa {
        fn ensure_trust_anchor(&self) -> BerthResult<()> {
            self.calls.lock().unwrap().push("install".to_string());
            Ok(())
        }

        fn issue(&self, hosts: &[String], cert: &Path, key: &Path) -> BerthResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("issue:{}", hosts.join(",")));
            std::fs::write(cert, "stub cert").unwrap();
            std::fs::write(key, "stub key").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_self_signed_installs_ca_then_issues() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let ca = StubCa::default();
        let config = StackConfig::default();

        let report = manager.ensure_ready(&config, &ca, None).unwrap();

        assert_eq!(
            report,
            CertReport::SelfSigned {
                state: SelfSignedState::CertIssued
            }
        );
        let calls = ca.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["install", "issue:localhost,127.0.0.1"]);
        assert!(manager.paths.cert_file().is_file());
    }

    #[test]
    fn test_self_signed_ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let ca = StubCa::default();
        let config = StackConfig::default();

        manager.ensure_ready(&config, &ca, None).unwrap();
        manager.ensure_ready(&config, &ca, None).unwrap();

        // Second call found existing material and did not reissue.
        assert_eq!(ca.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_regenerate_always_reissues() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let ca = StubCa::default();
        let config = StackConfig::default();

        manager.ensure_ready(&config, &ca, None).unwrap();
        manager.regenerate(&config, &ca, None).unwrap();

        assert_eq!(ca.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_acme_without_runtime_deps_fails() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let mut config = StackConfig::default();
        config.ssl = SslConfig::Acme {
            email: "ops@example.test".to_string(),
        };

        let err = manager
            .ensure_ready(&config, &StubCa::default(), None)
            .unwrap_err();
        assert!(matches!(err, BerthError::Certificate { .. }));
    }

    #[test]
    fn test_acme_with_existing_material_is_ready() {
        let dir = tempdir().unwrap();
        let paths = StackPaths::new(dir.path());
        std::fs::create_dir_all(paths.certs_dir()).unwrap();
        std::fs::write(paths.cert_file(), "cert").unwrap();
        std::fs::write(paths.key_file(), "key").unwrap();

        let manager = CertManager::new(paths);
        let mut config = StackConfig::default();
        config.ssl = SslConfig::Acme {
            email: "ops@example.test".to_string(),
        };

        // No deps needed when the terminal state was already reached.
        let report = manager
            .ensure_ready(&config, &StubCa::default(), None)
            .unwrap();
        assert_eq!(
            report,
            CertReport::Acme {
                states: vec![AcmeState::CertIssued]
            }
        );
    }

    #[test]
    fn test_manual_copies_material() {
        let dir = tempdir().unwrap();
        let src_cert = dir.path().join("operator.crt");
        let src_key = dir.path().join("operator.key");
        std::fs::write(&src_cert, "operator cert").unwrap();
        std::fs::write(&src_key, "operator key").unwrap();

        let manager = CertManager::new(StackPaths::new(dir.path().join("stack")));
        let mut config = StackConfig::default();
        config.ssl = SslConfig::Manual {
            cert_path: src_cert,
            key_path: src_key,
        };

        let report = manager
            .ensure_ready(&config, &StubCa::default(), None)
            .unwrap();

        assert_eq!(
            report,
            CertReport::Manual {
                state: ManualState::Copied
            }
        );
        assert_eq!(
            std::fs::read_to_string(manager.paths.cert_file()).unwrap(),
            "operator cert"
        );
    }

    #[test]
    fn test_manual_missing_file_fails() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let mut config = StackConfig::default();
        config.ssl = SslConfig::Manual {
            cert_path: dir.path().join("nope.crt"),
            key_path: dir.path().join("nope.key"),
        };

        let err = manager
            .ensure_ready(&config, &StubCa::default(), None)
            .unwrap_err();
        assert!(matches!(err, BerthError::Certificate { .. }));
    }

    #[test]
    fn test_external_is_a_no_op() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let mut config = StackConfig::default();
        config.ssl = SslConfig::External;

        let report = manager
            .ensure_ready(&config, &StubCa::default(), None)
            .unwrap();
        assert_eq!(report, CertReport::External);
        assert!(!manager.paths.cert_file().exists());
    }

    #[test]
    fn test_regenerate_acme_runs_the_bootstrap() {
        let dir = tempdir().unwrap();
        let manager = CertManager::new(StackPaths::new(dir.path()));
        let mut config = StackConfig::default();
        config.hosts = vec!["example.test".to_string()];
        config.ssl = SslConfig::Acme {
            email: "ops@example.test".to_string(),
        };

        struct StubAcme(std::path::PathBuf);
        impl AcmeClient for StubAcme {
            fn request(&self, _hosts: &[String], _email: &str) -> BerthResult<IssuedMaterial> {
                let cert = self.0.join("fullchain.pem");
                let key = self.0.join("privkey.pem");
                std::fs::write(&cert, "issued").unwrap();
                std::fs::write(&key, "issued key").unwrap();
                Ok(IssuedMaterial { cert, key })
            }
        }

        let driver = RecordingDriver::new();
        let client = StubAcme(dir.path().to_path_buf());
        let report = manager
            .regenerate(
                &config,
                &StubCa::default(),
                Some(AcmeDeps {
                    client: &client,
                    driver: &driver,
                }),
            )
            .unwrap();

        match report {
            CertReport::Acme { states } => {
                assert_eq!(states.last(), Some(&AcmeState::CertIssued));
            }
            other => panic!("expected an acme report, got {other:?}"),
        }
        assert!(manager.paths.cert_file().is_file());
    }
}
