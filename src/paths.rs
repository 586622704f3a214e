//! Stack directory layout.
//!
//! Every command operates on one stack directory; all persisted and
//! generated files live at fixed locations beneath it.

use std::path::{Path, PathBuf};

use crate::error::BerthResult;

/// Fixed file locations inside a stack directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPaths {
    root: PathBuf,
}

impl StackPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration document.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("berth.json")
    }

    /// Append-only snapshot history.
    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// The compiled topology artifact.
    pub fn compose_file(&self) -> PathBuf {
        self.root.join("compose.yaml")
    }

    /// The compiled secrets artifact, consumed as process environment.
    pub fn secrets_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// The active edge routing config.
    pub fn edge_conf(&self) -> PathBuf {
        self.root.join("data/edge/conf/edge.conf")
    }

    /// Managed certificate location.
    pub fn certs_dir(&self) -> PathBuf {
        self.root.join("data/edge/certs")
    }

    pub fn cert_file(&self) -> PathBuf {
        self.certs_dir().join("edge.crt")
    }

    pub fn key_file(&self) -> PathBuf {
        self.certs_dir().join("edge.key")
    }

    /// Shared writable location the validation challenge is served from.
    pub fn webroot_dir(&self) -> PathBuf {
        self.root.join("data/edge/webroot")
    }

    /// State directory of the ACME client container.
    pub fn acme_dir(&self) -> PathBuf {
        self.root.join("data/acme")
    }

    /// Create the directory skeleton a deployable stack needs.
    pub fn ensure_directories(&self) -> BerthResult<()> {
        for dir in [
            self.snapshots_dir(),
            self.certs_dir(),
            self.edge_conf().parent().map(PathBuf::from).unwrap_or_else(|| self.root.clone()),
            self.webroot_dir(),
            self.acme_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
