//! Configuration persistence: load, atomic save, snapshot history.
//!
//! Every mutation snapshots the pre-mutation state first, then replaces
//! the config file atomically, so a crash mid-write never corrupts the
//! prior valid state. Snapshots are an append-only, bounded history.

use std::collections::BTreeSet;
use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use fs2::FileExt;

use crate::config::{validate, SslConfig, StackConfig};
use crate::error::{BerthError, BerthResult};
use crate::fsutil;
use crate::paths::StackPaths;

/// Snapshots kept before the oldest are pruned.
const DEFAULT_RETENTION: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Non-fatal warning surfaced on load (e.g. an unknown key in the
/// document, usually a typo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
}

/// One entry of the snapshot history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Sequential, sortable identifier, e.g. `0007-20260806T101500`.
    pub id: String,
    pub seq: u64,
    pub taken: DateTime<Utc>,
    pub path: PathBuf,
}

/// Persists the configuration document and its snapshot history.
pub struct ConfigStore {
    paths: StackPaths,
    retention: usize,
}

impl ConfigStore {
    pub fn new(paths: StackPaths) -> Self {
        Self {
            paths,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(paths: StackPaths, retention: usize) -> Self {
        Self { paths, retention }
    }

    pub fn paths(&self) -> &StackPaths {
        &self.paths
    }

    pub fn exists(&self) -> bool {
        self.paths.config_file().exists()
    }

    /// Load the current configuration.
    pub fn load(&self) -> BerthResult<StackConfig> {
        self.load_with_warnings().map(|(config, _)| config)
    }

    /// Load and collect non-fatal warnings for unknown keys.
    pub fn load_with_warnings(&self) -> BerthResult<(StackConfig, Vec<ConfigWarning>)> {
        let path = self.paths.config_file();
        if !path.exists() {
            return Err(BerthError::NotFound { path });
        }
        let content = fs::read_to_string(&path)?;

        let mut unknown: Vec<String> = Vec::new();
        let mut deserializer = serde_json::Deserializer::from_str(&content);
        let config: StackConfig = serde_ignored::deserialize(&mut deserializer, |p| {
            unknown.push(p.to_string());
        })?;

        let warnings = unknown
            .into_iter()
            .map(|path_str| ConfigWarning {
                key: path_str
                    .split('.')
                    .next_back()
                    .unwrap_or(path_str.as_str())
                    .to_string(),
            })
            .collect();

        Ok((config, warnings))
    }

    /// Validate and persist a configuration.
    ///
    /// The pre-mutation state is snapshotted first; the returned id is
    /// `None` on the very first save or when the document is unchanged.
    pub fn save(&self, config: &StackConfig) -> BerthResult<Option<String>> {
        validate(config)?;

        let serialized = render(config)?;
        let config_path = self.paths.config_file();
        fs::create_dir_all(self.paths.root())?;

        // Advisory lock so two mutating invocations serialize.
        let lock_path = config_path.with_extension("lock");
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let result = self.save_locked(config_path, &serialized);
        let _ = fs2::FileExt::unlock(&lock_file);
        result
    }

    fn save_locked(&self, config_path: PathBuf, serialized: &str) -> BerthResult<Option<String>> {
        let snapshot_id = match fs::read_to_string(&config_path) {
            Ok(previous) => {
                if fsutil::hash_content(previous.as_bytes())
                    == fsutil::hash_content(serialized.as_bytes())
                {
                    None
                } else {
                    Some(self.take_snapshot(&previous)?)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        fsutil::atomic_write(&config_path, serialized.as_bytes())?;
        self.prune_snapshots()?;
        Ok(snapshot_id)
    }

    fn take_snapshot(&self, content: &str) -> BerthResult<String> {
        let dir = self.paths.snapshots_dir();
        fs::create_dir_all(&dir)?;

        let seq = self
            .snapshots()?
            .first()
            .map(|s| s.seq + 1)
            .unwrap_or(1);
        let id = format!("{:04}-{}", seq, Utc::now().format(TIMESTAMP_FORMAT));
        fsutil::atomic_write(&dir.join(format!("{id}.json")), content.as_bytes())?;
        Ok(id)
    }

    /// List snapshots, newest first.
    pub fn snapshots(&self) -> BerthResult<Vec<SnapshotInfo>> {
        let dir = self.paths.snapshots_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            let Some((seq_str, ts_str)) = stem.split_once('-') else {
                continue;
            };
            let Ok(seq) = seq_str.parse::<u64>() else {
                continue;
            };
            let Ok(naive) = NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT) else {
                continue;
            };
            snapshots.push(SnapshotInfo {
                id: stem,
                seq,
                taken: naive.and_utc(),
                path,
            });
        }

        snapshots.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(snapshots)
    }

    /// Read a snapshot and re-validate it against the current host.
    ///
    /// A snapshot is data, not a guaranteed-valid target: structural
    /// invariants, referenced file paths and port availability are all
    /// re-checked before it can be activated.
    pub fn restore(&self, id: &str) -> BerthResult<StackConfig> {
        let snapshot = self
            .snapshots()?
            .into_iter()
            .find(|s| s.id == id || s.seq.to_string() == id)
            .ok_or_else(|| BerthError::InvalidSnapshot {
                id: id.to_string(),
                reason: "no such snapshot".to_string(),
            })?;

        let content = fs::read_to_string(&snapshot.path)?;
        let config: StackConfig =
            serde_json::from_str(&content).map_err(|e| BerthError::InvalidSnapshot {
                id: snapshot.id.clone(),
                reason: format!("unreadable document: {e}"),
            })?;

        validate(&config).map_err(|e| BerthError::InvalidSnapshot {
            id: snapshot.id.clone(),
            reason: e.to_string(),
        })?;

        self.revalidate_on_host(&snapshot.id, &config)?;
        Ok(config)
    }

    fn revalidate_on_host(&self, id: &str, candidate: &StackConfig) -> BerthResult<()> {
        if let SslConfig::Manual {
            cert_path,
            key_path,
        } = &candidate.ssl
        {
            for path in [cert_path, key_path] {
                let expanded = fsutil::expand_home(path);
                if !expanded.is_file() {
                    return Err(BerthError::InvalidSnapshot {
                        id: id.to_string(),
                        reason: format!("certificate file {} no longer exists", path.display()),
                    });
                }
            }
        }

        // Ports already claimed by the active configuration belong to this
        // stack; only ports claimed by somebody else invalidate a snapshot.
        let ours: BTreeSet<u16> = match self.load() {
            Ok(current) => current.claimed_ports().into_iter().collect(),
            Err(_) => BTreeSet::new(),
        };
        for port in candidate.claimed_ports() {
            if ours.contains(&port) {
                continue;
            }
            match TcpListener::bind(("0.0.0.0", port)) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    return Err(BerthError::InvalidSnapshot {
                        id: id.to_string(),
                        reason: format!("port {port} is already in use on this host"),
                    });
                }
                // Permission errors (privileged ports as non-root) do not
                // tell us the port is taken.
                Err(_) => {}
            }
        }
        Ok(())
    }

    fn prune_snapshots(&self) -> BerthResult<()> {
        let snapshots = self.snapshots()?;
        for stale in snapshots.iter().skip(self.retention) {
            fs::remove_file(&stale.path)?;
        }
        Ok(())
    }
}

fn render(config: &StackConfig) -> BerthResult<String> {
    let mut serialized = serde_json::to_string_pretty(config)?;
    serialized.push('\n');
    Ok(serialized)
}
