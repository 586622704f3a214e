//! Small file-system helpers shared across the crate.
//!
//! All configuration and artifact writes go through [`atomic_write`] so a
//! crash mid-write never corrupts the previous valid state.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::BerthResult;

/// Write content to a file atomically.
///
/// Writes to a temporary file in the destination directory, fsyncs, then
/// renames over the target. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> BerthResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Compute the SHA-256 hash of a byte slice, `sha256:<hex>` form.
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{:x}", hasher.finalize())
}

/// Expand a leading `~` or `~/` to the user's home directory.
///
/// Paths without a tilde are returned unchanged, as are paths when no home
/// directory can be determined.
pub fn expand_home(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
