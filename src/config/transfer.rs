//! Export/import of the configuration as a compact, paste-safe string.
//!
//! The transform is JSON -> gzip -> URL-safe base64 (no padding); the
//! result round-trips exactly (`import(export(c)) == c`).

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::StackConfig;
use crate::error::{BerthError, BerthResult};

/// Encode a configuration into an opaque transport string.
pub fn export(config: &StackConfig) -> BerthResult<String> {
    let json = serde_json::to_vec(config)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode a string produced by [`export`].
pub fn import(encoded: &str) -> BerthResult<StackConfig> {
    let compressed = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|e| BerthError::InvalidExport {
            message: format!("not valid base64: {e}"),
        })?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| BerthError::InvalidExport {
            message: format!("not valid gzip data: {e}"),
        })?;

    serde_json::from_slice(&json).map_err(|e| BerthError::InvalidExport {
        message: format!("not a valid configuration document: {e}"),
    })
}
