//! CA Bundle
//!
//! Resolves the CA bundle file every new easy handle points `CAINFO` at.
//! Resolution happens once per process: an explicit path is used as-is, PEM
//! text is written once into a cache directory under a content-addressed
//! name. Failures are recorded and logged, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::TlsConfig;
use crate::error::BridgeResult;
use crate::ffi;

/// Subdirectory of the cache directory holding materialized bundles
const CACHE_SUBDIR: &str = "curl-bridge";

static BUNDLE: OnceCell<Option<PathBuf>> = OnceCell::new();

/// Bundle path for new handles, resolved on first use
pub fn bundle_path() -> Option<&'static Path> {
    BUNDLE
        .get_or_init(|| resolve(&ffi::config().tls))
        .as_deref()
}

/// Resolve a bundle from TLS settings; errors are logged and yield `None`
pub fn resolve(tls: &TlsConfig) -> Option<PathBuf> {
    if let Some(path) = &tls.ca_bundle {
        if path.exists() {
            return Some(path.clone());
        }
        warn!(path = %path.display(), "configured CA bundle does not exist");
    }

    let pem = tls.ca_bundle_pem.as_deref()?;
    if pem.trim().is_empty() {
        warn!("configured CA bundle PEM is empty; CAINFO not set");
        return None;
    }
    let dir = tls.cache_dir.clone().unwrap_or_else(std::env::temp_dir);
    match materialize(pem.as_bytes(), &dir) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to write CA bundle");
            None
        }
    }
}

/// File name for a bundle: hex SHA-256 of its content
pub fn bundle_file_name(pem: &[u8]) -> String {
    format!("cacert-{}.pem", hex::encode(Sha256::digest(pem)))
}

/// Write `pem` under `dir` unless an identical bundle is already there
pub fn materialize(pem: &[u8], dir: &Path) -> BridgeResult<PathBuf> {
    let dir = dir.join(CACHE_SUBDIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(bundle_file_name(pem));

    let up_to_date = fs::read(&path).map(|existing| existing == pem).unwrap_or(false);
    if !up_to_date {
        fs::write(&path, pem)?;
        debug!(path = %path.display(), "CA bundle written");
    }
    Ok(path)
}
