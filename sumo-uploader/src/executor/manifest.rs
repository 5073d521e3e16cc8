//! Export manifest and upload ledger.
//!
//! The export manifest lists every file exported for a case, in export order.
//! The upload ledger is a sibling file recording how far into the manifest the
//! previous upload cycles got. Both are JSON arrays that only ever grow.

use crate::utils::{Result, UploaderError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Case-relative location of the export manifest.
pub const MANIFEST_RELATIVE_PATH: &str = "share/metadata/.dataio_export_manifest.json";

/// File name of the upload ledger, next to the manifest.
pub const LEDGER_FILE_NAME: &str = ".sumo_uploads.json";

/// One exported file.
///
/// Entries written by older or foreign exporters may lack `exported_at`.
/// Such an entry never matches a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub absolute_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub exported_by: String,
}

/// One upload checkpoint.
///
/// Missing keys load as `None` so a damaged ledger degrades to a full rescan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub last_index_manifest: Option<usize>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl LedgerEntry {
    pub fn new(last_index_manifest: usize, timestamp: impl Into<String>) -> Self {
        Self {
            last_index_manifest: Some(last_index_manifest),
            timestamp: Some(timestamp.into()),
        }
    }

    /// Checkpoint anchored at the last entry of a manifest.
    pub fn for_manifest_tail(manifest: &[ManifestEntry]) -> Option<Self> {
        let last = manifest.last()?;
        Some(Self {
            last_index_manifest: Some(manifest.len() - 1),
            timestamp: last.exported_at.clone(),
        })
    }
}

pub fn manifest_path(casepath: &Path) -> PathBuf {
    casepath.join(MANIFEST_RELATIVE_PATH)
}

pub fn ledger_path(casepath: &Path) -> PathBuf {
    manifest_path(casepath).with_file_name(LEDGER_FILE_NAME)
}

/// Load the export manifest. A missing manifest is `ManifestNotFound`.
pub fn load_manifest(casepath: &Path) -> Result<Vec<ManifestEntry>> {
    let path = manifest_path(casepath);
    info!("Loading export manifest from {}", path.display());

    if !path.is_file() {
        return Err(UploaderError::ManifestNotFound(path));
    }

    let content = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load the upload ledger. A missing ledger means nothing was uploaded yet.
pub fn load_ledger(casepath: &Path) -> Result<Vec<LedgerEntry>> {
    let path = ledger_path(casepath);

    if !path.is_file() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Append one checkpoint and rewrite the ledger.
pub fn append_ledger(casepath: &Path, entry: LedgerEntry) -> Result<Vec<LedgerEntry>> {
    let path = ledger_path(casepath);
    let mut ledger = load_ledger(casepath)?;
    ledger.push(entry);

    let json = serde_json::to_string_pretty(&ledger)?;
    std::fs::write(&path, json)?;

    Ok(ledger)
}
