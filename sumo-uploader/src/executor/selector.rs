//! Incremental selection: which manifest entries are new since the last upload.

use crate::executor::manifest::{LedgerEntry, ManifestEntry};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Index in the manifest to start uploading from.
///
/// The last checkpoint is trusted only if the manifest entry it points at
/// still carries the same export timestamp. Anything else (out of range index,
/// missing key, regenerated manifest) restarts from 0: duplicate uploads beat
/// missed ones.
pub fn select_start_index(manifest: &[ManifestEntry], ledger: &[LedgerEntry]) -> usize {
    let (Some(last), false) = (ledger.last(), manifest.is_empty()) else {
        return 0;
    };
    let (Some(index), Some(timestamp)) = (last.last_index_manifest, last.timestamp.as_deref()) else {
        debug!(?last, "Upload ledger entry is incomplete, uploading from index 0");
        return 0;
    };

    match manifest.get(index) {
        Some(entry) if entry.exported_at.as_deref() == Some(timestamp) => index + 1,
        Some(entry) => {
            debug!(
                index,
                manifest_ts = ?entry.exported_at,
                ledger_ts = %timestamp,
                "Upload ledger does not match manifest, uploading from index 0"
            );
            0
        }
        None => {
            debug!(
                index,
                manifest_len = manifest.len(),
                "Upload ledger points past the manifest, uploading from index 0"
            );
            0
        }
    }
}

/// Paths from `start_index` onward that still exist as files.
pub fn select_files_to_upload(manifest: &[ManifestEntry], start_index: usize) -> Vec<PathBuf> {
    info!("Finding files to upload.");

    let files: Vec<PathBuf> = match manifest.get(start_index..) {
        Some(tail) if !tail.is_empty() => {
            info!("Upload will start from index {} in manifest.", start_index);
            tail.iter()
                .filter(|entry| entry.absolute_path.is_file())
                .map(|entry| entry.absolute_path.clone())
                .collect()
        }
        _ => Vec::new(),
    };

    if files.is_empty() {
        warn!("No files found!");
    }

    files
}
