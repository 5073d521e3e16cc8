//! A case on disk and its counterpart on Sumo.
//!
//! The registry owns the upload cycle of a case: it optionally registers the
//! case, stages the files exported since the last successful cycle, uploads
//! them through the engine and advances the upload ledger.

pub mod metadata;
pub mod summary;


use crate::client::SumoClient;
use crate::config::{Config, SumoMode};
use crate::executor::manifest::{self, LedgerEntry, ManifestEntry};
use crate::executor::result::{UploadOutcome, UploadResult};
use crate::executor::selector;
use crate::executor::{UploadEngine, UploadOptions};
use crate::fs::{FileRecord, Metadata};
use crate::transfer::stats::format_bytes;
use crate::utils::Result;
use bytes::Bytes;
use metadata::CaseMetadata;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use summary::UploadSummary;
use tracing::{debug, info, warn};

/// Parent id used after a failed registration. Uploads under it are rejected.
pub const UNREGISTERED_PARENT_ID: &str = "0";

/// How many rejected/failed items are logged individually.
const LOGGED_ISSUES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseState {
    Unregistered,
    Registered(String),
    RegisterFailed,
}

/// Result of one upload cycle.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub outcome: UploadOutcome,
    /// None when there was nothing to upload
    pub summary: Option<UploadSummary>,
}

pub struct CaseRegistry {
    casepath: PathBuf,
    case: CaseMetadata,
    client: Arc<dyn SumoClient>,
    engine: UploadEngine,
    state: CaseState,
    register_settle: Duration,
    files: Vec<FileRecord>,
    manifest: Vec<ManifestEntry>,
}

impl CaseRegistry {
    /// `case_metadata_path` is taken relative to `casepath` unless absolute.
    pub fn new(
        casepath: &Path,
        case_metadata_path: &Path,
        client: Arc<dyn SumoClient>,
        options: UploadOptions,
        register_settle: Duration,
    ) -> Self {
        let case = CaseMetadata::load(&casepath.join(case_metadata_path));
        if case.case_uuid().is_none() {
            warn!("Invalid metadata: Could not get fmu.case.uuid from case metadata");
        }
        debug!(case_uuid = ?case.fmu_case_uuid(), "Case loaded from {}", case.path().display());

        Self {
            casepath: casepath.to_path_buf(),
            case,
            engine: UploadEngine::new(Arc::clone(&client), options),
            client,
            state: CaseState::Unregistered,
            register_settle,
            files: Vec::new(),
            manifest: Vec::new(),
        }
    }

    pub fn from_config(casepath: &Path, client: Arc<dyn SumoClient>, config: &Config) -> Self {
        Self::new(
            casepath,
            &config.case.metadata_path,
            client,
            UploadOptions::from_config(config),
            config.upload.register_settle(),
        )
    }

    pub fn casepath(&self) -> &Path {
        &self.casepath
    }

    pub fn case_metadata(&self) -> &CaseMetadata {
        &self.case
    }

    pub fn state(&self) -> &CaseState {
        &self.state
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn sumo_mode(&self) -> SumoMode {
        self.engine.options().mode
    }

    /// Id of the parent object uploads go under.
    ///
    /// Before registration this is the fmu case uuid, so an already
    /// registered case can be uploaded to without registering again.
    pub fn parent_id(&self) -> &str {
        match &self.state {
            CaseState::Registered(id) => id,
            CaseState::RegisterFailed => UNREGISTERED_PARENT_ID,
            CaseState::Unregistered => self.case.case_uuid().unwrap_or(UNREGISTERED_PARENT_ID),
        }
    }

    /// Register the case on Sumo and return the parent id to upload under.
    ///
    /// Registering an existing case overwrites it. A failure is not an error:
    /// it is logged and the sentinel id `"0"` is returned.
    pub async fn register(&mut self) -> String {
        match self.upload_case_metadata().await {
            Ok(id) => {
                info!("Case registered. SumoID: {}", id);
                self.state = CaseState::Registered(id.clone());

                if !self.register_settle.is_zero() {
                    debug!("Waiting {:?} for the case to become searchable", self.register_settle);
                    tokio::time::sleep(self.register_settle).await;
                }
                id
            }
            Err(reason) => {
                warn!(
                    "Registering case on Sumo failed. File uploads will also fail. {} Case metadata file path: {}",
                    reason,
                    self.case.path().display()
                );
                self.state = CaseState::RegisterFailed;
                UNREGISTERED_PARENT_ID.to_string()
            }
        }
    }

    async fn upload_case_metadata(&self) -> std::result::Result<String, String> {
        let response = self
            .client
            .post("/objects", &self.case.metadata().to_value())
            .await
            .map_err(|e| format!("error details: {}", e))?;

        if !response.is_success() {
            let hint = match response.status {
                401 => " Please verify that you are logged in to Sumo.",
                403 => " Please verify that you have write access to Sumo.",
                _ => "",
            };
            return Err(format!(
                "error details: status {} {}.{}",
                response.status, response.text, hint
            ));
        }

        let body = response.json().map_err(|e| format!("error details: {}", e))?;
        body.get("objectid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "error details: response has no objectid".to_string())
    }

    /// Stage files exported since the last successful cycle.
    ///
    /// A missing manifest is an error. Files without valid metadata are
    /// skipped with a warning. Files staged by an earlier call are replaced,
    /// in-memory records are kept. Returns the number of files staged.
    pub fn add_files(&mut self) -> Result<usize> {
        let manifest = manifest::load_manifest(&self.casepath)?;
        let ledger = manifest::load_ledger(&self.casepath)?;
        let start = selector::select_start_index(&manifest, &ledger);

        self.files.retain(|record| record.path().is_none());

        let mut staged = 0;
        for path in selector::select_files_to_upload(&manifest, start) {
            match FileRecord::from_disk(&path, None) {
                Ok(record) => {
                    info!("File appended: {}", path.display());
                    self.files.push(record);
                    staged += 1;
                }
                Err(e) => warn!("No metadata, skipping file: {}", e),
            }
        }

        self.manifest = manifest;
        Ok(staged)
    }

    /// Stage a record that only exists in memory, such as an aggregation result.
    ///
    /// In-memory records are not part of the export manifest and do not move
    /// the ledger by themselves.
    pub fn add_in_memory(&mut self, content: Bytes, metadata: Metadata) {
        let record = FileRecord::from_bytes(content, metadata);
        info!("In-memory record appended: {}", record.display_path());
        self.files.push(record);
    }

    /// Upload all staged files and advance the ledger when anything succeeded.
    pub async fn upload(&mut self) -> Result<UploadReport> {
        if self.files.is_empty() {
            warn!("No files to upload.");
            return Ok(UploadReport::default());
        }

        let parent_id = self.parent_id().to_string();
        let records = std::mem::take(&mut self.files);
        let from_manifest = records.iter().any(|record| record.path().is_some());
        debug!(count = records.len(), parent_id = %parent_id, "Starting upload");

        let t0 = Instant::now();
        let outcome = self.engine.upload(records, &parent_id).await?;
        let wall_time = t0.elapsed().as_secs_f64();

        if outcome.case_not_found() {
            warn!("Case is not registered on Sumo");
            info!(
                "Case was not found on Sumo. In an FMU workflow the case registration \
                 may have failed or the case was not set up for upload. Outside FMU, \
                 pass --register to register the case before uploading."
            );
        }

        log_issues("rejected", &outcome.rejected, &parent_id);
        log_issues("failed", &outcome.failed, &parent_id);

        let summary = UploadSummary::new(&parent_id, &outcome, wall_time, self.sumo_mode());

        info!("Summary:");
        info!("Total files count: {}", summary.total_files_count);
        info!("OK: {}", summary.ok_files);
        info!("Failed: {}", summary.failed_files);
        info!("Rejected: {}", summary.rejected_files);
        info!("Uploaded: {}", format_bytes(outcome.uploaded_bytes()));
        info!("Wall time: {:.2} sec", wall_time);
        info!("Sumo mode: {}", summary.sumo_mode);
        info!("{}", summary.to_json());

        if from_manifest && !outcome.ok.is_empty() {
            self.update_ledger();
        }

        Ok(UploadReport {
            outcome,
            summary: Some(summary),
        })
    }

    /// Append a checkpoint for the manifest as loaded by `add_files`.
    fn update_ledger(&self) {
        let Some(entry) = LedgerEntry::for_manifest_tail(&self.manifest) else {
            return;
        };

        match manifest::append_ledger(&self.casepath, entry.clone()) {
            Ok(_) => info!(
                "Sumo log {} updated with new entry: index {}, timestamp {}",
                manifest::ledger_path(&self.casepath).display(),
                entry.last_index_manifest.unwrap_or_default(),
                entry.timestamp.as_deref().unwrap_or("<none>")
            ),
            Err(e) => warn!("Failed to update upload ledger: {}", e),
        }
    }
}

fn log_issues(kind: &str, results: &[UploadResult], parent_id: &str) {
    if results.is_empty() {
        return;
    }

    info!("{} files {} by Sumo. First {} {} files:", results.len(), kind, LOGGED_ISSUES, kind);
    for result in results.iter().take(LOGGED_ISSUES) {
        info!("Filepath: {}", result.blob_file_path);
        info!(
            "Metadata: [{:?}] {}",
            result.metadata.status_code,
            result.metadata.text.as_deref().unwrap_or_default()
        );
        info!(
            "Blob: [{:?}] {}",
            result.blob.status_code,
            result.blob.text.as_deref().unwrap_or_default()
        );
        warn!("{}", result.issue_message(parent_id));
    }
}
