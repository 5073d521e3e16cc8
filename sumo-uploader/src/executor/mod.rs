//! Upload engine: uploads a batch of file records under one parent object.
//!
//! A batch runs in two phases. The pre-pass registers aggregate parents and
//! prepares the parameters object. Then every record is uploaded by its own
//! task, with at most `threads` tasks talking to the service at a time.

pub mod manifest;
pub mod prepass;
pub mod result;
pub mod selector;
pub mod task;

use crate::client::SumoClient;
use crate::config::{Config, SumoMode};
use crate::fs::FileRecord;
use crate::transfer::retry::Backoff;
use crate::utils::Result;
use result::{UploadOutcome, UploadResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Knobs for one upload batch.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub threads: usize,
    pub mode: SumoMode,
    pub retries: u32,
    /// Global fmu config, source of access/masterdata for generated metadata
    pub config_path: PathBuf,
    pub parameters_path: PathBuf,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl UploadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threads: config.upload.threads(),
            mode: config.upload.mode,
            retries: config.upload.retries,
            config_path: config.case.config_path.clone(),
            parameters_path: config.case.parameters_path.clone(),
        }
    }
}

pub struct UploadEngine {
    client: Arc<dyn SumoClient>,
    options: UploadOptions,
}

impl UploadEngine {
    pub fn new(client: Arc<dyn SumoClient>, options: UploadOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload all records under `parent_id` and classify every outcome.
    ///
    /// Per-file problems end up in the outcome. The only error is a result
    /// without a status, which aborts the batch.
    pub async fn upload(&self, mut records: Vec<FileRecord>, parent_id: &str) -> Result<UploadOutcome> {
        if let Some(parameters) = prepass::run_prepass(
            self.client.as_ref(),
            &records,
            parent_id,
            &self.options.config_path,
            &self.options.parameters_path,
        )
        .await
        {
            records.push(parameters);
        }

        let threads = self.options.threads.max(1);
        info!(
            "Uploading {} files with {} threads, mode: {}",
            records.len(),
            threads,
            self.options.mode
        );

        let semaphore = Arc::new(Semaphore::new(threads));
        let backoff = Backoff::new(self.options.retries);
        let mut handles = Vec::with_capacity(records.len());

        for record in records {
            let sem = Arc::clone(&semaphore);
            let client = Arc::clone(&self.client);
            let parent_id = parent_id.to_string();
            let mode = self.options.mode;
            let display_path = record.display_path();

            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return UploadResult::task_failed(record.display_path(), format!("Semaphore closed: {}", e))
                    }
                };
                task::upload_with_retry(client.as_ref(), record, &parent_id, backoff, mode).await
            });

            handles.push((display_path, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (display_path, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("File upload task panicked: {}: {}", display_path, e);
                    results.push(UploadResult::task_failed(display_path, e.to_string()));
                }
            }
        }

        UploadOutcome::classify(results)
    }
}
