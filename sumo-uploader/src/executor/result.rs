//! Per-file upload results and their classification.

use crate::transfer::stats::UploadStatistics;
use crate::utils::{Result, UploaderError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Ok,
    /// The service refused the object, e.g. the parent case does not exist
    Rejected,
    /// Transient or server-side problem
    Failed,
}

/// Outcome of one sub-step (metadata post or blob upload).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseResult {
    pub status_code: Option<u16>,
    pub text: Option<String>,
    /// Seconds
    pub elapsed: Option<f64>,
}

impl PhaseResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(200 | 201))
    }
}

/// Result of uploading one file. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadResult {
    pub status: Option<UploadStatus>,
    pub blob_file_path: String,
    pub blob_file_size: u64,
    pub metadata_file_path: Option<String>,
    pub object_id: Option<String>,
    pub metadata: PhaseResult,
    pub blob: PhaseResult,
}

impl UploadResult {
    pub fn new(blob_file_path: impl Into<String>) -> Self {
        Self {
            blob_file_path: blob_file_path.into(),
            ..Self::default()
        }
    }

    /// Result for an upload task that died before producing its own result.
    pub fn task_failed(blob_file_path: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self::new(blob_file_path);
        result.status = Some(UploadStatus::Failed);
        result.metadata.text = Some(reason.into());
        result
    }

    /// Rejected because the parent case is unknown to the service.
    pub fn is_case_not_found(&self) -> bool {
        self.status == Some(UploadStatus::Rejected) && self.metadata.status_code == Some(404)
    }

    /// Structured message describing an upload problem.
    pub fn issue_message(&self, parent_id: &str) -> String {
        serde_json::json!({
            "upload_issue": {
                "case_uuid": parent_id,
                "filepath": self.blob_file_path,
                "metadata": {
                    "status_code": self.metadata.status_code,
                    "response_text": self.metadata.text,
                },
                "blob": {
                    "status_code": self.blob.status_code,
                    "response_text": self.blob.text,
                },
            }
        })
        .to_string()
    }
}

/// All results of one batch, partitioned by status.
#[derive(Debug, Clone, Default)]
pub struct UploadOutcome {
    pub ok: Vec<UploadResult>,
    pub failed: Vec<UploadResult>,
    pub rejected: Vec<UploadResult>,
}

impl UploadOutcome {
    /// Partition results. A result without a status means the upload code is
    /// broken, so the whole batch is aborted.
    pub fn classify(results: Vec<UploadResult>) -> Result<Self> {
        let mut outcome = Self::default();
        for result in results {
            match result.status {
                Some(UploadStatus::Ok) => outcome.ok.push(result),
                Some(UploadStatus::Rejected) => outcome.rejected.push(result),
                Some(UploadStatus::Failed) => outcome.failed.push(result),
                None => return Err(UploaderError::MissingStatus(result.blob_file_path)),
            }
        }
        Ok(outcome)
    }

    pub fn total(&self) -> usize {
        self.ok.len() + self.failed.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn case_not_found(&self) -> bool {
        self.rejected.iter().any(UploadResult::is_case_not_found)
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.ok.iter().map(|r| r.blob_file_size).sum()
    }

    /// Timing statistics over successful uploads.
    pub fn statistics(&self) -> Option<UploadStatistics> {
        let blob: Vec<f64> = self.ok.iter().filter_map(|r| r.blob.elapsed).collect();
        let metadata: Vec<f64> = self.ok.iter().filter_map(|r| r.metadata.elapsed).collect();
        UploadStatistics::from_samples(&blob, &metadata)
    }
}
