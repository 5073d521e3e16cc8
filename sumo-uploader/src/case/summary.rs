use crate::config::SumoMode;
use crate::executor::result::UploadOutcome;
use crate::transfer::stats::UploadStatistics;
use serde::Serialize;

/// Summary of one upload cycle, logged as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub parent_id: String,
    pub total_files_count: usize,
    pub ok_files: usize,
    pub failed_files: usize,
    pub rejected_files: usize,
    pub wall_time_seconds: f64,
    pub upload_statistics: Option<UploadStatistics>,
    pub sumo_mode: SumoMode,
}

#[derive(Serialize)]
struct Envelope<'a> {
    upload_summary: &'a UploadSummary,
}

impl UploadSummary {
    pub fn new(parent_id: &str, outcome: &UploadOutcome, wall_time_seconds: f64, sumo_mode: SumoMode) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            total_files_count: outcome.total(),
            ok_files: outcome.ok.len(),
            failed_files: outcome.failed.len(),
            rejected_files: outcome.rejected.len(),
            wall_time_seconds,
            upload_statistics: outcome.statistics(),
            sumo_mode,
        }
    }

    /// `{"upload_summary": {...}}`
    pub fn to_json(&self) -> String {
        serde_json::to_string(&Envelope { upload_summary: self }).unwrap_or_default()
    }
}
