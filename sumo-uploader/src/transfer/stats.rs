//! Upload timing statistics.
//!
//! Latencies of successful uploads are summarised per phase (metadata post and
//! blob upload) so slow service periods are visible in the upload summary.

use serde::Serialize;

/// mean/max/min/sample standard deviation over a set of latencies (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub std: f64,
}

impl TimingStats {
    /// `None` for an empty sample. The standard deviation of a single sample is 0.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let std = if samples.len() > 1 {
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        Some(Self { mean, max, min, std })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseStats {
    pub upload_time: TimingStats,
}

/// Statistics for both upload phases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UploadStatistics {
    pub blob: PhaseStats,
    pub metadata: PhaseStats,
}

impl UploadStatistics {
    pub fn from_samples(blob_times: &[f64], metadata_times: &[f64]) -> Option<Self> {
        Some(Self {
            blob: PhaseStats {
                upload_time: TimingStats::from_samples(blob_times)?,
            },
            metadata: PhaseStats {
                upload_time: TimingStats::from_samples(metadata_times)?,
            },
        })
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
