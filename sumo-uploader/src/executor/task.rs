//! One upload attempt for one file: metadata first, then the blob.

use crate::client::{object_path, SumoClient};
use crate::config::SumoMode;
use crate::executor::result::{PhaseResult, UploadResult, UploadStatus};
use crate::fs::FileRecord;
use crate::transfer::retry::Backoff;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Upload a single file to the Sumo service.
///
/// The metadata document is posted under the parent; the response hands out
/// the object id and a blob URL for the payload. A 4xx on the metadata post is
/// a rejection, everything else that goes wrong is a failure. When the blob
/// upload fails the orphaned metadata object is deleted again.
pub async fn upload_file(client: &dyn SumoClient, record: &mut FileRecord, parent_id: &str) -> UploadResult {
    let mut result = UploadResult::new(record.display_path());
    result.blob_file_size = record.size();
    result.metadata_file_path = record.metadata_path().map(|p| p.display().to_string());

    let t0 = Instant::now();
    let response = client
        .post(&object_path(parent_id), &record.metadata().to_value())
        .await;
    let elapsed = t0.elapsed().as_secs_f64();

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            error!("Metadata upload request failed: {}. Error: {}", result.blob_file_path, e);
            result.metadata = PhaseResult {
                status_code: None,
                text: Some(e.to_string()),
                elapsed: Some(elapsed),
            };
            result.status = Some(UploadStatus::Failed);
            return result;
        }
    };

    result.metadata = PhaseResult {
        status_code: Some(response.status),
        text: Some(response.text.clone()),
        elapsed: Some(elapsed),
    };

    if !response.is_success() {
        result.status = Some(if response.is_rejection() {
            UploadStatus::Rejected
        } else {
            UploadStatus::Failed
        });
        debug!(
            status = response.status,
            "Metadata upload refused for {}", result.blob_file_path
        );
        return result;
    }

    let body = response.json().unwrap_or(Value::Null);
    let object_id = body.get("objectid").and_then(Value::as_str).map(str::to_string);
    let blob_url = body.get("blob_url").and_then(Value::as_str).map(str::to_string);

    let (Some(object_id), Some(blob_url)) = (object_id, blob_url) else {
        result.status = Some(UploadStatus::Failed);
        result.blob.text = Some("Metadata response without objectid/blob_url".to_string());
        return result;
    };

    record.sumo_parent_id = Some(parent_id.to_string());
    record.sumo_object_id = Some(object_id.clone());
    result.object_id = Some(object_id.clone());

    let t0 = Instant::now();
    let response = client.put_blob(&blob_url, record.content().clone()).await;
    let elapsed = t0.elapsed().as_secs_f64();

    result.blob = match response {
        Ok(response) => PhaseResult {
            status_code: Some(response.status),
            text: Some(response.text),
            elapsed: Some(elapsed),
        },
        Err(e) => PhaseResult {
            status_code: None,
            text: Some(e.to_string()),
            elapsed: Some(elapsed),
        },
    };

    if result.blob.is_success() {
        result.status = Some(UploadStatus::Ok);
        info!("Uploaded {} bytes: {}", result.blob_file_size, result.blob_file_path);
        return result;
    }

    result.status = Some(UploadStatus::Failed);
    error!(
        "Blob upload failed for {}: {:?} {}",
        result.blob_file_path,
        result.blob.status_code,
        result.blob.text.as_deref().unwrap_or_default()
    );

    match client.delete(&object_path(&object_id)).await {
        Ok(resp) if resp.is_success() => debug!("Deleted orphaned metadata object {}", object_id),
        Ok(resp) => warn!("Failed to delete metadata object {}: status {}", object_id, resp.status),
        Err(e) => warn!("Failed to delete metadata object {}: {}", object_id, e),
    }
    record.sumo_object_id = None;
    result.object_id = None;

    result
}

/// Upload with retries for failed (never rejected) results, then apply the mode.
pub async fn upload_with_retry(
    client: &dyn SumoClient,
    mut record: FileRecord,
    parent_id: &str,
    backoff: Backoff,
    mode: SumoMode,
) -> UploadResult {
    let mut retry = 0;
    let result = loop {
        let result = upload_file(client, &mut record, parent_id).await;
        if result.status != Some(UploadStatus::Failed) {
            break result;
        }
        retry += 1;
        let Some(delay) = backoff.delay(retry) else {
            break result;
        };
        warn!(
            "Upload of {} failed, retry {}/{} in {:?}",
            result.blob_file_path, retry, backoff.retries, delay
        );
        tokio::time::sleep(delay).await;
    };

    if result.status == Some(UploadStatus::Ok) && mode == SumoMode::Move {
        if let Err(e) = record.remove_local_files() {
            warn!("Failed to remove local files for {}: {}", result.blob_file_path, e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeSumo;
    use crate::fs::file_record::metadata_path_for;
    use crate::fs::Metadata;
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    const CASE: &str = "11111111-2222-3333-4444-555555555555";

    fn record(name: &str) -> FileRecord {
        let metadata = Metadata::from_value(json!({
            "class": "surface",
            "fmu": {"case": {"uuid": CASE}},
            "data": {"name": name},
        }))
        .unwrap();
        FileRecord::from_bytes(Bytes::from(name.as_bytes().to_vec()), metadata)
    }

    #[tokio::test]
    async fn test_upload_ok() {
        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;
        let mut rec = record("top");

        let result = upload_file(&fake, &mut rec, CASE).await;

        assert_eq!(result.status, Some(UploadStatus::Ok));
        assert_eq!(result.metadata.status_code, Some(201));
        assert_eq!(result.blob.status_code, Some(201));
        assert!(result.metadata.elapsed.is_some());
        assert!(result.blob.elapsed.is_some());
        assert_eq!(rec.sumo_parent_id.as_deref(), Some(CASE));
        assert!(rec.sumo_object_id.is_some());
        assert_eq!(fake.blob_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_parent_is_rejected() {
        let fake = FakeSumo::new();
        let mut rec = record("top");

        let result = upload_file(&fake, &mut rec, CASE).await;

        assert_eq!(result.status, Some(UploadStatus::Rejected));
        assert!(result.is_case_not_found());
        assert_eq!(result.blob, PhaseResult::default());
    }

    #[tokio::test]
    async fn test_server_error_is_failed() {
        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;
        fake.fake_metadata_status(503).await;
        let mut rec = record("top");

        let result = upload_file(&fake, &mut rec, CASE).await;

        assert_eq!(result.status, Some(UploadStatus::Failed));
        assert_eq!(result.metadata.status_code, Some(503));
    }

    #[tokio::test]
    async fn test_throttling_is_failed_and_retried() {
        let backoff = Backoff {
            retries: 3,
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
        };

        for status in [408, 429] {
            let fake = FakeSumo::new();
            fake.seed_case(CASE).await;
            fake.fake_metadata_status(status).await;

            let result = upload_with_retry(&fake, record("top"), CASE, backoff, SumoMode::Copy).await;

            assert_eq!(result.status, Some(UploadStatus::Failed));
            assert_eq!(result.metadata.status_code, Some(status));
            let posts = fake.calls().await.iter().filter(|c| c.starts_with("POST")).count();
            assert_eq!(posts, 4);
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_failed() {
        let fake = FakeSumo::new();
        fake.fake_unreachable().await;
        let mut rec = record("top");

        let result = upload_file(&fake, &mut rec, CASE).await;

        assert_eq!(result.status, Some(UploadStatus::Failed));
        assert_eq!(result.metadata.status_code, None);
        assert!(result.metadata.text.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_blob_failure_deletes_metadata_object() {
        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;
        fake.fake_fail_blob("broken").await;
        let mut rec = record("broken");

        let result = upload_file(&fake, &mut rec, CASE).await;

        assert_eq!(result.status, Some(UploadStatus::Failed));
        assert_eq!(result.blob.status_code, Some(500));
        assert_eq!(result.object_id, None);
        assert!(fake.objects_of_class("surface").await.is_empty());
        assert!(fake.calls().await.iter().any(|c| c.starts_with("DELETE")));
    }

    #[tokio::test]
    async fn test_retry_repeats_failed_attempts_only() {
        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;
        fake.fake_fail_blob("broken").await;
        let backoff = Backoff {
            retries: 2,
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
        };

        let result = upload_with_retry(&fake, record("broken"), CASE, backoff, SumoMode::Copy).await;
        assert_eq!(result.status, Some(UploadStatus::Failed));
        let puts = fake.calls().await.iter().filter(|c| c.starts_with("PUT")).count();
        assert_eq!(puts, 3);

        let rejecting = FakeSumo::new();
        let result = upload_with_retry(&rejecting, record("top"), CASE, backoff, SumoMode::Copy).await;
        assert_eq!(result.status, Some(UploadStatus::Rejected));
        assert_eq!(rejecting.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_move_mode_removes_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moved.gri");
        std::fs::write(&path, b"payload").unwrap();
        std::fs::write(metadata_path_for(&path), "data:\n  name: moved\n").unwrap();

        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;

        let rec = FileRecord::from_disk(&path, None).unwrap();
        let result = upload_with_retry(&fake, rec, CASE, Backoff::none(), SumoMode::Move).await;

        assert_eq!(result.status, Some(UploadStatus::Ok));
        assert!(!path.exists());
        assert!(!metadata_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_copy_mode_keeps_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kept.gri");
        std::fs::write(&path, b"payload").unwrap();
        std::fs::write(metadata_path_for(&path), "data:\n  name: kept\n").unwrap();

        let fake = FakeSumo::new();
        fake.seed_case(CASE).await;

        let rec = FileRecord::from_disk(&path, None).unwrap();
        let result = upload_with_retry(&fake, rec, CASE, Backoff::none(), SumoMode::Copy).await;

        assert_eq!(result.status, Some(UploadStatus::Ok));
        assert!(path.exists());
    }
}
