use crate::client::{SumoClient, SumoResponse};
use crate::utils::{Result, UploaderError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

const BLOB_PREFIX: &str = "fake://blob/";

/// A stored object: its parent and its metadata.
#[derive(Debug, Clone)]
pub struct FakeObject {
    pub parent: Option<String>,
    pub metadata: Value,
}

/// `FakeSumo` is an in-memory implementation of the `SumoClient` trait for testing purposes.
/// Cases must be registered (or seeded) before children can be uploaded under them,
/// mirroring the 404 the real service gives for an unknown parent.
#[derive(Clone, Default)]
pub struct FakeSumo {
    objects: Arc<Mutex<HashMap<String, FakeObject>>>,
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_blobs: Arc<Mutex<HashSet<String>>>,
    metadata_status: Arc<Mutex<Option<u16>>>,
    unreachable: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl FakeSumo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing case object.
    pub async fn seed_case(&self, case_uuid: &str) {
        let mut objects = self.objects.lock().await;
        objects.insert(
            case_uuid.to_string(),
            FakeObject {
                parent: None,
                metadata: json!({"class": "case", "fmu": {"case": {"uuid": case_uuid}}}),
            },
        );
    }

    /// Blob uploads for objects whose `data.name` matches fail with 500.
    pub async fn fake_fail_blob(&self, data_name: &str) {
        self.fail_blobs.lock().await.insert(data_name.to_string());
    }

    /// Every child metadata upload answers with this status.
    pub async fn fake_metadata_status(&self, status: u16) {
        *self.metadata_status.lock().await = Some(status);
    }

    /// Every call fails at the transport level.
    pub async fn fake_unreachable(&self) {
        *self.unreachable.lock().await = true;
    }

    pub async fn objects(&self) -> HashMap<String, FakeObject> {
        self.objects.lock().await.clone()
    }

    /// Stored objects of a given class.
    pub async fn objects_of_class(&self, class: &str) -> Vec<FakeObject> {
        self.objects
            .lock()
            .await
            .values()
            .filter(|o| o.metadata.get("class").and_then(Value::as_str) == Some(class))
            .cloned()
            .collect()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.lock().await.len()
    }

    /// Calls made so far, as "METHOD path".
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: String) -> Result<()> {
        self.calls.lock().await.push(call);
        if *self.unreachable.lock().await {
            return Err(UploaderError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }

    /// Ids follow the real service: aggregates and cases reuse their fmu uuid.
    fn object_id_for(metadata: &Value) -> String {
        let fmu = |section: &str| {
            metadata
                .pointer(&format!("/fmu/{}/uuid", section))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let id = match metadata.get("class").and_then(Value::as_str) {
            Some("case") => fmu("case"),
            Some("realization") => fmu("realization"),
            Some("ensemble") => fmu("ensemble"),
            Some("iteration") => fmu("iteration"),
            _ => None,
        };
        id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    fn parent_from_path(path: &str) -> Option<&str> {
        path.strip_prefix("/objects('")?.strip_suffix("')")
    }

    async fn search_ids(&self, body: &Value) -> Value {
        let ids: Vec<&str> = body
            .pointer("/query/ids/values")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let objects = self.objects.lock().await;
        let hits: Vec<Value> = ids
            .iter()
            .filter_map(|id| objects.get(*id).map(|o| (id, o)))
            .map(|(id, o)| {
                json!({"_id": id, "_source": {"class": o.metadata.get("class").cloned().unwrap_or(Value::Null)}})
            })
            .collect();
        json!({"hits": {"total": {"value": hits.len()}, "hits": hits}})
    }

    /// Counts parameters objects whose case, realization and checksum all
    /// appear in the query string.
    async fn search_query(&self, query: &str) -> Value {
        let objects = self.objects.lock().await;
        let count = objects
            .values()
            .filter(|o| o.metadata.pointer("/data/content").and_then(Value::as_str) == Some("parameters"))
            .filter(|o| {
                ["/fmu/case/uuid", "/fmu/realization/uuid", "/_sumo/blob_md5"]
                    .iter()
                    .all(|p| {
                        o.metadata
                            .pointer(p)
                            .and_then(Value::as_str)
                            .is_some_and(|v| query.contains(v))
                    })
            })
            .count();
        json!({"hits": {"total": {"value": count}, "hits": []}})
    }
}

#[async_trait]
impl SumoClient for FakeSumo {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<SumoResponse> {
        self.record(format!("GET {}", path)).await?;
        if path == "/search" {
            let q = query
                .iter()
                .find(|(k, _)| *k == "$query")
                .map(|(_, v)| *v)
                .unwrap_or_default();
            return Ok(SumoResponse::json_body(200, &self.search_query(q).await));
        }
        Ok(SumoResponse::new(404, "Not found"))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<SumoResponse> {
        self.record(format!("POST {}", path)).await?;

        if path == "/search" {
            return Ok(SumoResponse::json_body(200, &self.search_ids(body).await));
        }

        if path == "/objects" {
            let id = Self::object_id_for(body);
            self.objects.lock().await.insert(
                id.clone(),
                FakeObject { parent: None, metadata: body.clone() },
            );
            return Ok(SumoResponse::json_body(200, &json!({"objectid": id})));
        }

        let Some(parent) = Self::parent_from_path(path) else {
            return Ok(SumoResponse::new(404, "Not found"));
        };

        let class = body.get("class").and_then(Value::as_str).unwrap_or_default();
        let is_aggregate = matches!(class, "realization" | "ensemble" | "iteration");
        if !is_aggregate {
            if let Some(status) = *self.metadata_status.lock().await {
                return Ok(SumoResponse::new(status, format!("Injected status {}", status)));
            }
        }

        let mut objects = self.objects.lock().await;
        if !objects.contains_key(parent) {
            return Ok(SumoResponse::new(404, format!("Parent {} not found", parent)));
        }

        let id = Self::object_id_for(body);
        objects.insert(
            id.clone(),
            FakeObject { parent: Some(parent.to_string()), metadata: body.clone() },
        );
        Ok(SumoResponse::json_body(
            201,
            &json!({"objectid": id, "blob_url": format!("{}{}", BLOB_PREFIX, id)}),
        ))
    }

    async fn delete(&self, path: &str) -> Result<SumoResponse> {
        self.record(format!("DELETE {}", path)).await?;
        let Some(id) = Self::parent_from_path(path) else {
            return Ok(SumoResponse::new(404, "Not found"));
        };
        match self.objects.lock().await.remove(id) {
            Some(_) => Ok(SumoResponse::new(200, "Deleted")),
            None => Ok(SumoResponse::new(404, "Not found")),
        }
    }

    async fn put_blob(&self, url: &str, blob: Bytes) -> Result<SumoResponse> {
        self.record(format!("PUT {}", url)).await?;
        let Some(id) = url.strip_prefix(BLOB_PREFIX) else {
            return Ok(SumoResponse::new(404, "Unknown blob url"));
        };

        let name = {
            let objects = self.objects.lock().await;
            objects
                .get(id)
                .and_then(|o| o.metadata.pointer("/data/name").and_then(Value::as_str))
                .map(str::to_string)
        };
        if let Some(name) = name {
            if self.fail_blobs.lock().await.contains(&name) {
                return Ok(SumoResponse::new(500, "Injected blob failure"));
            }
        }

        self.blobs.lock().await.insert(id.to_string(), blob);
        Ok(SumoResponse::new(201, "Created"))
    }
}
