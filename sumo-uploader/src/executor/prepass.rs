//! Work done once per batch before the fan-out: aggregate parents for the
//! realization and the synthetic parameters object.

use crate::client::{object_path, SumoClient};
use crate::fs::metadata::SUMO_KEY;
use crate::fs::{FileRecord, Metadata};
use crate::utils::{Result, UploaderError};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Keys copied from the global fmu config into generated metadata.
const GLOBAL_CONFIG_KEYS: &[&str] = &["model", "masterdata", "access"];

/// Run the pre-pass on the first record that belongs to a realization.
///
/// Failures never abort the batch. Returns the parameters record to append,
/// if one has to be uploaded.
pub async fn run_prepass(
    client: &dyn SumoClient,
    records: &[FileRecord],
    parent_id: &str,
    config_path: &Path,
    parameters_path: &Path,
) -> Option<FileRecord> {
    let base = records
        .iter()
        .map(FileRecord::metadata)
        .find(|metadata| metadata.realization_uuid().is_some())?;

    if let Err(e) = ensure_aggregates(client, base).await {
        error!("Failed to upload realization and ensemble objects: {}", e);
    }

    match build_parameters_record(client, base, parent_id, config_path, parameters_path).await {
        Ok(record) => record,
        Err(e) => {
            error!("Failed to prepare parameters for upload: {}", e);
            None
        }
    }
}

/// Make sure the realization and its ensemble exist remotely.
///
/// Both are searched by id in one request. When the realization is missing it
/// is created under the case, preceded by the ensemble if that is missing too.
pub async fn ensure_aggregates(client: &dyn SumoClient, base: &Metadata) -> Result<()> {
    let case_uuid = base
        .case_uuid()
        .ok_or_else(|| UploaderError::MissingField("fmu.case.uuid".into()))?;
    let realization_uuid = base
        .realization_uuid()
        .ok_or_else(|| UploaderError::MissingField("fmu.realization.uuid".into()))?;
    let ensemble = base.ensemble();

    let mut ids = vec![realization_uuid];
    if let Some((_, uuid)) = ensemble {
        ids.push(uuid);
    }

    let body = json!({
        "query": {"ids": {"values": ids}},
        "_source": ["class"],
    });
    let hits = client.post("/search", &body).await?.error_for_status()?.json()?;
    let classes: Vec<&str> = hits
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.pointer("/_source/class").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if classes.contains(&"realization") {
        debug!(realization_uuid, "Realization already registered");
        return Ok(());
    }

    let realization = aggregate_metadata(base, "realization");

    if let Some((class, uuid)) = ensemble {
        if !classes.contains(&class) {
            let mut aggregate = realization.clone();
            aggregate.remove_path(&["fmu", "realization"]);
            aggregate.insert("class", Value::String(class.to_string()));
            aggregate.set_path(&["fmu", "context", "stage"], Value::String(class.to_string()));

            client
                .post(&object_path(case_uuid), &aggregate.to_value())
                .await?
                .error_for_status()?;
            info!("Registered {} {}", class, uuid);
        }
    }

    client
        .post(&object_path(case_uuid), &realization.to_value())
        .await?
        .error_for_status()?;
    info!("Registered realization {}", realization_uuid);

    Ok(())
}

/// Metadata for an aggregate object, derived from one of its children.
fn aggregate_metadata(base: &Metadata, class: &str) -> Metadata {
    let mut metadata = base.clone();
    for key in ["data", "file", "display", SUMO_KEY] {
        metadata.remove(key);
    }
    metadata.insert("class", Value::String(class.to_string()));
    metadata.set_path(&["fmu", "context", "stage"], Value::String(class.to_string()));
    metadata
}

/// Build the parameters record for the realization of `base`.
///
/// Returns `None` when the config or parameters file is missing, or when an
/// identical parameters object already exists for the case and realization.
pub async fn build_parameters_record(
    client: &dyn SumoClient,
    base: &Metadata,
    parent_id: &str,
    config_path: &Path,
    parameters_path: &Path,
) -> Result<Option<FileRecord>> {
    let realization_uuid = base
        .realization_uuid()
        .ok_or_else(|| UploaderError::MissingField("fmu.realization.uuid".into()))?;

    info!("Trying to read parameters at {}", parameters_path.display());

    if !config_path.is_file() {
        warn!(
            "No fmu config to read at {}, cannot generate metadata to upload parameters",
            config_path.display()
        );
        return Ok(None);
    }
    let global_config: Value = serde_yaml::from_str(&std::fs::read_to_string(config_path)?)?;

    if !parameters_path.is_file() {
        warn!(
            "No parameters file to read at {}, no file to upload.",
            parameters_path.display()
        );
        return Ok(None);
    }
    let parameters = parse_parameters(&std::fs::read_to_string(parameters_path)?);

    let metadata = parameters_metadata(base, &global_config);
    if !metadata.has_fmu() {
        warn!("No fmu section, parameters upload will fail");
    }

    let content = Bytes::from(serde_json::to_vec(&Value::Object(parameters))?);
    let record = FileRecord::from_bytes(content, metadata);

    let query = format!(
        "fmu.case.uuid:{} AND fmu.realization.uuid:{} AND data.content:parameters AND _sumo.blob_md5:\"{}\"",
        parent_id,
        realization_uuid,
        record.blob_md5()
    );
    let found = client
        .get("/search", &[("$query", query.as_str())])
        .await?
        .error_for_status()?
        .json()?;

    let hits = found
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if hits > 0 {
        info!("Parameters already uploaded");
        return Ok(None);
    }

    info!("Parameters will be uploaded");
    Ok(Some(record))
}

fn parameters_metadata(base: &Metadata, global_config: &Value) -> Metadata {
    let mut metadata = aggregate_metadata(base, "dictionary");
    metadata.set_path(&["fmu", "context", "stage"], Value::String("realization".into()));
    metadata.insert(
        "data",
        json!({
            "content": "parameters",
            "name": "parameters",
            "format": "json",
        }),
    );
    for key in GLOBAL_CONFIG_KEYS {
        if let Some(value) = global_config.get(*key) {
            metadata.insert(key, value.clone());
        }
    }
    metadata
}

/// Parse a `parameters.txt` file: one `KEY VALUE` pair per line.
///
/// Numeric values become numbers. A `GROUP:NAME` key is stored nested under
/// its group.
pub fn parse_parameters(content: &str) -> Map<String, Value> {
    let mut parameters = Map::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        let raw: Vec<&str> = parts.collect();
        let value = parse_value(&raw.join(" "));

        match key.split_once(':') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                let entry = parameters
                    .entry(group.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = entry {
                    map.insert(name.to_string(), value);
                }
            }
            _ => {
                parameters.insert(key.to_string(), value);
            }
        }
    }

    parameters
}

fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::String(raw.to_string()),
    }
}
