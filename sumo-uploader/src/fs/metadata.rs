//! Structured metadata documents.
//!
//! Every data file travels with a YAML metadata document. The document is
//! parsed once at the boundary into a JSON mapping and accessed through typed
//! helpers afterwards. The reserved `_sumo` key carries the blob checksum block.

use crate::utils::{Result, UploaderError};
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Reserved key holding the blob size and checksum.
pub const SUMO_KEY: &str = "_sumo";

/// Contents of the reserved `_sumo` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumoBlock {
    pub blob_size: u64,
    pub blob_md5: String,
}

/// A metadata document: always a mapping at the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Accept a parsed value. Anything but a mapping is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        Self::from_value(value).ok_or_else(|| "metadata is not a mapping".to_string())
    }

    /// Parse a YAML metadata file. Missing or unparseable files are `InvalidMetadata`.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(UploaderError::invalid_metadata(path, "metadata file does not exist"));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|reason| UploaderError::invalid_metadata(path, reason))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Look up a nested value, e.g. `["fmu", "case", "uuid"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter().try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Set a nested value, creating intermediate mappings as needed.
    /// Non-mapping intermediates are replaced.
    pub fn set_path(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.0;
        for key in parents {
            let entry = current
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            current = map;
        }
        current.insert(last.to_string(), value);
    }

    /// Remove a nested value. Returns it if it existed.
    pub fn remove_path(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.0;
        for key in parents {
            current = current.get_mut(*key)?.as_object_mut()?;
        }
        current.remove(*last)
    }

    /// Whether the document has an `fmu` section.
    pub fn has_fmu(&self) -> bool {
        self.0.get("fmu").is_some_and(Value::is_object)
    }

    pub fn case_uuid(&self) -> Option<&str> {
        self.str_at(&["fmu", "case", "uuid"])
    }

    pub fn realization_uuid(&self) -> Option<&str> {
        self.str_at(&["fmu", "realization", "uuid"])
    }

    /// The aggregate above the realization: `(class, uuid)`.
    /// `fmu.ensemble` is preferred, `fmu.iteration` is the legacy name.
    pub fn ensemble(&self) -> Option<(&'static str, &str)> {
        if let Some(uuid) = self.str_at(&["fmu", "ensemble", "uuid"]) {
            return Some(("ensemble", uuid));
        }
        self.str_at(&["fmu", "iteration", "uuid"])
            .map(|uuid| ("iteration", uuid))
    }

    pub fn sumo_block(&self) -> Option<SumoBlock> {
        self.0
            .get(SUMO_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Overwrite the reserved `_sumo` block.
    pub fn set_sumo_block(&mut self, block: &SumoBlock) {
        let value = serde_json::json!({
            "blob_size": block.blob_size,
            "blob_md5": block.blob_md5,
        });
        self.0.insert(SUMO_KEY.to_string(), value);
    }

    /// Rewrite every YAML-style timestamp string as ISO-8601, recursively.
    pub fn normalize_datetimes(&mut self) {
        for value in self.0.values_mut() {
            normalize_datetimes(value);
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Walk a value and rewrite timestamp strings in place.
pub fn normalize_datetimes(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(iso) = normalize_timestamp(s) {
                *s = iso;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_datetimes),
        Value::Object(map) => map.values_mut().for_each(normalize_datetimes),
        _ => {}
    }
}

/// Convert a YAML timestamp with a space separator (`2024-03-01 10:15:00`,
/// `2024-03-01 10:15:00.5 +01:00`) into ISO-8601. Strings already in `T` form,
/// plain dates and anything else return `None`.
fn normalize_timestamp(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() < 19 || s.as_bytes().get(10) != Some(&b' ') {
        return None;
    }

    let compact = s.replacen(" +", "+", 1).replacen(" -", "-", 1);
    let zulu = compact.strip_suffix('Z').map(|rest| format!("{}+00:00", rest));
    let candidate = zulu.as_deref().unwrap_or(&compact);

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false));
        }
    }

    NaiveDateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}
