//! A data file and its metadata document, ready for upload.
//!
//! On disk a record is a file pair: the data file and a hidden YAML companion
//! `.<basename>.yml` in the same directory.

use crate::fs::metadata::{Metadata, SumoBlock};
use crate::utils::{Result, UploaderError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use md5::{Digest, Md5};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Base64-encoded MD5 digest of a byte payload.
pub fn content_md5(content: &[u8]) -> String {
    STANDARD.encode(Md5::digest(content))
}

/// Derive the companion metadata path: `dir/file.gri` -> `dir/.file.gri.yml`.
pub fn metadata_path_for(path: &Path) -> PathBuf {
    let basename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.yml", basename))
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path of the data file (None for in-memory records)
    path: Option<PathBuf>,

    /// Path of the metadata companion (None for in-memory records)
    metadata_path: Option<PathBuf>,

    metadata: Metadata,

    content: Bytes,

    /// Remote object id, set after the metadata upload
    pub sumo_object_id: Option<String>,

    /// Remote parent id the object was uploaded under
    pub sumo_parent_id: Option<String>,
}

impl FileRecord {
    /// Read a data file and its metadata from disk.
    ///
    /// Fails with `InvalidMetadata` when the companion does not exist or does
    /// not parse as a YAML mapping.
    pub fn from_disk(path: &Path, metadata_path: Option<&Path>) -> Result<Self> {
        let metadata_path = metadata_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| metadata_path_for(path));
        let metadata = Metadata::from_yaml_file(&metadata_path)?;

        let path = std::path::absolute(path)?;
        let content = Bytes::from(std::fs::read(&path)?);

        Ok(Self::build(Some(path), Some(metadata_path), metadata, content))
    }

    /// Build a record from an in-memory payload, e.g. generated parameters.
    pub fn from_bytes(content: Bytes, metadata: Metadata) -> Self {
        let mut record = Self::build(None, None, metadata, content);
        let md5 = record.blob_md5().to_string();
        record.metadata.set_path(&["file", "absolute_path"], Value::String(String::new()));
        record.metadata.set_path(&["file", "checksum_md5"], Value::String(md5));
        record
    }

    fn build(
        path: Option<PathBuf>,
        metadata_path: Option<PathBuf>,
        mut metadata: Metadata,
        content: Bytes,
    ) -> Self {
        metadata.set_sumo_block(&SumoBlock {
            blob_size: content.len() as u64,
            blob_md5: content_md5(&content),
        });

        Self {
            path,
            metadata_path,
            metadata,
            content,
            sumo_object_id: None,
            sumo_parent_id: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }

    /// Path used in logs and results; in-memory records are labelled by name.
    pub fn display_path(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => format!(
                "<{}>",
                self.metadata.str_at(&["data", "name"]).unwrap_or("in-memory")
            ),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn blob_md5(&self) -> &str {
        self.metadata
            .str_at(&["_sumo", "blob_md5"])
            .unwrap_or_default()
    }

    /// Delete the data file and its metadata companion (move mode).
    pub fn remove_local_files(&self) -> std::io::Result<()> {
        if let Some(path) = &self.path {
            std::fs::remove_file(path)?;
        }
        if let Some(metadata_path) = &self.metadata_path {
            std::fs::remove_file(metadata_path)?;
        }
        Ok(())
    }
}

impl TryFrom<&Path> for FileRecord {
    type Error = UploaderError;

    fn try_from(path: &Path) -> Result<Self> {
        Self::from_disk(path, None)
    }
}
