//! Case metadata (`fmu_case.yml`).

use crate::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CaseMetadata {
    path: PathBuf,
    metadata: Metadata,
}

impl CaseMetadata {
    /// Load case metadata. A missing or invalid file leaves the metadata empty
    /// with a warning; registration and uploads then fail remotely.
    pub fn load(path: &Path) -> Self {
        let mut metadata = match Metadata::from_yaml_file(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Could not load case metadata: {}", e);
                Metadata::empty()
            }
        };
        metadata.normalize_datetimes();

        Self {
            path: path.to_path_buf(),
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// `fmu.case.uuid` as written in the file.
    pub fn case_uuid(&self) -> Option<&str> {
        self.metadata.case_uuid()
    }

    /// `fmu.case.uuid` parsed as a UUID.
    pub fn fmu_case_uuid(&self) -> Option<Uuid> {
        let raw = self.case_uuid()?;
        match Uuid::parse_str(raw) {
            Ok(uuid) => Some(uuid),
            Err(e) => {
                warn!("Case uuid {} in {} is not a valid UUID: {}", raw, self.path.display(), e);
                None
            }
        }
    }
}
