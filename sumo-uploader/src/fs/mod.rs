//! On-disk file pairs and their metadata documents.

pub mod file_record;
pub mod metadata;

pub use file_record::FileRecord;
pub use metadata::Metadata;
