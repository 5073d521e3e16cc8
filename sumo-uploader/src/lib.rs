//! Sumo Uploader Library
//!
//! Incremental uploader of exported FMU results to the Sumo object store.

pub mod case;
pub mod client;
pub mod config;
pub mod executor;
pub mod fs;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use case::{CaseRegistry, CaseState, UploadReport};
pub use client::{HttpSumoClient, SumoClient, SumoResponse};
pub use config::{Config, SumoMode};
pub use executor::{UploadEngine, UploadOptions};
pub use utils::errors::UploaderError;
pub type Result<T> = std::result::Result<T, UploaderError>;
