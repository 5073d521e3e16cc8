//! Utility modules for the uploader.

pub mod errors;
pub mod logger;

pub use errors::{Result, UploaderError};
