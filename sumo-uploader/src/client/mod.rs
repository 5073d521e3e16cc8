//! Remote Sumo service client.
//!
//! The uploader only needs a handful of verbs. Any HTTP status is returned as
//! a `SumoResponse`; `Err` is reserved for transport problems (connect
//! failures, timeouts) where no response exists.

pub mod http;

#[cfg(test)]
pub mod fake;

use crate::utils::{Result, UploaderError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

pub use http::HttpSumoClient;

/// Response from the Sumo service.
#[derive(Debug, Clone)]
pub struct SumoResponse {
    pub status: u16,
    pub text: String,
}

impl SumoResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// 200 or 201
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// A client error that will not go away by asking again.
    ///
    /// 408 Request Timeout and 429 Too Many Requests are transient.
    pub fn is_rejection(&self) -> bool {
        self.is_client_error() && !matches!(self.status, 408 | 429)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Turn a non-success response into an error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(UploaderError::Remote {
                status: self.status,
                text: self.text,
            })
        }
    }
}

/// Operations against the Sumo object store and search index.
#[async_trait]
pub trait SumoClient: Send + Sync + 'static {
    /// GET `path` with query parameters.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<SumoResponse>;

    /// POST a JSON document to `path`.
    async fn post(&self, path: &str, body: &Value) -> Result<SumoResponse>;

    /// DELETE `path`.
    async fn delete(&self, path: &str) -> Result<SumoResponse>;

    /// Upload a blob to the absolute URL handed out by a metadata upload.
    async fn put_blob(&self, url: &str, blob: Bytes) -> Result<SumoResponse>;
}

#[async_trait]
impl<T: SumoClient + ?Sized> SumoClient for Arc<T> {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<SumoResponse> {
        (**self).get(path, query).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<SumoResponse> {
        (**self).post(path, body).await
    }

    async fn delete(&self, path: &str) -> Result<SumoResponse> {
        (**self).delete(path).await
    }

    async fn put_blob(&self, url: &str, blob: Bytes) -> Result<SumoResponse> {
        (**self).put_blob(url, blob).await
    }
}

/// Path of an object (or of the children of an object).
pub fn object_path(object_id: &str) -> String {
    format!("/objects('{}')", object_id)
}
