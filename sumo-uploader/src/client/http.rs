//! `reqwest`-backed Sumo client.

use crate::client::{SumoClient, SumoResponse};
use crate::config::SumoConfig;
use crate::utils::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

pub struct HttpSumoClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSumoClient {
    pub fn new(config: &SumoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("sumo-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<SumoResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(status, "Sumo response");
        Ok(SumoResponse::new(status, text))
    }
}

#[async_trait]
impl SumoClient for HttpSumoClient {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<SumoResponse> {
        let request = self.authorized(self.http.get(self.url(path)).query(query));
        self.send(request).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<SumoResponse> {
        let request = self.authorized(self.http.post(self.url(path)).json(body));
        self.send(request).await
    }

    async fn delete(&self, path: &str) -> Result<SumoResponse> {
        let request = self.authorized(self.http.delete(self.url(path)));
        self.send(request).await
    }

    async fn put_blob(&self, url: &str, blob: Bytes) -> Result<SumoResponse> {
        // Blob URLs carry their own SAS credentials.
        let request = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("content-type", "application/octet-stream")
            .body(blob);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes as AxumBytes;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::{Json, Router};
    use serde_json::json;

    /// Echo every request back as JSON; paths containing "missing" answer 404.
    async fn echo(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: AxumBytes,
    ) -> (StatusCode, Json<Value>) {
        let status = if uri.path().contains("missing") {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        (
            status,
            Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "authorization": header("authorization"),
                "blob_type": header("x-ms-blob-type"),
                "body": String::from_utf8_lossy(&body),
            })),
        )
    }

    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(echo);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(server: &str, token: Option<&str>) -> HttpSumoClient {
        let config = SumoConfig {
            env: "localhost".to_string(),
            url: Some(format!("{}/api/v1", server)),
            token: token.map(str::to_string),
            timeout_secs: 5,
        };
        HttpSumoClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_post_sends_json_with_bearer_token() {
        let server = spawn_server().await;
        let client = client_for(&server, Some("secret"));

        let resp = client.post("/objects", &json!({"class": "case"})).await.unwrap();

        assert_eq!(resp.status, 200);
        let echoed = resp.json().unwrap();
        assert_eq!(echoed["method"], "POST");
        assert_eq!(echoed["path"], "/api/v1/objects");
        assert_eq!(echoed["authorization"], "Bearer secret");
        let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["class"], "case");
    }

    #[tokio::test]
    async fn test_get_passes_query() {
        let server = spawn_server().await;
        let client = client_for(&server, None);

        let resp = client.get("/search", &[("$query", "class:case")]).await.unwrap();

        let echoed = resp.json().unwrap();
        assert_eq!(echoed["path"], "/api/v1/search");
        assert!(echoed["query"].as_str().unwrap().contains("class"));
        assert_eq!(echoed["authorization"], Value::Null);
    }

    #[tokio::test]
    async fn test_status_is_returned_not_raised() {
        let server = spawn_server().await;
        let client = client_for(&server, None);

        let resp = client.delete("/objects/missing").await.unwrap();

        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_put_blob_uses_absolute_url_without_token() {
        let server = spawn_server().await;
        let client = client_for(&server, Some("secret"));

        let url = format!("{}/blobs/abc?sig=xyz", server);
        let resp = client.put_blob(&url, Bytes::from_static(b"payload")).await.unwrap();

        let echoed = resp.json().unwrap();
        assert_eq!(echoed["method"], "PUT");
        assert_eq!(echoed["path"], "/blobs/abc");
        assert_eq!(echoed["blob_type"], "BlockBlob");
        assert_eq!(echoed["authorization"], Value::Null);
        assert_eq!(echoed["body"], "payload");
    }

    #[tokio::test]
    async fn test_transport_error_is_err() {
        // Nothing listens on port 9 locally.
        let client = client_for("http://127.0.0.1:9", None);
        assert!(client.get("/search", &[]).await.is_err());
    }
}
