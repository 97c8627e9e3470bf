// Test client driving a pipeline in-process

use girder_core::{Application, Error, HttpMethod, HttpRequest, HttpResponse, Pipeline, Result};
use std::collections::HashMap;

/// Sends requests straight into a [`Pipeline`], no sockets involved.
#[derive(Clone)]
pub struct TestClient {
    pipeline: Pipeline,
    default_headers: HashMap<String, String>,
}

impl TestClient {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            default_headers: HashMap::new(),
        }
    }

    pub fn for_app(app: &Application) -> Self {
        Self::new(app.pipeline().clone())
    }

    /// Send `name: value` with every request unless the request sets it.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, path).body(body))
            .await
    }

    pub async fn put(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PUT, path).body(body))
            .await
    }

    pub async fn patch(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PATCH, path).body(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::DELETE, path))
            .await
    }

    pub async fn send(&self, request: TestRequestBuilder) -> TestResponse {
        self.execute(request.build()).await
    }

    /// Run a hand-built request.
    pub async fn execute(&self, mut request: HttpRequest) -> TestResponse {
        for (name, value) in &self.default_headers {
            if request.header(name).is_none() {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        TestResponse::new(self.pipeline.execute(request).await)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    query: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: impl Into<MethodName>, path: &str) -> Self {
        Self {
            method: method.into().0,
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serialize `data` as the body and set the JSON content type.
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self> {
        self.body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Append a query parameter; the value is percent-encoded.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let mut path = self.path;
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str(&pairs.join("&"));
        }

        let mut request = HttpRequest::new(self.method, path).with_body(self.body);
        request.headers = self.headers;
        request
    }
}

/// A request method, from [`HttpMethod`] or any custom verb.
pub struct MethodName(String);

impl From<HttpMethod> for MethodName {
    fn from(method: HttpMethod) -> Self {
        MethodName(method.as_str().to_string())
    }
}

impl From<&str> for MethodName {
    fn from(method: &str) -> Self {
        MethodName(method.to_ascii_uppercase())
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    response: HttpResponse,
}

impl TestResponse {
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }

    /// Body as UTF-8, lossy
    pub fn body_string(&self) -> String {
        self.response.body_string()
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.response.body)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Case-insensitive header lookup
    pub fn header(&self, key: &str) -> Option<&String> {
        self.response.header(key)
    }

    /// The error the pipeline converted into this response, if any.
    pub fn error(&self) -> Option<&Error> {
        self.response.error.as_deref()
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn into_inner(self) -> HttpResponse {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::pipeline::FnEndpoint;

    fn echo_pipeline() -> Pipeline {
        Pipeline::build(
            Vec::new(),
            FnEndpoint::new(|req: HttpRequest| async move {
                let auth = req.header("authorization").cloned().unwrap_or_default();
                Ok(HttpResponse::ok()
                    .with_text(format!("{} {} {}", req.method, req.path, auth)))
            }),
        )
    }

    #[test]
    fn test_request_builder_query_encoding() {
        let request = TestRequestBuilder::new(HttpMethod::GET, "/search")
            .query("q", "rust lang")
            .query("page", "2")
            .build();
        assert_eq!(request.path, "/search?q=rust%20lang&page=2");
    }

    #[test]
    fn test_request_builder_json() {
        let request = TestRequestBuilder::new("post", "/items")
            .json(&serde_json::json!({"name": "bolt"}))
            .unwrap()
            .build();
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.header("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_default_headers_applied() {
        let client = TestClient::new(echo_pipeline()).with_default_header("Authorization", "t0k");
        let response = client.delete("/things/1").await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.body_string(), "DELETE /things/1 t0k");

        let explicit = client
            .send(TestRequestBuilder::new(HttpMethod::GET, "/").header("authorization", "mine"))
            .await;
        assert_eq!(explicit.body_string(), "GET / mine");
    }
}
