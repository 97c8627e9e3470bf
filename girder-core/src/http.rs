// HTTP request and response value types

use crate::di::Scope;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::DELETE,
        HttpMethod::PATCH,
        HttpMethod::HEAD,
        HttpMethod::OPTIONS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::BadRequest(format!("unsupported HTTP method '{}'", s)))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    scope: Option<Scope>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            scope: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::BadRequest(format!("invalid JSON body: {}", e)))
    }

    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Raw query string, if any.
    pub fn query_string(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, query)| query)
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&String> {
        find_header(&self.headers, name)
    }

    /// Parsed method, `None` for methods outside [`HttpMethod`].
    pub fn http_method(&self) -> Option<HttpMethod> {
        self.method.parse().ok()
    }

    /// The resolution scope opened for this request, once dispatch has begun.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub(crate) fn set_scope(&mut self, scope: Scope) {
        self.scope = Some(scope);
    }

    /// Resolve a service in this request's scope.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.scope
            .as_ref()
            .ok_or_else(|| Error::Internal("request has no resolution scope".to_string()))?
            .get::<T>()
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// The error this response was rendered from, if any.
    pub error: Option<Arc<Error>>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            error: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = text.into().into_bytes();
        self.headers.insert(
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Render an error as a JSON response carrying the error itself.
    ///
    /// Server-side (5xx) messages are replaced by a generic text unless
    /// `expose_details` is set.
    pub fn from_error(error: Error, expose_details: bool) -> Self {
        let status = error.status_code();
        let message = if status >= 500 && !expose_details {
            "Internal server error".to_string()
        } else {
            error.to_string()
        };
        let body = serde_json::json!({
            "status": status,
            "error": error.kind(),
            "message": message,
        });

        let mut response = Self::new(status)
            .with_body(body.to_string().into_bytes())
            .with_header("Content-Type", "application/json");
        response.error = Some(Arc::new(error));
        response
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&String> {
        find_header(&self.headers, name)
    }

    /// Body as UTF-8 text, lossy.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a String> {
    headers.get(name).or_else(|| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// JSON response helper
#[derive(Debug)]
pub struct Json<T: Serialize>(pub T);

impl<T: Serialize> Json<T> {
    pub fn into_response(self) -> Result<HttpResponse> {
        HttpResponse::ok().with_json(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::GET);
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::PATCH);
        assert!("BREW".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::DELETE.to_string(), "DELETE");
    }

    #[test]
    fn test_request_path_and_query() {
        let req = HttpRequest::get("/search?q=rust&page=2");
        assert_eq!(req.path_only(), "/search");
        assert_eq!(req.query_string(), Some("q=rust&page=2"));
        assert_eq!(HttpRequest::get("/plain").query_string(), None);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let req = HttpRequest::get("/").with_header("X-Request-Id", "abc");
        assert_eq!(req.header("x-request-id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_request_json_roundtrip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Payload {
            name: String,
        }

        let req = HttpRequest::post("/users")
            .with_json(&Payload {
                name: "Ada".to_string(),
            })
            .unwrap();
        let payload: Payload = req.json().unwrap();
        assert_eq!(payload.name, "Ada");

        let bad = HttpRequest::post("/users").with_body("not json");
        assert!(matches!(bad.json::<Payload>(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_resolve_without_scope_fails() {
        let req = HttpRequest::get("/");
        assert!(matches!(req.resolve::<u32>(), Err(Error::Internal(_))));
    }

    #[test]
    fn test_error_response_hides_server_details() {
        let response = HttpResponse::from_error(Error::Internal("db password wrong".into()), false);
        assert_eq!(response.status, 500);
        assert!(!response.body_string().contains("password"));
        assert!(response.error.is_some());

        let response = HttpResponse::from_error(
            Error::RouteNotFound {
                method: "GET".into(),
                path: "/nope".into(),
            },
            false,
        );
        assert_eq!(response.status, 404);
        assert!(response.body_string().contains("/nope"));
        assert_eq!(
            response.header("content-type").map(String::as_str),
            Some("application/json")
        );
    }
}
