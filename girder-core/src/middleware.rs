// Middleware system for request/response processing

use crate::handler::BoxFuture;
use crate::logging::{debug, error, info, trace};
use crate::pipeline::Endpoint;
use crate::{Error, HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Type alias for the next step in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send>;

/// Middleware wraps the rest of the chain.
///
/// An implementation may change the request before calling `next`, change
/// the response after it, return early without calling `next` at all, or
/// fail with an error.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse>;
}

/// Ordered middlewares in front of a terminal endpoint.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the end of the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.push(Arc::new(middleware));
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        Arc::make_mut(&mut self.middlewares).push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the chain, ending in `terminal`.
    pub async fn apply(&self, req: HttpRequest, terminal: Arc<dyn Endpoint>) -> Result<HttpResponse> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, terminal).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        terminal: Arc<dyn Endpoint>,
    ) -> BoxFuture<Result<HttpResponse>> {
        match self.middlewares.get(index) {
            None => {
                trace!("Middleware chain complete, calling endpoint");
                Box::pin(async move { terminal.call(req).await })
            }
            Some(middleware) => {
                let middleware = middleware.clone();
                let chain = self.clone();
                trace!(middleware_index = index, "Executing middleware");
                Box::pin(async move {
                    middleware
                        .handle(
                            req,
                            Box::new(move |req| chain.execute_from(index + 1, req, terminal)),
                        )
                        .await
                })
            }
        }
    }
}

impl From<Vec<Arc<dyn Middleware>>> for MiddlewareChain {
    fn from(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }
}

// ========== Closure adapter ==========

/// Middleware built from a closure; see [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Turn `async fn(req, next) -> Result<HttpResponse>` into a middleware.
///
/// ```
/// use girder_core::middleware::from_fn;
/// use girder_core::HttpResponse;
///
/// let deny_all = from_fn(|_req, _next| async { Ok(HttpResponse::new(403)) });
/// let stamp = from_fn(|req, next| async move {
///     let response = next(req).await?;
///     Ok(response.with_header("x-served-by", "girder"))
/// });
/// # let _ = (deny_all, stamp);
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse>> + Send,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse>> + Send,
{
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        (self.f)(req, next).await
    }
}

// ========== Built-in Middleware ==========

/// Logs every request and its outcome through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggerMiddleware {
    log_body: bool,
}

impl LoggerMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log the request body size.
    pub fn with_body(mut self) -> Self {
        self.log_body = true;
        self
    }
}

#[async_trait]
impl Middleware for LoggerMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let start = Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();

        if self.log_body && !req.body.is_empty() {
            info!(method = %method, path = %path, body_bytes = req.body.len(), "HTTP request received");
        } else {
            info!(method = %method, path = %path, "HTTP request received");
        }

        let result = next(req).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => {
                info!(
                    method = %method,
                    path = %path,
                    status = response.status,
                    duration_ms = duration_ms,
                    "HTTP response sent"
                );
            }
            Err(err) => {
                error!(
                    method = %method,
                    path = %path,
                    duration_ms = duration_ms,
                    error = %err,
                    "HTTP request failed"
                );
            }
        }

        result
    }
}

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensures every request and response carries an `x-request-id` header.
///
/// An incoming id is kept; otherwise a UUID v4 is generated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let request_id = req
            .header(REQUEST_ID_HEADER)
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        req.headers
            .retain(|name, _| !name.eq_ignore_ascii_case(REQUEST_ID_HEADER));
        req.headers
            .insert(REQUEST_ID_HEADER.to_string(), request_id.clone());

        let mut response = next(req).await?;
        response
            .headers
            .insert(REQUEST_ID_HEADER.to_string(), request_id);
        Ok(response)
    }
}

/// Fails the request with [`Error::RequestTimeout`] (408) when the rest of
/// the chain takes longer than the configured duration.
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    duration: Duration,
}

impl TimeoutMiddleware {
    pub fn new(seconds: u64) -> Self {
        Self::from_duration(Duration::from_secs(seconds))
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::from_duration(Duration::from_millis(ms))
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        match tokio::time::timeout(self.duration, next(req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::RequestTimeout(format!(
                "Request exceeded timeout of {:?}",
                self.duration
            ))),
        }
    }
}
