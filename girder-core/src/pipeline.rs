// Request pipeline: global middleware around the route dispatcher

use crate::di::{Container, Scope};
use crate::handler::{HandlerFn, HandlerRef};
use crate::logging::{debug, error, trace};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::routing::{Router, parse_query_string};
use crate::{Error, HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// The innermost step of a middleware chain.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// An endpoint backed by a handler function.
#[derive(Clone)]
pub struct FnEndpoint(HandlerFn);

impl FnEndpoint {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        Self(Arc::new(move |req| Box::pin(f(req))))
    }
}

#[async_trait]
impl Endpoint for FnEndpoint {
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse> {
        (self.0)(req).await
    }
}

/// Routes a request and runs the matched handler.
///
/// For each request: match the route, copy path and query parameters into
/// the request, attach a resolution scope (reusing one an earlier middleware
/// attached), run the route's own middlewares, then the handler.
pub struct Dispatcher {
    router: Arc<Router>,
    container: Container,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, container: Container) -> Self {
        Self { router, container }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

#[async_trait]
impl Endpoint for Dispatcher {
    async fn call(&self, mut req: HttpRequest) -> Result<HttpResponse> {
        let matched = self.router.match_route(&req.method, &req.path)?;

        if let Some(query) = req.query_string().map(parse_query_string) {
            req.query_params.extend(query);
        }
        req.path_params.extend(matched.params);

        let scope = match req.scope() {
            Some(scope) => scope.clone(),
            None => {
                let scope = self.container.create_scope();
                req.set_scope(scope.clone());
                scope
            }
        };
        trace!(scope = %scope.id(), route = %matched.route.describe(), "Dispatching request");

        let route = matched.route;
        if route.middlewares().is_empty() {
            return route.handler().invoke(&scope, req).await;
        }

        let chain = MiddlewareChain::from(route.middlewares().to_vec());
        let terminal = Arc::new(HandlerEndpoint {
            handler: route.handler().clone(),
            scope,
        });
        chain.apply(req, terminal).await
    }
}

/// Terminal step of a route-level chain.
struct HandlerEndpoint {
    handler: HandlerRef,
    scope: Scope,
}

#[async_trait]
impl Endpoint for HandlerEndpoint {
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse> {
        self.handler.invoke(&self.scope, req).await
    }
}

/// Global middlewares composed with a terminal endpoint.
///
/// [`execute`](Pipeline::execute) never fails: every error is turned into a
/// response carrying the error in [`HttpResponse::error`].
#[derive(Clone)]
pub struct Pipeline {
    chain: MiddlewareChain,
    terminal: Arc<dyn Endpoint>,
    expose_error_details: bool,
}

impl Pipeline {
    pub fn build(middlewares: Vec<Arc<dyn Middleware>>, terminal: impl Endpoint + 'static) -> Self {
        Self::from_parts(MiddlewareChain::from(middlewares), Arc::new(terminal))
    }

    pub fn from_parts(chain: MiddlewareChain, terminal: Arc<dyn Endpoint>) -> Self {
        Self {
            chain,
            terminal,
            expose_error_details: false,
        }
    }

    /// Include server-side error messages in 5xx response bodies.
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    pub fn middleware_count(&self) -> usize {
        self.chain.len()
    }

    /// Run one request through the pipeline.
    pub async fn execute(&self, req: HttpRequest) -> HttpResponse {
        let method = req.method.clone();
        let path = req.path.clone();

        match self.chain.apply(req, self.terminal.clone()).await {
            Ok(response) => response,
            Err(err) => self.error_response(err, &method, &path),
        }
    }

    fn error_response(&self, err: Error, method: &str, path: &str) -> HttpResponse {
        if err.is_server_error() {
            error!(
                method = method,
                path = path,
                kind = err.kind(),
                error = %err,
                "Request failed"
            );
        } else {
            debug!(
                method = method,
                path = path,
                status = err.status_code(),
                error = %err,
                "Request rejected"
            );
        }
        HttpResponse::from_error(err, self.expose_error_details)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.chain.len())
            .field("expose_error_details", &self.expose_error_details)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use crate::middleware::{Next, from_fn};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn greet_router() -> Arc<Router> {
        let router = Router::new();
        router
            .add_route(
                HttpMethod::GET,
                "/greet/{name}",
                HandlerRef::from_fn(|req: HttpRequest| async move {
                    let name = req.param("name").cloned().unwrap_or_default();
                    let lang = req.query("lang").cloned().unwrap_or_default();
                    Ok(HttpResponse::ok().with_text(format!("Hello, {}! {}", name, lang)))
                }),
                0,
                Vec::new(),
            )
            .unwrap();
        Arc::new(router)
    }

    #[tokio::test]
    async fn test_dispatch_end_to_end() {
        let pipeline = Pipeline::build(
            Vec::new(),
            Dispatcher::new(greet_router(), Container::new()),
        );

        let response = pipeline
            .execute(HttpRequest::get("/greet/Ada?lang=en"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_string(), "Hello, Ada! en");

        let response = pipeline.execute(HttpRequest::post("/greet/Ada")).await;
        assert_eq!(response.status, 404);
        assert!(matches!(
            response.error.as_deref(),
            Some(Error::RouteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_terminal() {
        let reached = Arc::new(AtomicBool::new(false));
        let flag = reached.clone();
        let terminal = FnEndpoint::new(move |_req| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(HttpResponse::ok())
            }
        });
        let deny: Arc<dyn Middleware> =
            Arc::new(from_fn(|_req, _next: Next| async { Ok(HttpResponse::new(403)) }));

        let response = Pipeline::build(vec![deny], terminal)
            .execute(HttpRequest::get("/"))
            .await;
        assert_eq!(response.status, 403);
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_middleware_error_becomes_response() {
        let failing: Arc<dyn Middleware> = Arc::new(from_fn(|_req, _next: Next| async {
            Err(Error::BadRequest("missing token".into()))
        }));
        let terminal = FnEndpoint::new(|_req| async { Ok(HttpResponse::ok()) });

        let response = Pipeline::build(vec![failing], terminal)
            .execute(HttpRequest::get("/"))
            .await;
        assert_eq!(response.status, 400);
        assert!(response.body_string().contains("missing token"));
    }

    #[tokio::test]
    async fn test_route_middleware_and_scope() {
        let router = Router::new();
        let tag: Arc<dyn Middleware> = Arc::new(from_fn(|req, next: Next| async move {
            let response = next(req).await?;
            Ok(response.with_header("x-route", "tagged"))
        }));
        router
            .add_route(
                HttpMethod::GET,
                "/scoped",
                HandlerRef::from_fn(|req: HttpRequest| async move {
                    let count = req.resolve::<u32>()?;
                    Ok(HttpResponse::ok().with_text(count.to_string()))
                }),
                0,
                vec![tag],
            )
            .unwrap();
        let container = Container::new();
        container.registry().register_instance(7u32).unwrap();

        let response = Pipeline::build(Vec::new(), Dispatcher::new(Arc::new(router), container))
            .execute(HttpRequest::get("/scoped"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_string(), "7");
        assert_eq!(response.header("x-route").map(String::as_str), Some("tagged"));
    }

    #[tokio::test]
    async fn test_resolution_failure_is_500() {
        let router = Router::new();
        router
            .add_route(
                HttpMethod::GET,
                "/broken",
                HandlerRef::from_fn(|req: HttpRequest| async move {
                    req.resolve::<String>()?;
                    Ok(HttpResponse::ok())
                }),
                0,
                Vec::new(),
            )
            .unwrap();
        let pipeline = Pipeline::build(
            Vec::new(),
            Dispatcher::new(Arc::new(router), Container::new()),
        );

        let response = pipeline.execute(HttpRequest::get("/broken")).await;
        assert_eq!(response.status, 500);
        assert!(!response.body_string().contains("String"));

        let detailed = pipeline
            .expose_error_details(true)
            .execute(HttpRequest::get("/broken"))
            .await;
        assert!(detailed.body_string().contains("Unresolved dependency"));
    }
}
