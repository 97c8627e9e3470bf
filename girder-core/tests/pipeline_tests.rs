use async_trait::async_trait;
use girder_core::middleware::{
    LoggerMiddleware, Middleware, Next, REQUEST_ID_HEADER, RequestIdMiddleware, from_fn,
};
use girder_core::{
    Container, Dispatcher, Error, FnEndpoint, HandlerRef, HttpMethod, HttpRequest, HttpResponse,
    Lifetime, Pipeline, Result, Router,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records the order in which it sees the request and the response.
struct Trace {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for Trace {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        self.log.lock().push(format!("{} in", self.label));
        let response = next(req).await;
        self.log.lock().push(format!("{} out", self.label));
        response
    }
}

fn greet_dispatcher(container: Container) -> Dispatcher {
    let router = Router::new();
    router
        .add_route(
            HttpMethod::GET,
            "/greet/{name}",
            HandlerRef::from_fn(|req: HttpRequest| async move {
                let name = req.param("name").cloned().unwrap_or_default();
                Ok(HttpResponse::ok().with_text(format!("Hello, {}!", name)))
            }),
            0,
            Vec::new(),
        )
        .unwrap();
    Dispatcher::new(Arc::new(router), container)
}

#[tokio::test]
async fn test_greet_end_to_end() {
    let pipeline = Pipeline::build(Vec::new(), greet_dispatcher(Container::new()));

    let ok = pipeline.execute(HttpRequest::get("/greet/Ada")).await;
    assert_eq!(ok.status, 200);
    assert!(ok.body_string().contains("Ada"));

    let wrong_method = pipeline.execute(HttpRequest::post("/greet/Ada")).await;
    assert_eq!(wrong_method.status, 404);
}

#[tokio::test]
async fn test_middlewares_wrap_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let outer: Arc<dyn Middleware> = Arc::new(Trace {
        label: "outer",
        log: log.clone(),
    });
    let inner: Arc<dyn Middleware> = Arc::new(Trace {
        label: "inner",
        log: log.clone(),
    });

    let response = Pipeline::build(vec![outer, inner], greet_dispatcher(Container::new()))
        .execute(HttpRequest::get("/greet/Bob"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(
        *log.lock(),
        vec!["outer in", "inner in", "inner out", "outer out"]
    );
}

#[tokio::test]
async fn test_short_circuit_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let terminal = FnEndpoint::new(move |_req| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse::ok())
        }
    });
    let guard: Arc<dyn Middleware> = Arc::new(from_fn(|req: HttpRequest, next: Next| async move {
        if req.header("authorization").is_none() {
            return Ok(HttpResponse::new(401).with_text("unauthorized"));
        }
        next(req).await
    }));

    let pipeline = Pipeline::build(vec![guard], terminal);
    let denied = pipeline.execute(HttpRequest::get("/")).await;
    assert_eq!(denied.status, 401);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let allowed = pipeline
        .execute(HttpRequest::get("/").with_header("Authorization", "token"))
        .await;
    assert_eq!(allowed.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ambiguous_route_is_500() {
    let router = Router::new();
    for template in ["/dup/{a}", "/dup/{b}"] {
        router
            .add_route(
                HttpMethod::GET,
                template,
                HandlerRef::from_fn(|_req| async { Ok(HttpResponse::ok()) }),
                0,
                Vec::new(),
            )
            .unwrap();
    }
    let pipeline = Pipeline::build(
        Vec::new(),
        Dispatcher::new(Arc::new(router), Container::new()),
    );

    let response = pipeline.execute(HttpRequest::get("/dup/1")).await;
    assert_eq!(response.status, 500);
    assert!(matches!(
        response.error.as_deref(),
        Some(Error::AmbiguousRoute { .. })
    ));
}

#[tokio::test]
async fn test_scoped_service_per_request() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let container = Container::new();
    container
        .registry()
        .register_factory(Lifetime::Scoped, move |_| {
            Ok(counter.fetch_add(1, Ordering::SeqCst) as u64)
        })
        .unwrap();

    // Resolves the scoped value in a middleware and again in the handler.
    let peek: Arc<dyn Middleware> = Arc::new(from_fn(|req: HttpRequest, next: Next| async move {
        let seen = match req.scope() {
            Some(scope) => *scope.get::<u64>()?,
            None => u64::MAX,
        };
        let response = next(req).await?;
        Ok(response.with_header("x-seen", seen.to_string()))
    }));

    let router = Router::new();
    router
        .add_route(
            HttpMethod::GET,
            "/id",
            HandlerRef::from_fn(|req: HttpRequest| async move {
                let id = req.resolve::<u64>()?;
                Ok(HttpResponse::ok().with_text(id.to_string()))
            }),
            0,
            vec![peek],
        )
        .unwrap();
    let pipeline = Pipeline::build(
        Vec::new(),
        Dispatcher::new(Arc::new(router), container),
    );

    let first = pipeline.execute(HttpRequest::get("/id")).await;
    let second = pipeline.execute(HttpRequest::get("/id")).await;

    assert_eq!(first.body_string(), "0");
    assert_eq!(first.header("x-seen").map(String::as_str), Some("0"));
    assert_eq!(second.body_string(), "1");
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_builtin_middlewares_compose() {
    let middlewares: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(RequestIdMiddleware),
        Arc::new(LoggerMiddleware::new()),
    ];
    let pipeline = Pipeline::build(middlewares, greet_dispatcher(Container::new()));

    let response = pipeline
        .execute(HttpRequest::get("/greet/Eve").with_header(REQUEST_ID_HEADER, "req-1"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header(REQUEST_ID_HEADER).map(String::as_str),
        Some("req-1")
    );

    let missing = pipeline.execute(HttpRequest::get("/missing")).await;
    assert_eq!(missing.status, 404);
    assert!(missing.header(REQUEST_ID_HEADER).is_none());
}
