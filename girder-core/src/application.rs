// Application bootstrapper: container, router and pipeline wired from one builder

use crate::config::GirderConfig;
use crate::di::{Container, ContainerObserver, Injectable, ServiceRegistry};
use crate::handler::HandlerRef;
use crate::logging::{debug, info};
use crate::middleware::{Middleware, TimeoutMiddleware};
use crate::pipeline::{Dispatcher, Pipeline};
use crate::routing::{MethodSet, RouteTable, Router, SegmentConstraint};
use crate::{HttpRequest, HttpResponse, Result};
use std::any::Any;
use std::sync::Arc;

type ServiceStep = Box<dyn FnOnce(&ServiceRegistry, &GirderConfig) -> Result<()> + Send>;

/// A route waiting to be added by [`ApplicationBuilder::build`].
#[must_use = "pass the route to ApplicationBuilder::add_route"]
pub struct RouteSpec {
    methods: MethodSet,
    template: String,
    handler: HandlerRef,
    weight: i32,
    middlewares: Vec<Arc<dyn Middleware>>,
    name: Option<String>,
}

impl RouteSpec {
    pub fn new(methods: impl Into<MethodSet>, template: impl Into<String>, handler: HandlerRef) -> Self {
        Self {
            methods: methods.into(),
            template: template.into(),
            handler,
            weight: 0,
            middlewares: Vec::new(),
            name: None,
        }
    }

    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn add_to(self, table: &mut RouteTable) -> Result<()> {
        let mut builder = table
            .route(self.methods, self.template, self.handler)
            .weight(self.weight);
        for middleware in self.middlewares {
            builder = builder.middleware_arc(middleware);
        }
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        builder.add().map(|_| ())
    }
}

/// Collects services, routes and middleware; nothing is validated until
/// [`build`](Self::build).
#[must_use = "call .build() to create the application"]
pub struct ApplicationBuilder {
    config: GirderConfig,
    services: Vec<ServiceStep>,
    observers: Vec<Arc<dyn ContainerObserver>>,
    constraints: Vec<(String, Arc<dyn SegmentConstraint>)>,
    routes: Vec<RouteSpec>,
    middlewares: Vec<Arc<dyn Middleware>>,
    scan: bool,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: GirderConfig::default(),
            services: Vec::new(),
            observers: Vec::new(),
            constraints: Vec::new(),
            routes: Vec::new(),
            middlewares: Vec::new(),
            scan: false,
        }
    }

    pub fn config(mut self, config: GirderConfig) -> Self {
        self.config = config;
        self
    }

    /// Register services against the registry at build time.
    pub fn services<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&ServiceRegistry) -> Result<()> + Send + 'static,
    {
        self.services
            .push(Box::new(move |registry, _config| register(registry)));
        self
    }

    /// Register `T` with the configured default lifetime.
    pub fn provide<T: Injectable>(mut self) -> Self {
        self.services.push(Box::new(|registry, config| {
            registry.register_type::<T>(config.container.default_lifetime)
        }));
        self
    }

    /// Register a pre-built singleton.
    pub fn instance<T: Any + Send + Sync>(mut self, instance: T) -> Self {
        self.services
            .push(Box::new(move |registry, _config| registry.register_instance(instance)));
        self
    }

    /// Subscribe an observer before any service is registered, so it sees
    /// every registration event.
    pub fn observe(mut self, observer: Arc<dyn ContainerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn constraint(
        mut self,
        type_name: impl Into<String>,
        constraint: Arc<dyn SegmentConstraint>,
    ) -> Self {
        self.constraints.push((type_name.into(), constraint));
        self
    }

    pub fn route(
        self,
        methods: impl Into<MethodSet>,
        template: impl Into<String>,
        handler: HandlerRef,
    ) -> Self {
        self.add_route(RouteSpec::new(methods, template, handler))
    }

    pub fn add_route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Append a global middleware; the first added runs outermost.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Also add every route declared with [`route!`](crate::route).
    pub fn scan_declared_routes(mut self) -> Self {
        self.scan = true;
        self
    }

    /// Register everything and assemble the pipeline.
    ///
    /// Fails with the first setup error: a bad service registration, an
    /// invalid route template or a bad declared route.
    pub fn build(self) -> Result<Application> {
        let ApplicationBuilder {
            config,
            services,
            observers,
            constraints,
            routes,
            middlewares,
            scan,
        } = self;

        let container = Container::new();
        for observer in observers {
            container.subscribe(observer);
        }
        for step in services {
            step(container.registry(), &config)?;
        }

        let mut table = RouteTable::new();
        for (type_name, constraint) in constraints {
            table.add_constraint(type_name, constraint);
        }
        for route in routes {
            route.add_to(&mut table)?;
        }
        if scan {
            table.scan()?;
        }
        let router = Arc::new(Router::from_table(table).with_options(config.match_options()));

        let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(middlewares.len() + 1);
        if let Some(timeout) = config.request_timeout() {
            debug!(timeout = ?timeout, "Request timeout enabled");
            chain.push(Arc::new(TimeoutMiddleware::from_duration(timeout)));
        }
        chain.extend(middlewares);

        let pipeline = Pipeline::build(chain, Dispatcher::new(router.clone(), container.clone()))
            .expose_error_details(config.pipeline.expose_error_details);

        info!(
            services = container.registry().len(),
            routes = router.len(),
            middlewares = pipeline.middleware_count(),
            "Application built"
        );

        Ok(Application {
            config,
            container,
            router,
            pipeline,
        })
    }
}

/// A fully wired application: feed it requests with [`handle`](Self::handle).
pub struct Application {
    config: GirderConfig,
    container: Container,
    router: Arc<Router>,
    pipeline: Pipeline,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn config(&self) -> &GirderConfig {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The live router; routes may still be added after build.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run one request through the pipeline. Never fails; errors come back as
    /// error responses.
    ///
    /// ```
    /// use girder_core::{Application, HandlerRef, HttpMethod, HttpRequest, HttpResponse};
    ///
    /// let app = Application::builder()
    ///     .route(
    ///         HttpMethod::GET,
    ///         "/ping",
    ///         HandlerRef::from_fn(|_req: HttpRequest| async { Ok(HttpResponse::ok().with_text("pong")) }),
    ///     )
    ///     .build()?;
    ///
    /// let response = tokio_test::block_on(app.handle(HttpRequest::get("/ping")));
    /// assert_eq!(response.body_string(), "pong");
    ///
    /// let missing = tokio_test::block_on(app.handle(HttpRequest::get("/nope")));
    /// assert_eq!(missing.status, 404);
    /// # Ok::<(), girder_core::Error>(())
    /// ```
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.pipeline.execute(request).await
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("container", &self.container)
            .field("router", &self.router)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
