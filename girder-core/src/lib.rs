// Core library for the Girder framework
// Dependency injection, route matching and the middleware pipeline

pub mod application;
pub mod config;
pub mod di;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod routing;

// Re-export commonly used types
pub use application::{Application, ApplicationBuilder, RouteSpec};
pub use config::GirderConfig;
pub use di::{Container, ContractKey, Injectable, Lifetime, Scope, ServiceRegistry};
pub use error::{Error, Result};
pub use handler::{BoxFuture, HandlerFn, HandlerRef, RequestHandler};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Json};
pub use middleware::{Middleware, MiddlewareChain, Next};
pub use pipeline::{Dispatcher, Endpoint, FnEndpoint, Pipeline};
pub use routing::{MethodSet, RouteTable, Router};

// Used by the `route!` macro expansion
#[doc(hidden)]
pub use inventory;
