// Girder - dependency injection, routing and middleware for Rust services
//
// This library wires a DI container, a specificity-ranked router and an
// ordered middleware pipeline into one application object.

// Re-export core functionality
pub use girder_core::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use girder_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::di::{Arguments, Parameter};
    pub use crate::middleware::from_fn;
    pub use crate::{
        Application,
        Container,
        ContractKey,
        Error,
        GirderConfig,
        HandlerRef,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        Injectable,
        Json,
        Lifetime,
        MethodSet,
        Middleware,
        Next,
        RequestHandler,
        Result,
        RouteSpec,
        Router,
        route,
    };
}
