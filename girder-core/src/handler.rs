//! Route handlers.
//!
//! A route points at its handler through a [`HandlerRef`]: either a plain
//! async function, or a service type implementing [`RequestHandler`] that the
//! container builds (with its constructor dependencies) inside the request
//! scope.

use crate::di::{ContractKey, Scope};
use crate::{HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by handlers and chain steps.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type alias for handler functions
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send + Sync>;

type ServiceResolver = fn(&Scope) -> Result<Arc<dyn RequestHandler>>;

/// Trait for request handlers (controller actions)
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle an HTTP request and return a response
    async fn handle(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Reference from a route to the code that serves it.
#[derive(Clone)]
pub enum HandlerRef {
    Function(HandlerFn),
    Service {
        contract: ContractKey,
        resolve: ServiceResolver,
    },
}

impl HandlerRef {
    /// Wrap an async function or closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
    {
        HandlerRef::Function(Arc::new(move |req| Box::pin(f(req))))
    }

    /// Resolve `H` from the request scope on every request.
    ///
    /// `H` must be registered with the container; its lifetime decides
    /// whether instances are shared across requests.
    pub fn service<H: RequestHandler>() -> Self {
        HandlerRef::Service {
            contract: ContractKey::of::<H>(),
            resolve: resolve_service::<H>,
        }
    }

    /// Contract of a service handler, `None` for functions.
    pub fn contract(&self) -> Option<&ContractKey> {
        match self {
            HandlerRef::Function(_) => None,
            HandlerRef::Service { contract, .. } => Some(contract),
        }
    }

    /// Obtain the handler and run it.
    pub async fn invoke(&self, scope: &Scope, request: HttpRequest) -> Result<HttpResponse> {
        match self {
            HandlerRef::Function(f) => f(request).await,
            HandlerRef::Service { resolve, .. } => {
                let handler = resolve(scope)?;
                handler.handle(request).await
            }
        }
    }
}

fn resolve_service<H: RequestHandler>(scope: &Scope) -> Result<Arc<dyn RequestHandler>> {
    let handler: Arc<dyn RequestHandler> = scope.get::<H>()?;
    Ok(handler)
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Function(_) => f.write_str("Function(..)"),
            HandlerRef::Service { contract, .. } => {
                f.debug_tuple("Service").field(contract).finish()
            }
        }
    }
}
