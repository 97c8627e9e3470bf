// Invocation tracking for handlers and middleware

use async_trait::async_trait;
use girder_core::middleware::{Middleware, Next};
use girder_core::{HandlerRef, HttpRequest, HttpResponse, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared record of calls; clones observe the same log.
#[derive(Clone, Default)]
pub struct CallSpy {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallSpy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: impl Into<String>) {
        self.calls.lock().push(label.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn was_called(&self) -> bool {
        !self.calls.lock().is_empty()
    }

    pub fn was_called_with(&self, label: &str) -> bool {
        self.calls.lock().iter().any(|c| c == label)
    }

    /// Recorded labels, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    /// A handler that records `"METHOD path"` and answers with `status`.
    pub fn handler(&self, status: u16) -> HandlerRef {
        let spy = self.clone();
        HandlerRef::from_fn(move |req: HttpRequest| {
            spy.record(format!("{} {}", req.method, req.path_only()));
            async move { Ok(HttpResponse::new(status)) }
        })
    }

    /// A pass-through middleware that records `label` on every request.
    pub fn middleware(&self, label: impl Into<String>) -> SpyMiddleware {
        SpyMiddleware {
            spy: self.clone(),
            label: label.into(),
        }
    }
}

impl std::fmt::Debug for CallSpy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSpy")
            .field("calls", &*self.calls.lock())
            .finish()
    }
}

/// Middleware returned by [`CallSpy::middleware`].
pub struct SpyMiddleware {
    spy: CallSpy,
    label: String,
}

#[async_trait]
impl Middleware for SpyMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        self.spy.record(self.label.clone());
        next(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::di::Container;

    #[tokio::test]
    async fn test_handler_records_calls() {
        let spy = CallSpy::new();
        let handler = spy.handler(204);
        let scope = Container::new().create_scope();

        let response = handler
            .invoke(&scope, HttpRequest::get("/ping?x=1"))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(spy.was_called_with("GET /ping"));
        assert_eq!(spy.call_count(), 1);

        spy.reset();
        assert!(!spy.was_called());
    }
}
