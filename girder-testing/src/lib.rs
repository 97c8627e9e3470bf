//! Testing utilities for the Girder framework.
//!
//! - **TestClient** - drives an application's pipeline in-process
//! - **Assertions** - status, header, body and JSON checks
//! - **RecordingObserver** - captures container events
//! - **CallSpy** - records handler and middleware invocations
//!
//! ## Quick Start
//!
//! ```
//! use girder_core::{Application, HttpMethod};
//! use girder_testing::*;
//!
//! # tokio_test::block_on(async {
//! let spy = CallSpy::new();
//! let app = Application::builder()
//!     .route(HttpMethod::GET, "/health", spy.handler(200))
//!     .build()
//!     .unwrap();
//!
//! let client = TestClient::for_app(&app);
//! let response = client.get("/health").await;
//! assert_status(&response, 200);
//! assert!(spy.was_called_with("GET /health"));
//!
//! let missing = client.get("/nope").await;
//! assert_status(&missing, 404);
//! assert_error_kind(&missing, "route_not_found");
//! # });
//! ```

mod assertions;
mod observer;
mod spy;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_client_error, assert_error_kind, assert_header, assert_json,
    assert_server_error, assert_status, assert_success,
};
pub use observer::RecordingObserver;
pub use spy::{CallSpy, SpyMiddleware};
pub use test_client::{MethodName, TestClient, TestRequestBuilder, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
