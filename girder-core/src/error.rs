// Error types for the Girder framework

use crate::di::ContractKey;
use thiserror::Error;

/// Result alias used throughout the framework.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Setup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid route template '{template}': {reason}")]
    InvalidRouteTemplate { template: String, reason: String },

    // Resolution errors
    #[error("Unresolved dependency: {}", describe_unresolved(.contract, .required_by.as_ref()))]
    UnresolvedDependency {
        contract: ContractKey,
        required_by: Option<ContractKey>,
    },

    #[error("Circular dependency detected: {}", join_path(.path))]
    CircularDependency { path: Vec<ContractKey> },

    #[error("Service {contract} is not of type {expected}")]
    TypeMismatch {
        contract: ContractKey,
        expected: &'static str,
    },

    // Routing errors
    #[error("Route not found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Ambiguous route for {method} {path}: {}", .candidates.join(", "))]
    AmbiguousRoute {
        method: String,
        path: String,
        candidates: Vec<String>,
    },

    // Request-level errors
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Request Timeout: {0}")]
    RequestTimeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_unresolved(contract: &ContractKey, required_by: Option<&ContractKey>) -> String {
    match required_by {
        Some(parent) => format!("{} (required by {})", contract, parent),
        None => contract.to_string(),
    }
}

fn join_path(path: &[ContractKey]) -> String {
    path.iter()
        .map(ContractKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound { .. } => 404,
            Error::BadRequest(_) => 400,
            Error::RequestTimeout(_) => 408,
            // Resolution failures, ambiguous routes and everything else are
            // server-side defects from the client's point of view.
            _ => 500,
        }
    }

    /// Errors raised while wiring the application; these abort startup.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::InvalidRouteTemplate { .. }
        )
    }

    /// Errors produced by the dependency-injection container.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::UnresolvedDependency { .. }
                | Error::CircularDependency { .. }
                | Error::TypeMismatch { .. }
        )
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Short machine-readable identifier, used in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::InvalidRouteTemplate { .. } => "invalid_route_template",
            Error::UnresolvedDependency { .. } => "unresolved_dependency",
            Error::CircularDependency { .. } => "circular_dependency",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::RouteNotFound { .. } => "route_not_found",
            Error::AmbiguousRoute { .. } => "ambiguous_route",
            Error::BadRequest(_) => "bad_request",
            Error::RequestTimeout(_) => "request_timeout",
            Error::Serialization(_) => "serialization",
            Error::Handler(_) => "handler",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }
}
