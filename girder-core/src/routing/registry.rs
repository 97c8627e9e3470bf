//! Link-time route declarations.
//!
//! [`route!`](crate::route) submits a [`RouteDeclaration`] through
//! `inventory`; [`RouteTable::scan`](super::RouteTable::scan) turns every
//! declaration linked into the binary into a route entry.

use super::MethodSet;
use crate::handler::HandlerRef;
use crate::{Error, HttpMethod, Result};

/// A route declared with [`route!`](crate::route).
pub struct RouteDeclaration {
    /// Verb name, or `ANY`
    pub method: &'static str,
    pub template: &'static str,
    pub handler: fn() -> HandlerRef,
    pub weight: i32,
    pub name: Option<&'static str>,
}

inventory::collect!(RouteDeclaration);

impl RouteDeclaration {
    pub(crate) fn method_set(&self) -> Result<MethodSet> {
        if self.method.eq_ignore_ascii_case("ANY") {
            return Ok(MethodSet::Any);
        }
        self.method
            .parse::<HttpMethod>()
            .map(MethodSet::from)
            .map_err(|_| {
                Error::Configuration(format!(
                    "route {} declares unknown method '{}'",
                    self.template, self.method
                ))
            })
    }
}

/// All declarations linked into the binary.
pub fn declared_routes() -> impl Iterator<Item = &'static RouteDeclaration> {
    inventory::iter::<RouteDeclaration>.into_iter()
}

/// Declare a route for [`RouteTable::scan`](crate::routing::RouteTable::scan).
///
/// ```ignore
/// async fn greet(req: HttpRequest) -> Result<HttpResponse> { /* ... */ }
///
/// girder_core::route!(GET "/greet/{name}" => greet);
/// girder_core::route!(ANY "/files/{*path}" => serve_file, weight = -1);
/// girder_core::route!(GET "/users/{id:int}" => service UserController, name = "user");
/// ```
#[macro_export]
macro_rules! route {
    (@weight) => { 0 };
    (@weight $weight:expr) => { $weight };
    (@name) => { ::core::option::Option::None };
    (@name $name:literal) => { ::core::option::Option::Some($name) };

    (@declare $method:ident, $template:literal, $handler:expr, $weight:expr, $name:expr) => {
        const _: () = {
            fn __route_handler() -> $crate::handler::HandlerRef {
                $handler
            }

            $crate::inventory::submit! {
                $crate::routing::RouteDeclaration {
                    method: ::core::stringify!($method),
                    template: $template,
                    handler: __route_handler,
                    weight: $weight,
                    name: $name,
                }
            }
        };
    };

    ($method:ident $template:literal => service $handler:ty
        $(, weight = $weight:expr)? $(, name = $name:literal)? $(,)?) => {
        $crate::route!(@declare $method, $template,
            $crate::handler::HandlerRef::service::<$handler>(),
            $crate::route!(@weight $($weight)?),
            $crate::route!(@name $($name)?));
    };

    ($method:ident $template:literal => $handler:path
        $(, weight = $weight:expr)? $(, name = $name:literal)? $(,)?) => {
        $crate::route!(@declare $method, $template,
            $crate::handler::HandlerRef::from_fn($handler),
            $crate::route!(@weight $($weight)?),
            $crate::route!(@name $($name)?));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpResponse;

    fn handler() -> HandlerRef {
        HandlerRef::from_fn(|_req| async { Ok(HttpResponse::ok()) })
    }

    #[test]
    fn test_method_set_from_declaration() {
        let any = RouteDeclaration {
            method: "ANY",
            template: "/",
            handler,
            weight: 0,
            name: None,
        };
        assert!(any.method_set().unwrap().is_any());

        let get = RouteDeclaration {
            method: "GET",
            ..any
        };
        assert!(get.method_set().unwrap().contains("GET"));

        let bogus = RouteDeclaration {
            method: "FETCH",
            template: "/",
            handler,
            weight: 0,
            name: None,
        };
        assert!(matches!(bogus.method_set(), Err(Error::Configuration(_))));
    }
}
