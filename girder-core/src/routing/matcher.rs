// Route matching: scoring table entries against a request

use super::{MethodSet, RouteEntry, RouteId, RouteTable, SegmentConstraint};
use super::template::Ranks;
use crate::handler::HandlerRef;
use crate::logging::{debug, error, trace};
use crate::middleware::Middleware;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// How well a route matched. Greater is better.
///
/// Fields compare in declaration order: segment ranks left to right, then an
/// explicit method over `ANY`, then the route weight.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteScore {
    pub ranks: Ranks,
    pub explicit_method: bool,
    pub weight: i32,
}

/// The route chosen for a request.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub route: Arc<RouteEntry>,
    /// Placeholder values, decoded.
    pub params: HashMap<String, String>,
    pub score: RouteScore,
}

/// Matching behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Compare literal segments exactly (otherwise ignoring ASCII case)
    pub case_sensitive: bool,
    /// Percent-decode path segments before matching
    pub decode_params: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            decode_params: true,
        }
    }
}

/// Thread-safe route matcher over a [`RouteTable`].
///
/// Matching takes the table's read lock; adding routes after startup takes
/// the write lock.
pub struct Router {
    table: RwLock<RouteTable>,
    options: MatchOptions,
}

impl Router {
    pub fn new() -> Self {
        Self::from_table(RouteTable::new())
    }

    pub fn from_table(table: RouteTable) -> Self {
        Self {
            table: RwLock::new(table),
            options: MatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Register a route at runtime.
    pub fn add_route(
        &self,
        methods: impl Into<MethodSet>,
        template: &str,
        handler: HandlerRef,
        weight: i32,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<RouteId> {
        self.table
            .write()
            .add_route(methods, template, handler, weight, middlewares)
    }

    pub fn add_constraint(&self, type_name: impl Into<String>, constraint: Arc<dyn SegmentConstraint>) {
        self.table.write().add_constraint(type_name, constraint);
    }

    pub fn remove_route(&self, id: RouteId) -> bool {
        self.table.write().remove(id)
    }

    /// Run `f` with shared access to the table.
    pub fn read<R>(&self, f: impl FnOnce(&RouteTable) -> R) -> R {
        f(&self.table.read())
    }

    /// Run `f` with exclusive access to the table.
    pub fn write<R>(&self, f: impl FnOnce(&mut RouteTable) -> R) -> R {
        f(&mut self.table.write())
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Find the single best route for `method` and `path`.
    ///
    /// Fails with [`Error::RouteNotFound`] when nothing matches and with
    /// [`Error::AmbiguousRoute`] when the best score is shared.
    pub fn match_route(&self, method: &str, path: &str) -> Result<MatchResult> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let segments = split_path(path, self.options.decode_params);
        let segment_refs: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();

        let mut best: Vec<MatchResult> = Vec::new();
        {
            let table = self.table.read();
            trace!(routes = table.len(), method = method, path = path, "Matching route");

            for entry in table.entries() {
                if !entry.methods().contains(method) {
                    continue;
                }
                let Some(params) = entry
                    .template()
                    .matches(&segment_refs, self.options.case_sensitive)
                else {
                    continue;
                };

                let score = RouteScore {
                    ranks: entry.template().ranks().clone(),
                    explicit_method: !entry.methods().is_any(),
                    weight: entry.weight(),
                };
                let ordering = best
                    .first()
                    .map_or(Ordering::Greater, |current| score.cmp(&current.score));
                match ordering {
                    Ordering::Less => continue,
                    Ordering::Greater => best.clear(),
                    Ordering::Equal => {}
                }
                best.push(MatchResult {
                    route: entry.clone(),
                    params: params.into_iter().collect(),
                    score,
                });
            }
        }

        match best.len() {
            0 => {
                debug!(method = method, path = path, "No route matched");
                Err(Error::RouteNotFound {
                    method: method.to_string(),
                    path: path.to_string(),
                })
            }
            1 => {
                let found = best.remove(0);
                debug!(
                    method = method,
                    path = path,
                    route = %found.route.describe(),
                    "Route matched"
                );
                Ok(found)
            }
            _ => {
                let candidates: Vec<String> = best.iter().map(|m| m.route.describe()).collect();
                error!(
                    method = method,
                    path = path,
                    candidates = ?candidates,
                    "Ambiguous route: several routes match equally well"
                );
                Err(Error::AmbiguousRoute {
                    method: method.to_string(),
                    path: path.to_string(),
                    candidates,
                })
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("table", &*self.table.read())
            .field("options", &self.options)
            .finish()
    }
}

/// Split a path into its non-empty segments, optionally percent-decoding each.
///
/// A segment that does not decode to valid UTF-8 is kept as written.
pub fn split_path(path: &str, decode: bool) -> Vec<Cow<'_, str>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if decode {
                urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
            } else {
                Cow::Borrowed(segment)
            }
        })
        .collect()
}

/// Parse a query string into a map of parameters, percent-decoding keys and
/// values. `+` is read as a space; later duplicates win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethod, HttpResponse};

    fn handler() -> HandlerRef {
        HandlerRef::from_fn(|_req| async { Ok(HttpResponse::ok()) })
    }

    fn router(routes: &[(MethodSet, &str, i32)]) -> Router {
        let router = Router::new();
        for (methods, template, weight) in routes {
            router
                .add_route(methods.clone(), template, handler(), *weight, Vec::new())
                .unwrap();
        }
        router
    }

    #[test]
    fn test_literal_beats_placeholder() {
        let router = router(&[
            (HttpMethod::GET.into(), "/users/{id}", 0),
            (HttpMethod::GET.into(), "/users/me", 0),
        ]);

        let found = router.match_route("GET", "/users/me").unwrap();
        assert_eq!(found.route.template().as_str(), "/users/me");

        let found = router.match_route("GET", "/users/42").unwrap();
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_typed_beats_untyped_beats_wildcard() {
        let router = router(&[
            (HttpMethod::GET.into(), "/items/{*rest}", 0),
            (HttpMethod::GET.into(), "/items/{slug}", 0),
            (HttpMethod::GET.into(), "/items/{id:int}", 0),
        ]);

        let by_id = router.match_route("GET", "/items/7").unwrap();
        assert_eq!(by_id.route.template().as_str(), "/items/{id:int}");

        let by_slug = router.match_route("GET", "/items/hat").unwrap();
        assert_eq!(by_slug.route.template().as_str(), "/items/{slug}");

        let nested = router.match_route("GET", "/items/a/b").unwrap();
        assert_eq!(nested.params.get("rest").map(String::as_str), Some("a/b"));
    }

    #[test]
    fn test_earlier_segments_dominate() {
        let router = router(&[
            (HttpMethod::GET.into(), "/{kind}/latest", 0),
            (HttpMethod::GET.into(), "/posts/{id}", 0),
        ]);
        let found = router.match_route("GET", "/posts/latest").unwrap();
        assert_eq!(found.route.template().as_str(), "/posts/{id}");
    }

    #[test]
    fn test_equal_routes_are_ambiguous() {
        let router = router(&[
            (HttpMethod::GET.into(), "/a/{x}", 0),
            (HttpMethod::GET.into(), "/a/{y}", 0),
        ]);
        match router.match_route("GET", "/a/1").unwrap_err() {
            Error::AmbiguousRoute { candidates, .. } => {
                assert_eq!(candidates, vec!["GET /a/{x}", "GET /a/{y}"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_weight_breaks_tie() {
        let router = router(&[
            (HttpMethod::GET.into(), "/a/{x}", 0),
            (HttpMethod::GET.into(), "/a/{y}", 10),
        ]);
        let found = router.match_route("GET", "/a/1").unwrap();
        assert_eq!(found.route.template().as_str(), "/a/{y}");
    }

    #[test]
    fn test_explicit_method_beats_any() {
        let router = router(&[
            (MethodSet::Any, "/health", 100),
            (HttpMethod::GET.into(), "/health", 0),
        ]);
        let found = router.match_route("GET", "/health").unwrap();
        assert!(!found.route.methods().is_any());

        let found = router.match_route("DELETE", "/health").unwrap();
        assert!(found.route.methods().is_any());
    }

    #[test]
    fn test_method_mismatch_is_not_found() {
        let router = router(&[(HttpMethod::GET.into(), "/greet/{name}", 0)]);
        let err = router.match_route("POST", "/greet/Ada").unwrap_err();
        assert!(matches!(err, Error::RouteNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_params_are_decoded_and_query_ignored() {
        let router = router(&[(HttpMethod::GET.into(), "/greet/{name}", 0)]);
        let found = router
            .match_route("GET", "/greet/Ada%20Lovelace?lang=en")
            .unwrap();
        assert_eq!(
            found.params.get("name").map(String::as_str),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_case_insensitive_option() {
        let router = router(&[(HttpMethod::GET.into(), "/About", 0)]);
        assert!(router.match_route("GET", "/about").is_err());

        let router = router.with_options(MatchOptions {
            case_sensitive: false,
            decode_params: true,
        });
        assert!(router.match_route("GET", "/about").is_ok());
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("name=john+doe&email=test%40example.com&flag&&x=1&x=2");
        assert_eq!(params.get("name").map(String::as_str), Some("john doe"));
        assert_eq!(
            params.get("email").map(String::as_str),
            Some("test@example.com")
        );
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
        assert_eq!(params.get("x").map(String::as_str), Some("2"));
        assert!(parse_query_string("").is_empty());
    }

    #[test]
    fn test_split_path() {
        let segments = split_path("//a/%7Bb%7D/", true);
        assert_eq!(segments, vec!["a", "{b}"]);
        let raw = split_path("/a/%7Bb%7D", false);
        assert_eq!(raw, vec!["a", "%7Bb%7D"]);
    }
}
