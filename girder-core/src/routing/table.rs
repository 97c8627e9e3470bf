// Route table: registered route entries

use super::registry::RouteDeclaration;
use super::{ConstraintSet, RouteTemplate, SegmentConstraint};
use crate::handler::HandlerRef;
use crate::logging::debug;
use crate::middleware::Middleware;
use crate::{HttpMethod, Result};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Identifier assigned to a route when it is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub(crate) usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The verbs a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    /// Every method
    Any,
    Only(SmallVec<[HttpMethod; 2]>),
}

impl MethodSet {
    pub fn contains(&self, method: &str) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods
                .iter()
                .any(|m| m.as_str().eq_ignore_ascii_case(method)),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, MethodSet::Any)
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSet::Any => f.write_str("ANY"),
            MethodSet::Only(methods) => {
                let names: Vec<_> = methods.iter().map(HttpMethod::as_str).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}

impl From<HttpMethod> for MethodSet {
    fn from(method: HttpMethod) -> Self {
        MethodSet::Only(smallvec::smallvec![method])
    }
}

impl<const N: usize> From<[HttpMethod; N]> for MethodSet {
    fn from(methods: [HttpMethod; N]) -> Self {
        MethodSet::Only(methods.into_iter().collect())
    }
}

impl From<Vec<HttpMethod>> for MethodSet {
    fn from(methods: Vec<HttpMethod>) -> Self {
        MethodSet::Only(methods.into_iter().collect())
    }
}

/// A registered route.
pub struct RouteEntry {
    id: RouteId,
    template: RouteTemplate,
    methods: MethodSet,
    handler: HandlerRef,
    weight: i32,
    middlewares: Vec<Arc<dyn Middleware>>,
    name: Option<String>,
}

impl RouteEntry {
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    /// Route-level middlewares, outermost first.
    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `GET /users/{id}`, with the route name when it has one.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {} ({})", self.methods, self.template, name),
            None => format!("{} {}", self.methods, self.template),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("id", &self.id)
            .field("methods", &self.methods)
            .field("template", &self.template.as_str())
            .field("handler", &self.handler)
            .field("weight", &self.weight)
            .field("middlewares", &self.middlewares.len())
            .field("name", &self.name)
            .finish()
    }
}

/// Stores route entries in registration order.
pub struct RouteTable {
    entries: Vec<Arc<RouteEntry>>,
    constraints: ConstraintSet,
    next_id: usize,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            constraints: ConstraintSet::with_builtins(),
            next_id: 0,
        }
    }

    /// Add a custom placeholder type, usable as `{name:type}` in templates
    /// added afterwards.
    pub fn with_constraint(
        mut self,
        type_name: impl Into<String>,
        constraint: Arc<dyn SegmentConstraint>,
    ) -> Self {
        self.add_constraint(type_name, constraint);
        self
    }

    pub fn add_constraint(
        &mut self,
        type_name: impl Into<String>,
        constraint: Arc<dyn SegmentConstraint>,
    ) {
        self.constraints.insert(type_name, constraint);
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Compile `template` and append a route.
    pub fn add_route(
        &mut self,
        methods: impl Into<MethodSet>,
        template: &str,
        handler: HandlerRef,
        weight: i32,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<RouteId> {
        self.insert(methods.into(), template, handler, weight, middlewares, None)
    }

    /// Start a route with the builder API; finish it with [`RouteBuilder::add`].
    pub fn route(
        &mut self,
        methods: impl Into<MethodSet>,
        template: impl Into<String>,
        handler: HandlerRef,
    ) -> RouteBuilder<'_> {
        RouteBuilder {
            table: self,
            methods: methods.into(),
            template: template.into(),
            handler,
            weight: 0,
            middlewares: Vec::new(),
            name: None,
        }
    }

    fn insert(
        &mut self,
        methods: MethodSet,
        template: &str,
        handler: HandlerRef,
        weight: i32,
        middlewares: Vec<Arc<dyn Middleware>>,
        name: Option<String>,
    ) -> Result<RouteId> {
        let template = RouteTemplate::parse(template, &self.constraints)?;
        let id = RouteId(self.next_id);
        self.next_id += 1;

        debug!(
            route_id = id.0,
            methods = %methods,
            template = %template,
            weight = weight,
            middlewares = middlewares.len(),
            "Route registered"
        );

        self.entries.push(Arc::new(RouteEntry {
            id,
            template,
            methods,
            handler,
            weight,
            middlewares,
            name,
        }));
        Ok(id)
    }

    /// Entries in registration order. The iterator can be cloned to restart.
    pub fn routes(&self) -> Routes<'_> {
        Routes {
            inner: self.entries.iter(),
        }
    }

    pub(crate) fn entries(&self) -> &[Arc<RouteEntry>] {
        &self.entries
    }

    pub fn get(&self, id: RouteId) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.id == id).map(Arc::as_ref)
    }

    /// Look a route up by its name.
    pub fn named(&self, name: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .map(Arc::as_ref)
    }

    pub fn remove(&mut self, id: RouteId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add every route declared with [`route!`](crate::route).
    ///
    /// Returns the number of routes added. Declaration order across
    /// compilation units is unspecified.
    pub fn scan(&mut self) -> Result<usize> {
        let mut added = 0;
        for declaration in inventory::iter::<RouteDeclaration> {
            let methods = declaration.method_set()?;
            self.insert(
                methods,
                declaration.template,
                (declaration.handler)(),
                declaration.weight,
                Vec::new(),
                declaration.name.map(str::to_string),
            )?;
            added += 1;
        }
        debug!(routes = added, "Declared routes scanned");
        Ok(added)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.entries.len())
            .field("constraints", &self.constraints)
            .finish()
    }
}

/// Iterator over route entries; see [`RouteTable::routes`].
#[derive(Clone)]
pub struct Routes<'a> {
    inner: std::slice::Iter<'a, Arc<RouteEntry>>,
}

impl<'a> Iterator for Routes<'a> {
    type Item = &'a RouteEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Arc::as_ref)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Routes<'_> {}

/// Builder returned by [`RouteTable::route`].
#[must_use = "call .add() to register the route"]
pub struct RouteBuilder<'a> {
    table: &'a mut RouteTable,
    methods: MethodSet,
    template: String,
    handler: HandlerRef,
    weight: i32,
    middlewares: Vec<Arc<dyn Middleware>>,
    name: Option<String>,
}

impl RouteBuilder<'_> {
    /// Tie-break boost applied after specificity and method.
    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn add(self) -> Result<RouteId> {
        self.table.insert(
            self.methods,
            &self.template,
            self.handler,
            self.weight,
            self.middlewares,
            self.name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::EnumConstraint;
    use crate::{Error, HttpResponse};

    fn ok_handler() -> HandlerRef {
        HandlerRef::from_fn(|_req| async { Ok(HttpResponse::ok()) })
    }

    #[test]
    fn test_add_routes_in_order() {
        let mut table = RouteTable::new();
        let a = table
            .add_route(HttpMethod::GET, "/a", ok_handler(), 0, Vec::new())
            .unwrap();
        let b = table
            .route(MethodSet::Any, "/b", ok_handler())
            .weight(5)
            .name("bee")
            .add()
            .unwrap();

        assert_ne!(a, b);
        let templates: Vec<_> = table.routes().map(|r| r.template().as_str()).collect();
        assert_eq!(templates, vec!["/a", "/b"]);
        assert_eq!(table.named("bee").map(RouteEntry::weight), Some(5));
        assert_eq!(table.get(b).unwrap().describe(), "ANY /b (bee)");
    }

    #[test]
    fn test_routes_iterator_restarts() {
        let mut table = RouteTable::new();
        for path in ["/x", "/y", "/z"] {
            table
                .add_route(HttpMethod::GET, path, ok_handler(), 0, Vec::new())
                .unwrap();
        }
        let routes = table.routes();
        assert_eq!(routes.clone().count(), 3);
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut table = RouteTable::new();
        let err = table
            .add_route(HttpMethod::GET, "/users/{id}/{id}", ok_handler(), 0, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRouteTemplate { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_custom_constraint() {
        let mut table = RouteTable::new()
            .with_constraint("color", Arc::new(EnumConstraint::new(["red", "blue"])));
        assert!(
            table
                .add_route(HttpMethod::GET, "/paint/{c:color}", ok_handler(), 0, Vec::new())
                .is_ok()
        );
    }

    #[test]
    fn test_method_set() {
        let set = MethodSet::from([HttpMethod::GET, HttpMethod::HEAD]);
        assert!(set.contains("GET"));
        assert!(set.contains("head"));
        assert!(!set.contains("POST"));
        assert_eq!(set.to_string(), "GET|HEAD");
        assert!(MethodSet::Any.contains("PROPFIND"));
    }

    #[test]
    fn test_remove_route() {
        let mut table = RouteTable::new();
        let id = table
            .add_route(HttpMethod::GET, "/gone", ok_handler(), 0, Vec::new())
            .unwrap();
        assert!(table.remove(id));
        assert!(!table.remove(id));
        assert!(table.get(id).is_none());
    }
}
