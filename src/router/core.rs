//! Route table and registration API.
//!
//! Routes are appended in registration order and matched first-come,
//! first-served. Group prefixes and group middleware are carried by an
//! immutable [`RegistrationContext`] that is cloned and extended for each
//! nested group, so no registration state outlives the closure that uses it.

use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::matcher::{PathMatcher, PathParams};
use super::RouterError;
use crate::dispatcher::Handler;
use crate::middleware::MiddlewareRef;

/// One `(method, template, handler, middleware)` binding.
///
/// Built at registration time with the group prefix and group middleware
/// already applied; never modified afterwards.
#[derive(Clone)]
pub struct Route {
    method: Method,
    matcher: PathMatcher,
    handler: Handler,
    middleware: Arc<[MiddlewareRef]>,
}

impl Route {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full template including any group prefixes.
    #[must_use]
    pub fn path(&self) -> &str {
        self.matcher.template()
    }

    #[must_use]
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Middleware in execution order: outer groups first, route-specific last.
    #[must_use]
    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    /// Names of the attached middleware, in execution order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Method equality plus a successful path match.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if self.method != *method {
            return None;
        }
        self.matcher.captures(path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("handler", &self.handler.name())
            .field("middleware", &self.middleware_names())
            .finish()
    }
}

/// Accumulated group state in effect while registering routes.
///
/// Prefixes concatenate left to right and middleware lists concatenate from
/// the outermost group inwards. Nesting produces a new value; the parent
/// context is never touched.
#[derive(Clone, Default)]
pub struct RegistrationContext {
    prefix: String,
    middleware: Vec<MiddlewareRef>,
}

impl RegistrationContext {
    /// The empty context used at the top level of a [`Router`].
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    /// Derive the context for a nested group.
    #[must_use]
    pub fn nest(&self, prefix: &str, middleware: &[MiddlewareRef]) -> Self {
        let mut nested = self.clone();
        nested.prefix.push_str(prefix);
        nested.middleware.extend(middleware.iter().cloned());
        nested
    }

    /// Expand a route declaration under this context.
    fn build(
        &self,
        method: Method,
        path: &str,
        handler: Handler,
        middleware: &[MiddlewareRef],
    ) -> Result<Route, RouterError> {
        let full_path = format!("{}{}", self.prefix, path);
        let matcher = PathMatcher::compile(&full_path)?;
        let chain: Vec<MiddlewareRef> = self
            .middleware
            .iter()
            .chain(middleware.iter())
            .cloned()
            .collect();
        Ok(Route {
            method,
            matcher,
            handler,
            middleware: chain.into(),
        })
    }
}

impl fmt::Debug for RegistrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationContext")
            .field("prefix", &self.prefix)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Registration surface shared by [`Router`] and [`RouteGroup`].
///
/// Implementors only expose where routes go and which context applies; every
/// helper is provided.
pub trait Registrar {
    /// The table being filled and the context routes registered here inherit.
    fn parts(&mut self) -> (&mut Vec<Route>, RegistrationContext);

    /// Append a route under the current context.
    ///
    /// No duplicate or conflict detection is performed: an earlier route
    /// always shadows a later one for the same request.
    fn register<H: Into<Handler>>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        let (routes, ctx) = self.parts();
        let route = ctx.build(method, path, handler.into(), middleware)?;
        debug!(
            method = %route.method(),
            path = %route.path(),
            handler = %route.handler().name(),
            middleware = ?route.middleware_names(),
            position = routes.len(),
            "Route registered"
        );
        routes.push(route);
        Ok(())
    }

    fn get<H: Into<Handler>>(
        &mut self,
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        self.register(Method::GET, path, handler, middleware)
    }

    fn post<H: Into<Handler>>(
        &mut self,
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        self.register(Method::POST, path, handler, middleware)
    }

    fn put<H: Into<Handler>>(
        &mut self,
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        self.register(Method::PUT, path, handler, middleware)
    }

    fn delete<H: Into<Handler>>(
        &mut self,
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        self.register(Method::DELETE, path, handler, middleware)
    }

    /// Register the same handler under several verbs, in the order given.
    ///
    /// Verbs are uppercased before they are stored, so `"patch"` registers
    /// `PATCH`.
    fn match_methods<H: Into<Handler>>(
        &mut self,
        methods: &[&str],
        path: &str,
        handler: H,
        middleware: &[MiddlewareRef],
    ) -> Result<(), RouterError> {
        let handler = handler.into();
        for verb in methods {
            let upper = verb.to_ascii_uppercase();
            let method = Method::from_bytes(upper.as_bytes())
                .map_err(|_| RouterError::InvalidMethod { method: (*verb).to_string() })?;
            self.register(method, path, handler.clone(), middleware)?;
        }
        Ok(())
    }

    /// Register routes under a prefix and extra middleware.
    ///
    /// The closure receives a [`RouteGroup`] whose context is this one
    /// extended by `prefix` and `middleware`; it may nest further groups.
    fn group<F>(&mut self, prefix: &str, middleware: &[MiddlewareRef], f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> Result<(), RouterError>,
    {
        let (routes, ctx) = self.parts();
        let mut group = RouteGroup {
            routes,
            ctx: ctx.nest(prefix, middleware),
        };
        f(&mut group)
    }
}

/// Registration handle scoped to a group context.
pub struct RouteGroup<'r> {
    routes: &'r mut Vec<Route>,
    ctx: RegistrationContext,
}

impl RouteGroup<'_> {
    #[must_use]
    pub fn context(&self) -> &RegistrationContext {
        &self.ctx
    }
}

impl Registrar for RouteGroup<'_> {
    fn parts(&mut self) -> (&mut Vec<Route>, RegistrationContext) {
        (&mut *self.routes, self.ctx.clone())
    }
}

/// Result of matching a request against the table.
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    /// The winning route
    pub route: &'r Route,
    /// Position of the route in registration order
    pub index: usize,
    /// Captured placeholders in declaration order
    pub params: PathParams,
}

/// Ordered route table.
///
/// Append-only while the application is being wired, read-only afterwards.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Registrar for Router {
    fn parts(&mut self) -> (&mut Vec<Route>, RegistrationContext) {
        (&mut self.routes, RegistrationContext::root())
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered routes in priority order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Human-readable listing of the table, one line per route.
    #[must_use]
    pub fn dump_routes(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| {
                let mw = r.middleware_names();
                if mw.is_empty() {
                    format!("{:<7} {} -> {}", r.method().as_str(), r.path(), r.handler().name())
                } else {
                    format!(
                        "{:<7} {} -> {} [{}]",
                        r.method().as_str(),
                        r.path(),
                        r.handler().name(),
                        mw.join(", ")
                    )
                }
            })
            .collect()
    }

    /// Find the first route whose method and template both match.
    ///
    /// `path` must be the decoded URL path without its query string. Later
    /// routes are not inspected once a match is found.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        debug!(method = %method, path = %path, candidates = self.routes.len(), "Route match attempt");
        let start = Instant::now();

        let found = self
            .routes
            .iter()
            .enumerate()
            .find_map(|(index, route)| route.matches(method, path).map(|params| (index, route, params)));

        let elapsed = start.elapsed();
        match found {
            Some((index, route, params)) => {
                if elapsed > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        route_pattern = %route.path(),
                        duration_us = elapsed.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    info!(
                        method = %method,
                        path = %path,
                        route_pattern = %route.path(),
                        route_index = index,
                        path_params = ?params,
                        duration_us = elapsed.as_micros(),
                        "Route matched"
                    );
                }
                Some(RouteMatch { route, index, params })
            }
            None => {
                info!(
                    method = %method,
                    path = %path,
                    duration_us = elapsed.as_micros(),
                    "No route matched"
                );
                None
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}
