//! Router core: route descriptors, the compiled route table and first-match
//! resolution.

use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::pattern::RoutePattern;
use crate::config::RouterConfig;
use crate::dispatcher::{dispatch, Handler};
use crate::error::{ApiError, RouterError};
use crate::params::{coerce_path_params, parse_query_string, Params};
use crate::registry::{HandlerRegistry, MissingHandler};
use crate::server::request::RequestContext;
use crate::server::response::{error_response, options_response, Response};

/// Methods a route may be registered for. `OPTIONS` is answered by the router
/// itself.
const SUPPORTED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
];

/// Matching slower than this is logged as a warning.
const SLOW_MATCH: Duration = Duration::from_millis(1);

/// Route descriptor: method, pattern and handler, not yet compiled.
///
/// Built with one factory per verb and handed to [`Router::new`], which
/// compiles the pattern once.
///
/// ```rust
/// use serde_json::json;
/// use simpleapi::dispatcher::{handler_fn, Reply};
/// use simpleapi::router::{Route, Router};
///
/// let router = Router::new(
///     "/api",
///     vec![Route::get(
///         "/items/{id::int}",
///         handler_fn(|_ctx, p| Ok(Reply::json(json!({"id": p.get_i64("id")})))),
///     )
///     .named("items.show")],
/// )
/// .unwrap();
/// assert_eq!(router.routes().len(), 1);
/// ```
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    handler: Arc<dyn Handler>,
    handler_name: String,
}

impl Route {
    /// Describe a route for any method.
    pub fn new(method: Method, pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::from_arc(method, pattern, Arc::new(handler))
    }

    /// Describe a route around an already shared handler.
    pub fn from_arc(method: Method, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let handler_name = handler.name().into_owned();
        Self {
            method,
            pattern: pattern.into(),
            handler,
            handler_name,
        }
    }

    pub fn get(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, pattern, handler)
    }

    pub fn post(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, pattern, handler)
    }

    pub fn put(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, pattern, handler)
    }

    pub fn delete(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, pattern, handler)
    }

    pub fn patch(pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, pattern, handler)
    }

    /// Override the handler identity used in logs and error details.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Compiled, immutable entry of the route table.
pub struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    handler: Arc<dyn Handler>,
    handler_name: String,
}

impl RouteEntry {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    #[must_use]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw())
            .field("regex", &self.pattern.regex_str())
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Result of resolving a request to a route.
///
/// Request-scoped: the typed parameters live here, never on the shared
/// [`RouteEntry`].
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route
    pub route: Arc<RouteEntry>,
    /// Coerced path parameters plus the parsed query string
    pub params: Params,
}

/// Ordered route table with first-match-wins resolution.
///
/// Read-only after construction; clones share the compiled entries, so one
/// router can serve any number of concurrent requests without locking.
#[derive(Debug, Clone)]
pub struct Router {
    namespace: String,
    routes: Vec<Arc<RouteEntry>>,
}

impl Router {
    /// Compile `routes` under `namespace`.
    ///
    /// Trailing slashes are trimmed from the namespace. Registration order is
    /// kept: it decides precedence between overlapping patterns.
    ///
    /// # Errors
    ///
    /// Fails on the first pattern that does not compile or on a route
    /// registered for `OPTIONS` (or another unsupported method).
    pub fn new(namespace: &str, routes: Vec<Route>) -> Result<Self, RouterError> {
        let namespace = namespace.trim_end_matches('/').to_string();
        let mut entries: Vec<Arc<RouteEntry>> = Vec::with_capacity(routes.len());

        for route in routes {
            if !SUPPORTED_METHODS.contains(&route.method) {
                return Err(RouterError::UnsupportedMethod(route.method.to_string()));
            }
            let pattern =
                RoutePattern::compile(&route.pattern).map_err(|source| {
                    RouterError::InvalidPattern {
                        method: route.method.to_string(),
                        pattern: route.pattern.clone(),
                        source,
                    }
                })?;

            if entries
                .iter()
                .any(|e| e.method == route.method && e.pattern.raw() == pattern.raw())
            {
                warn!(
                    method = %route.method,
                    pattern = %route.pattern,
                    handler_name = %route.handler_name,
                    "Duplicate route is shadowed by an earlier registration"
                );
            }

            entries.push(Arc::new(RouteEntry {
                method: route.method,
                pattern,
                handler: route.handler,
                handler_name: route.handler_name,
            }));
        }

        let router = Self {
            namespace,
            routes: entries,
        };

        info!(
            routes_count = router.routes.len(),
            namespace = %router.namespace,
            routes_summary = ?router.route_summary().into_iter().take(10).collect::<Vec<_>>(),
            "Routing table loaded"
        );

        Ok(router)
    }

    /// Build a router from a route config, resolving handler names against
    /// `registry`.
    ///
    /// # Errors
    ///
    /// [`RouterError::MissingHandler`] when a route names a handler that is
    /// not registered, plus everything [`Router::new`] rejects.
    pub fn from_config(
        config: &RouterConfig,
        registry: &HandlerRegistry,
    ) -> Result<Self, RouterError> {
        let routes = config
            .routes
            .iter()
            .map(|rc| -> Result<Route, RouterError> {
                let method = rc.method()?;
                let handler: Arc<dyn Handler> = match registry.get(&rc.handler) {
                    Some(handler) => handler,
                    None if config.allow_missing_handlers => {
                        warn!(
                            handler_name = %rc.handler,
                            method = %rc.method,
                            pattern = %rc.pattern,
                            "Handler not registered, route will answer 500"
                        );
                        Arc::new(MissingHandler::new(rc.handler.as_str()))
                    }
                    None => {
                        return Err(RouterError::MissingHandler {
                            name: rc.handler.clone(),
                            method: rc.method.clone(),
                            pattern: rc.pattern.clone(),
                        })
                    }
                };
                Ok(Route::from_arc(method, rc.pattern.as_str(), handler).named(rc.handler.as_str()))
            })
            .collect::<Result<Vec<_>, RouterError>>()?;

        Self::new(&config.namespace, routes)
    }

    /// Namespace every claimed path starts with (no trailing slash).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Compiled routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<RouteEntry>] {
        &self.routes
    }

    /// `METHOD namespace+pattern -> handler` for every route.
    #[must_use]
    pub fn route_summary(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| {
                format!(
                    "{} {}{} -> {}",
                    r.method,
                    self.namespace,
                    r.pattern.raw(),
                    r.handler_name
                )
            })
            .collect()
    }

    /// Log every registered route.
    pub fn dump_routes(&self) {
        info!(
            namespace = %self.namespace,
            count = self.routes.len(),
            "Registered routes"
        );
        for line in self.route_summary() {
            info!(route = %line, "Route");
        }
    }

    /// Strip the namespace from `path`.
    ///
    /// Returns `None` when the path lies outside the namespace; an empty
    /// remainder is reported as `/`.
    #[must_use]
    pub fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.namespace.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') || self.namespace.is_empty() {
            Some(rest)
        } else {
            // `/apiary` is not inside `/api`
            None
        }
    }

    /// Methods of every route whose pattern structurally matches `path`
    /// (namespace already stripped), in registration order without
    /// duplicates.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for entry in &self.routes {
            if entry.pattern.is_match(path) && !methods.contains(&entry.method) {
                methods.push(entry.method.clone());
            }
        }
        methods
    }

    /// Resolve `method` + `path` (namespace already stripped) to the first
    /// matching route and coerce its parameters.
    ///
    /// Routes are scanned in registration order; the first one with the same
    /// method whose pattern matches wins, even if a later route would also
    /// match. Coercion never rejects a match: a value without a numeric
    /// prefix becomes `0` (or `0.0`) and the winning handler still runs.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str, query: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        let found = self
            .routes
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| entry.pattern.capture(path).map(|caps| (entry, caps)));

        let match_duration = match_start.elapsed();

        let Some((entry, captured)) = found else {
            warn!(
                method = %method,
                path = %path,
                duration_us = match_duration.as_micros(),
                "No route matched"
            );
            return None;
        };

        if match_duration > SLOW_MATCH {
            warn!(
                method = %method,
                path = %path,
                handler_name = %entry.handler_name,
                route_pattern = %entry.pattern.raw(),
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        } else {
            info!(
                method = %method,
                path = %path,
                handler_name = %entry.handler_name,
                route_pattern = %entry.pattern.raw(),
                duration_us = match_duration.as_micros(),
                "Route matched"
            );
        }

        let path_params = coerce_path_params(&entry.pattern, &captured);

        Some(RouteMatch {
            route: Arc::clone(entry),
            params: Params::new(path_params, parse_query_string(query)),
        })
    }

    /// Handle one request end to end.
    ///
    /// Returns `None` when the path is outside the namespace, leaving the
    /// request to the host. Otherwise exactly one response is produced:
    ///
    /// - `OPTIONS`: 200 listing the methods of every structurally matching
    ///   route (no handler runs); the list is empty when nothing matches
    /// - no matching route: 404 "Endpoint not found" with `uri`, `path`,
    ///   `query`
    /// - otherwise whatever the handler produced
    pub fn handle(&self, mut ctx: RequestContext) -> Option<Response> {
        let Some(path) = self.relative_path(&ctx.path).map(str::to_string) else {
            debug!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                namespace = %self.namespace,
                "Request outside namespace"
            );
            return None;
        };

        if ctx.method == Method::OPTIONS {
            let methods = self.allowed_methods(&path);
            debug!(
                request_id = %ctx.request_id,
                path = %path,
                allowed = ?methods,
                "Answering preflight"
            );
            return Some(options_response(&ctx, &methods));
        }

        let response = match self.route(&ctx.method, &path, &ctx.query) {
            Some(matched) => dispatch(&matched.route, &mut ctx, &matched.params),
            None => {
                let err = ApiError::not_found(&ctx.uri, &ctx.path, &ctx.query);
                error_response(&ctx, &err)
            }
        };

        Some(response)
    }
}
