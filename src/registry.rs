//! Named handler lookup for config-driven route tables.
//!
//! Code-built routers attach handlers directly to their [`Route`]s. When the
//! route table comes from a [`RouterConfig`], routes name their handler and
//! the names are resolved here once, while the router is constructed.
//!
//! [`Route`]: crate::router::Route
//! [`RouterConfig`]: crate::config::RouterConfig

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::{Handler, HandlerResult};
use crate::error::ApiError;
use crate::params::Params;
use crate::server::request::RequestContext;

/// Handlers keyed by the name routes refer to them with.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Handler) -> &mut Self {
        self.register_arc(name, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> &mut Self {
        let name = name.into();
        debug!(handler_name = %name, "Registering handler");
        self.handlers.insert(name, handler);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

/// Stand-in for a route whose handler name resolved to nothing.
///
/// Only installed when the config allows missing handlers; every request it
/// receives fails with 500 "Server Error: Missing handler".
#[derive(Debug, Clone)]
pub struct MissingHandler {
    name: String,
}

impl MissingHandler {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Handler for MissingHandler {
    fn handle(&self, _ctx: &mut RequestContext, _params: &Params) -> HandlerResult {
        Err(ApiError::handler_missing(&self.name).into())
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name.clone())
    }
}
