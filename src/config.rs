//! # Route Table Configuration
//!
//! A route table can be declared in TOML instead of code. Each route names
//! its handler; names are resolved against a
//! [`HandlerRegistry`](crate::registry::HandlerRegistry) by
//! [`Router::from_config`](crate::router::Router::from_config).
//!
//! ```toml
//! namespace = "/api"
//!
//! [[routes]]
//! method = "GET"
//! pattern = "/items/{id::int}"
//! handler = "items.show"
//!
//! [[routes]]
//! method = "POST"
//! pattern = "/items"
//! handler = "items.create"
//! ```
//!
//! ## Environment Variables
//!
//! [`RouterConfig::apply_env`] lets deployment override file values:
//!
//! - `SIMPLEAPI_NAMESPACE` replaces `namespace`
//! - `SIMPLEAPI_ALLOW_MISSING_HANDLERS` (`true`/`false`) replaces
//!   `allow_missing_handlers`

use http::Method;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::RouterError;

/// Route table as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Path prefix claimed by the router (default: everything)
    #[serde(default)]
    pub namespace: String,
    /// Install a 500-returning stand-in for unregistered handler names
    /// instead of refusing to build the router
    #[serde(default)]
    pub allow_missing_handlers: bool,
    /// Routes in precedence order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// HTTP verb, case-insensitive
    pub method: String,
    pub pattern: String,
    /// Name the handler is registered under
    pub handler: String,
}

impl RouteConfig {
    /// The verb as an `http::Method`.
    ///
    /// # Errors
    ///
    /// [`RouterError::UnsupportedMethod`] when the verb is not a valid HTTP
    /// method token.
    pub fn method(&self) -> Result<Method, RouterError> {
        Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| RouterError::UnsupportedMethod(self.method.clone()))
    }
}

impl RouterConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// [`RouterError::ConfigParse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, RouterError> {
        let config: RouterConfig = toml::from_str(source)?;
        debug!(
            namespace = %config.namespace,
            routes_count = config.routes.len(),
            "Route config parsed"
        );
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// [`RouterError::ConfigRead`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| RouterError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            routes_count = config.routes.len(),
            "Route config loaded"
        );
        Ok(config)
    }

    /// Apply `SIMPLEAPI_*` overrides from the process environment.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// [`apply_env`](Self::apply_env)). Unparsable values are ignored.
    #[must_use]
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(namespace) = lookup("SIMPLEAPI_NAMESPACE") {
            debug!(namespace = %namespace, "Namespace overridden from environment");
            self.namespace = namespace;
        }
        if let Some(allow) = lookup("SIMPLEAPI_ALLOW_MISSING_HANDLERS")
            .and_then(|v| v.trim().parse::<bool>().ok())
        {
            self.allow_missing_handlers = allow;
        }
        self
    }
}
