//! # Error Types
//!
//! Every failure the router can observe ends up in one of these types:
//!
//! - [`ApiError`] - a structured failure (status code, message, details) that
//!   is rendered verbatim into the JSON error envelope
//! - [`PatternError`] - a route pattern that cannot be compiled
//! - [`RouterError`] - a route table that cannot be constructed
//!
//! Handlers return `anyhow::Result`; an `ApiError` inside the `anyhow::Error`
//! is recovered by downcasting at the dispatch boundary and rendered verbatim,
//! anything else becomes a 500 "Server Error".
//!
//! `PatternError` and `RouterError` surface while the route table is being
//! built. Once a [`Router`](crate::router::Router) exists, every request
//! produces a response; errors never reach the transport.

use serde_json::{Map, Value};
use std::path::PathBuf;

/// Structured failure carried from a handler (or the router itself) to the
/// response layer.
///
/// `code` drives the HTTP status and `message` becomes both the `msg` field of
/// the envelope and the reason phrase of the status line. `details` are merged
/// into the top level of the JSON body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ApiError {
    /// Status-like code (default 500)
    pub code: u16,
    /// Human readable message
    pub message: String,
    /// Free-form details merged into the error envelope
    pub details: Map<String, Value>,
}

impl ApiError {
    /// Create an error with an explicit code and no details.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Create a 500 error, the default code for application failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Attach a details object.
    ///
    /// Non-object values are stored under a single `details` key so that they
    /// still survive the merge into the envelope.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        match details {
            Value::Object(map) => self.details = map,
            Value::Null => self.details = Map::new(),
            other => {
                self.details = Map::new();
                self.details.insert("details".to_string(), other);
            }
        }
        self
    }

    /// Add a single detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 404 returned when no route matches method and path.
    pub fn not_found(uri: &str, path: &str, query: &str) -> Self {
        Self::new(404, "Endpoint not found")
            .with_detail("uri", uri)
            .with_detail("path", path)
            .with_detail("query", query)
    }

    /// 500 for a handler that was referenced but never registered.
    pub fn handler_missing(handler: &str) -> Self {
        Self::internal("Server Error: Missing handler").with_detail("handler", handler)
    }
}

/// A route pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// `{name::type}` with a type other than `int`, `float` or `string`
    #[error("unknown type `{ty}` for placeholder `{name}` (expected int, float or string)")]
    UnknownType { name: String, ty: String },
    /// Opening brace without a closing one, or a placeholder whose name is
    /// empty or not an identifier
    #[error("malformed placeholder `{placeholder}`")]
    MalformedPlaceholder { placeholder: String },
    /// The same name used twice in one pattern
    #[error("placeholder `{name}` appears more than once")]
    DuplicateName { name: String },
    /// `query` is reserved for the parsed query string
    #[error("placeholder name `{name}` is reserved")]
    ReservedName { name: String },
    /// The generated regular expression was rejected
    #[error("pattern does not compile: {0}")]
    Regex(String),
}

/// A route table that cannot be constructed.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid pattern for {method} {pattern}: {source}")]
    InvalidPattern {
        method: String,
        pattern: String,
        #[source]
        source: PatternError,
    },
    #[error("handler `{name}` is not registered (route {method} {pattern})")]
    MissingHandler {
        name: String,
        method: String,
        pattern: String,
    },
    #[error("method `{0}` cannot be registered")]
    UnsupportedMethod(String),
    #[error("failed to read route config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse route config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
