use http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::ids::{RequestId, X_REQUEST_ID};

/// Per-request snapshot handed to the router by the transport.
///
/// Built explicitly (there is no ambient request state) and owned by a single
/// request. Handlers may add response metadata (`meta`) and custom headers;
/// both are merged into whichever envelope ends the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id for logs, echoed as `x-request-id`
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// `http` or `https`
    pub scheme: String,
    /// Protocol used in the status line (e.g. `HTTP/1.1`)
    pub protocol: String,
    /// Full request URI (path plus query string)
    pub uri: String,
    /// Path without query string
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    /// Raw body; only kept for methods that carry one (POST, PUT, PATCH)
    pub body: Option<String>,
    /// Request headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Metadata merged into every response envelope
    pub meta: Map<String, Value>,
    custom_headers: Vec<(String, String)>,
    start: Instant,
}

impl RequestContext {
    /// Start a context for `method` and `uri`; the clock for `queryTime`
    /// starts now.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let (path, query) = split_uri(&uri);
        Self {
            request_id: RequestId::new(),
            method,
            scheme: "http".to_string(),
            protocol: "HTTP/1.1".to_string(),
            path,
            query,
            uri,
            body: None,
            headers: HashMap::new(),
            meta: Map::new(),
            custom_headers: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Build a context from an `http::Request`.
    ///
    /// Headers are copied with lowercase names, an incoming `x-request-id` is
    /// reused when valid, and the body is decoded lossily as UTF-8 for methods
    /// that carry one.
    pub fn from_http<B: AsRef<[u8]>>(req: &http::Request<B>) -> Self {
        let uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect();

        let mut ctx = Self::new(req.method().clone(), uri);
        ctx.request_id =
            RequestId::from_header_or_new(headers.get(X_REQUEST_ID).map(String::as_str));
        ctx.scheme = req.uri().scheme_str().unwrap_or("http").to_string();
        ctx.protocol = format!("{:?}", req.version());
        ctx.headers = headers;

        let bytes = req.body().as_ref();
        if !bytes.is_empty() {
            ctx = ctx.with_body(String::from_utf8_lossy(bytes).to_string());
        }

        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            header_count = ctx.headers.len(),
            has_body = ctx.body.is_some(),
            "HTTP request parsed"
        );

        ctx
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Attach a raw body. Ignored for methods that do not carry one.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        if method_carries_body(&self.method) {
            self.body = Some(body.into());
        }
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Pre-populate a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// A request header, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is present but not valid JSON.
    pub fn json_body(&self) -> Result<Option<Value>, serde_json::Error> {
        self.body.as_deref().map(serde_json::from_str).transpose()
    }

    /// Add a metadata entry to the response envelope.
    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Add a custom response header.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.custom_headers.push((name.into(), value.into()));
    }

    /// Custom response headers in insertion order.
    #[must_use]
    pub fn custom_headers(&self) -> &[(String, String)] {
        &self.custom_headers
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Methods whose body is kept on the context.
#[must_use]
pub fn method_carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Split a request URI into path and query string, dropping any fragment.
fn split_uri(uri: &str) -> (String, String) {
    let without_fragment = uri.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (without_fragment.to_string(), String::new()),
    }
}
