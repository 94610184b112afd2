use http::{Method, StatusCode};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::ids::X_REQUEST_ID;
use crate::server::request::RequestContext;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Response body: a JSON envelope or plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

/// Finished response handed back to the transport.
///
/// Producing a `Response` ends the request: the router never emits a second
/// one, so the first write wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase for the status line (`msg` of the envelope)
    pub reason: String,
    /// Protocol copied from the request (e.g. `HTTP/1.1`)
    pub protocol: String,
    /// Headers in emission order
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    /// The status line, e.g. `HTTP/1.1 404 Endpoint not found`.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("{} {} {}", self.protocol, self.status, self.reason)
    }

    /// A header by name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The JSON body, if this is a JSON response.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            Body::Text(_) => None,
        }
    }

    /// Serialized body bytes.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            Body::Json(v) => v.to_string().into_bytes(),
            Body::Text(s) => s.clone().into_bytes(),
        }
    }

    /// Convert into an `http::Response` for the transport.
    ///
    /// `http::Response` has no room for a custom reason phrase, so
    /// [`reason`](Self::reason) is dropped and the transport writes the
    /// canonical phrase for the status. Hosts that need the envelope's phrase
    /// on the wire should write [`status_line`](Self::status_line) themselves.
    ///
    /// # Errors
    ///
    /// Fails if a custom header name or value is not valid HTTP.
    pub fn into_http(self) -> Result<http::Response<Vec<u8>>, http::Error> {
        let body = self.body_bytes();
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = http::Response::builder().status(status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(body)
    }
}

/// Canonical reason phrase for a status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Codes outside the HTTP range are reported as 500.
fn effective_status(code: u16) -> u16 {
    if (100..=599).contains(&code) {
        code
    } else {
        500
    }
}

/// Reason phrase safe for a status line: control characters (CR, LF, ...)
/// become spaces.
fn reason_phrase(msg: &str) -> String {
    msg.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn round4(secs: f64) -> f64 {
    (secs * 10_000.0).round() / 10_000.0
}

fn base_headers(ctx: &RequestContext, content_type: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = ctx.custom_headers().to_vec();
    headers.push(("Content-Type".to_string(), content_type.to_string()));
    headers.push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));
    headers.push((X_REQUEST_ID.to_string(), ctx.request_id.to_string()));
    headers
}

fn merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (k, v) in source {
        target.insert(k.clone(), v.clone());
    }
}

/// Error envelope: `{status, msg, ...meta, ...details}`.
///
/// The status line uses the error message as reason phrase, falling back to
/// the canonical phrase when the message is empty. Control characters in the
/// message are replaced in the reason phrase only; `msg` keeps them.
#[must_use]
pub fn error_response(ctx: &RequestContext, err: &ApiError) -> Response {
    let status = effective_status(err.code);
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from(status));
    body.insert("msg".to_string(), Value::from(err.message.as_str()));
    merge(&mut body, &ctx.meta);
    merge(&mut body, &err.details);

    let reason = if err.message.is_empty() {
        status_reason(status).to_string()
    } else {
        reason_phrase(&err.message)
    };

    Response {
        status,
        reason,
        protocol: ctx.protocol.clone(),
        headers: base_headers(ctx, CONTENT_TYPE_JSON),
        body: Body::Json(Value::Object(body)),
    }
}

/// Success envelope: `{status: 200, msg, queryTime, ...meta, ...data}`.
///
/// `queryTime` is the time since the context was created, in seconds rounded
/// to four decimals.
#[must_use]
pub fn json_response(ctx: &RequestContext, data: &Map<String, Value>, msg: &str) -> Response {
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from(200));
    body.insert("msg".to_string(), Value::from(msg));
    body.insert(
        "queryTime".to_string(),
        Value::from(round4(ctx.elapsed().as_secs_f64())),
    );
    merge(&mut body, &ctx.meta);
    merge(&mut body, data);

    Response {
        status: 200,
        reason: "success".to_string(),
        protocol: ctx.protocol.clone(),
        headers: base_headers(ctx, CONTENT_TYPE_JSON),
        body: Body::Json(Value::Object(body)),
    }
}

/// Plain-text response; `msg` becomes the reason phrase.
#[must_use]
pub fn text_response(ctx: &RequestContext, text: &str, msg: &str) -> Response {
    Response {
        status: 200,
        reason: reason_phrase(msg),
        protocol: ctx.protocol.clone(),
        headers: base_headers(ctx, CONTENT_TYPE_TEXT),
        body: Body::Text(text.to_string()),
    }
}

/// Preflight answer: `{status: 200, query_time, ...meta}` plus
/// `Access-Control-Allow-Methods` listing `methods` in order.
#[must_use]
pub fn options_response(ctx: &RequestContext, methods: &[Method]) -> Response {
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from(200));
    body.insert(
        "query_time".to_string(),
        Value::from(round4(ctx.elapsed().as_secs_f64())),
    );
    merge(&mut body, &ctx.meta);

    let allowed = methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut headers = base_headers(ctx, CONTENT_TYPE_JSON);
    headers.push(("Access-Control-Allow-Headers".to_string(), "*".to_string()));
    headers.push(("Access-Control-Allow-Methods".to_string(), allowed));

    Response {
        status: 200,
        reason: "success".to_string(),
        protocol: ctx.protocol.clone(),
        headers,
        body: Body::Json(Value::Object(body)),
    }
}
