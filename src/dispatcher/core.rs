//! Dispatch boundary: runs the matched handler and turns whatever it produces
//! (reply, structured error, arbitrary error or panic) into a [`Response`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::borrow::Cow;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::params::Params;
use crate::router::RouteEntry;
use crate::server::request::RequestContext;
use crate::server::response::{error_response, json_response, text_response, Response};

/// Default `msg` of a successful reply.
pub const DEFAULT_SUCCESS_MSG: &str = "success";

/// What a handler produces on success.
///
/// Exactly one reply ends a request; the dispatcher renders it into the
/// success envelope (JSON) or a plain-text body.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Merged into `{status: 200, msg, queryTime, ...meta, ...data}`
    Json { data: Map<String, Value>, msg: String },
    /// Sent as `text/plain`; `msg` becomes the reason phrase
    Text { body: String, msg: String },
}

impl Reply {
    /// JSON reply with the default `success` message.
    ///
    /// Objects are merged into the envelope as-is; any other value is placed
    /// under a `data` key.
    #[must_use]
    pub fn json(data: Value) -> Self {
        Self::json_with_msg(data, DEFAULT_SUCCESS_MSG)
    }

    /// JSON reply with a custom message.
    #[must_use]
    pub fn json_with_msg(data: Value, msg: impl Into<String>) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Reply::Json {
            data,
            msg: msg.into(),
        }
    }

    /// JSON reply from any serializable value.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be represented as JSON.
    pub fn serialize<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Self::json(serde_json::to_value(value)?))
    }

    /// Plain-text reply with the default `success` message.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::text_with_msg(body, DEFAULT_SUCCESS_MSG)
    }

    #[must_use]
    pub fn text_with_msg(body: impl Into<String>, msg: impl Into<String>) -> Self {
        Reply::Text {
            body: body.into(),
            msg: msg.into(),
        }
    }
}

/// Result type returned by handlers.
///
/// Return an [`ApiError`] (via `?` or `.into()`) for a structured failure;
/// any other error is reported as a 500.
pub type HandlerResult = anyhow::Result<Reply>;

/// A request handler bound to a route.
///
/// Handlers receive the request context (to read the body and headers, or to
/// add response metadata and headers) and the typed parameters of the match.
/// Closures become handlers through [`handler_fn`].
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut RequestContext, params: &Params) -> HandlerResult;

    /// Identity reported in logs and in 500 error details.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Handler backed by a closure. See [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler")
            .field("fn", &std::any::type_name::<F>())
            .finish()
    }
}

/// Turn a closure into a [`Handler`].
///
/// ```rust
/// use serde_json::json;
/// use simpleapi::dispatcher::{handler_fn, Reply};
///
/// let show = handler_fn(|_ctx, params| Ok(Reply::json(json!({"id": params.get_i64("id")}))));
/// # let _ = show;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut RequestContext, &Params) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler { f }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut RequestContext, &Params) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut RequestContext, params: &Params) -> HandlerResult {
        (self.f)(ctx, params)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<F>())
    }
}

/// Run the route's handler and build the response.
///
/// Never panics and never returns an error: structured errors are propagated
/// verbatim, other errors and panics become a 500 envelope carrying the
/// handler identity, the message and a trace.
pub fn dispatch(route: &RouteEntry, ctx: &mut RequestContext, params: &Params) -> Response {
    let handler_name = route.handler_name();
    let request_id = ctx.request_id;

    info!(
        request_id = %request_id,
        handler_name = %handler_name,
        params = %params.to_value(),
        "Handler execution start"
    );

    let execution_start = Instant::now();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        route.handler().handle(ctx, params)
    }));
    let execution_time_us = execution_start.elapsed().as_micros() as u64;

    match outcome {
        Ok(Ok(reply)) => {
            info!(
                request_id = %request_id,
                handler_name = %handler_name,
                execution_time_us = execution_time_us,
                "Handler execution complete"
            );
            match reply {
                Reply::Json { data, msg } => json_response(ctx, &data, &msg),
                Reply::Text { body, msg } => text_response(ctx, &body, &msg),
            }
        }
        Ok(Err(err)) => match err.downcast::<ApiError>() {
            Ok(api_err) => {
                warn!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    status = api_err.code,
                    message = %api_err.message,
                    "Handler returned structured error"
                );
                error_response(ctx, &api_err)
            }
            Err(other) => {
                error!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    error = %other,
                    execution_time_us = execution_time_us,
                    "Handler failed"
                );
                error_response(ctx, &server_error(route, &other))
            }
        },
        Err(panic) => {
            let panic_message = panic_message(panic.as_ref());
            let backtrace = std::backtrace::Backtrace::capture();
            error!(
                request_id = %request_id,
                handler_name = %handler_name,
                panic_message = %panic_message,
                backtrace = %backtrace,
                "Handler panicked - CRITICAL"
            );
            let err = ApiError::internal("Server Error: Handler panicked")
                .with_detail("handler", handler_name)
                .with_detail("httpMethod", route.method().as_str())
                .with_detail("errorMessage", panic_message);
            error_response(ctx, &err)
        }
    }
}

/// Wrap an unstructured handler failure as a 500.
fn server_error(route: &RouteEntry, err: &anyhow::Error) -> ApiError {
    let handler_name = route.handler_name();
    let mut trace: Vec<Value> = err
        .chain()
        .skip(1)
        .map(|cause| Value::from(cause.to_string()))
        .collect();

    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        trace.extend(
            backtrace
                .to_string()
                .lines()
                .map(|line| Value::from(line.trim())),
        );
    }

    ApiError::internal(format!(
        "Server Error: While calling handler '{handler_name}'"
    ))
    .with_detail("handler", handler_name)
    .with_detail("httpMethod", route.method().as_str())
    .with_detail("errorMessage", err.to_string())
    .with_detail("trace", Value::Array(trace))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
