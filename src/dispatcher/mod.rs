//! # Dispatcher Module
//!
//! Runs the handler of a matched route and converts its outcome into a
//! [`Response`](crate::server::Response).
//!
//! ## Handler Contract
//!
//! A handler implements [`Handler`] (or is a closure wrapped by
//! [`handler_fn`]). It receives the mutable [`RequestContext`] and the typed
//! [`Params`] of the match and returns a [`HandlerResult`]:
//!
//! - `Ok(Reply::Json { .. })` - success envelope
//! - `Ok(Reply::Text { .. })` - plain-text body
//! - `Err(ApiError)` - structured failure, code/message/details propagated verbatim
//! - any other `Err` - 500 "Server Error" with handler identity, message and trace
//!
//! ## Error Handling
//!
//! - Structured errors are recovered from `anyhow::Error` by downcast
//! - Handler panics are caught and become 500 responses
//! - Nothing escapes to the transport
//!
//! [`RequestContext`]: crate::server::RequestContext
//! [`Params`]: crate::params::Params

mod core;

pub use core::{
    dispatch, handler_fn, FnHandler, Handler, HandlerResult, Reply, DEFAULT_SUCCESS_MSG,
};
