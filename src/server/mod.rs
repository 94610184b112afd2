//! Transport-facing types.
//!
//! The router never talks to a socket. The host transport builds a
//! [`RequestContext`] for each request, passes it to
//! [`Router::handle`](crate::router::Router::handle) and writes the returned
//! [`Response`] (status line, headers, JSON or plain-text body).

pub mod request;
pub mod response;

pub use request::{method_carries_body, RequestContext};
pub use response::{
    error_response, json_response, options_response, status_reason, text_response, Body,
    Response, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT,
};
