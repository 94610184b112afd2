//! # Router Module
//!
//! Path matching and route resolution.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling `{name::type}` patterns into anchored regular expressions
//! - Matching requests against the table in registration order (first match
//!   wins)
//! - Answering `OPTIONS` with the methods registered for a path
//! - Coercing captured values and parsing the query string
//! - Handing the match to the [`dispatcher`](crate::dispatcher)
//!
//! ## Architecture
//!
//! Two phases:
//!
//! 1. **Compilation**: [`Router::new`] turns every [`Route`] descriptor into an
//!    immutable [`RouteEntry`] holding a [`RoutePattern`]. Bad patterns fail
//!    here, before any request is served.
//!
//! 2. **Matching**: for each request, [`Router::route`] scans the entries with
//!    the request's method and returns a fresh [`RouteMatch`] holding the
//!    typed parameters. Nothing is written back into the table, so a router
//!    can be shared across threads.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use serde_json::json;
//! use simpleapi::dispatcher::{handler_fn, Reply};
//! use simpleapi::router::{Route, Router};
//! use simpleapi::server::RequestContext;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new(
//!     "/api",
//!     vec![Route::get(
//!         "/users/{id::int}",
//!         handler_fn(|_ctx, p| Ok(Reply::json(json!({"user": p.get_i64("id")})))),
//!     )],
//! )?;
//!
//! let res = router
//!     .handle(RequestContext::new(Method::GET, "/api/users/42"))
//!     .expect("inside namespace");
//! assert_eq!(res.status, 200);
//! assert_eq!(res.json().unwrap()["user"], json!(42));
//! # Ok(())
//! # }
//! ```
//!
//! ## Performance
//!
//! Matching is O(n) in the number of routes with the request's method. A
//! match slower than 1ms is logged at WARN.

mod core;
pub mod pattern;

pub use core::{Route, RouteEntry, RouteMatch, Router};
pub use pattern::{ParamSpec, ParamType, RoutePattern};
