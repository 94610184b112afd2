//! # simpleapi
//!
//! A small HTTP request router: declarative path patterns with typed
//! placeholders, first-match-wins dispatch to handlers, and one JSON envelope
//! shape for every success, error and `OPTIONS` answer.
//!
//! ## Overview
//!
//! The transport stays outside this crate. A host builds a
//! [`RequestContext`](server::RequestContext) (or converts an
//! `http::Request`), calls [`Router::handle`](router::Router::handle), and
//! writes the returned [`Response`](server::Response) back. Requests outside
//! the router's namespace come back as `None`.
//!
//! ## Architecture
//!
//! - **[`router`]** - pattern compilation, the ordered route table, matching
//!   and `OPTIONS` aggregation
//! - **[`params`]** - path parameter coercion and query string parsing
//! - **[`dispatcher`]** - the [`Handler`](dispatcher::Handler) trait and the
//!   boundary that turns replies, errors and panics into responses
//! - **[`server`]** - request context and response envelope builders
//! - **[`registry`]** / **[`config`]** - route tables declared in TOML with
//!   handlers resolved by name
//! - **[`error`]** - structured API errors and construction errors
//! - **[`ids`]** - ULID request ids
//! - **[`telemetry`]** - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use http::Method;
//! use serde_json::json;
//! use simpleapi::dispatcher::{handler_fn, Reply};
//! use simpleapi::error::ApiError;
//! use simpleapi::router::{Route, Router};
//! use simpleapi::server::RequestContext;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new(
//!     "/api",
//!     vec![
//!         Route::get(
//!             "/items/{id::int}",
//!             handler_fn(|_ctx, p| Ok(Reply::json(json!({"id": p.get_i64("id")})))),
//!         ),
//!         Route::delete(
//!             "/items/{id::int}",
//!             handler_fn(|_ctx, _p| {
//!                 Err(ApiError::new(403, "Forbidden")
//!                     .with_details(json!({"reason": "forbidden"}))
//!                     .into())
//!             }),
//!         ),
//!     ],
//! )?;
//!
//! let ok = router.handle(RequestContext::new(Method::GET, "/api/items/7")).unwrap();
//! assert_eq!(ok.json().unwrap()["id"], json!(7));
//!
//! let denied = router.handle(RequestContext::new(Method::DELETE, "/api/items/7")).unwrap();
//! assert_eq!(denied.status, 403);
//! assert_eq!(denied.json().unwrap()["reason"], json!("forbidden"));
//!
//! assert!(router.handle(RequestContext::new(Method::GET, "/elsewhere")).is_none());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod params;
pub mod registry;
pub mod router;
pub mod server;
pub mod telemetry;

pub use config::RouterConfig;
pub use dispatcher::{handler_fn, Handler, HandlerResult, Reply};
pub use error::{ApiError, RouterError};
pub use params::Params;
pub use registry::HandlerRegistry;
pub use router::{Route, Router};
pub use server::{RequestContext, Response};
