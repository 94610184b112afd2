//! Tests for the dispatch boundary
//!
//! # Test Coverage
//!
//! - Success envelope (`status`, `msg`, `queryTime`, meta, data)
//! - Structured errors propagated verbatim
//! - Unstructured errors wrapped as 500 with handler details
//! - Panic recovery
//! - Plain-text replies, custom headers and request ids
//! - Request bodies reaching the handler

use anyhow::Context;
use http::Method;
use serde_json::{json, Value};
use simpleapi::dispatcher::{handler_fn, Handler, HandlerResult, Reply};
use simpleapi::error::ApiError;
use simpleapi::ids::RequestId;
use simpleapi::params::Params;
use simpleapi::router::{Route, Router};
use simpleapi::server::{Body, RequestContext, Response};

fn single(route: Route) -> Router {
    Router::new("/api", vec![route]).unwrap()
}

fn call(router: &Router, ctx: RequestContext) -> Response {
    router.handle(ctx).expect("inside namespace")
}

fn get(router: &Router, uri: &str) -> Response {
    call(router, RequestContext::new(Method::GET, uri))
}

fn body(res: &Response) -> &Value {
    res.json().expect("json body")
}

#[test]
fn test_success_envelope() {
    let router = single(Route::get(
        "/items/{id::int}",
        handler_fn(|_ctx, p| Ok(Reply::json(json!({"id": p.get_i64("id"), "name": "lamp"})))),
    ));
    let res = get(&router, "/api/items/3");

    assert_eq!(res.status, 200);
    assert_eq!(res.status_line(), "HTTP/1.1 200 success");
    assert_eq!(res.header("Content-Type"), Some("application/json"));
    let b = body(&res);
    assert_eq!(b["status"], json!(200));
    assert_eq!(b["msg"], json!("success"));
    assert_eq!(b["id"], json!(3));
    assert_eq!(b["name"], json!("lamp"));
    assert!(b["queryTime"].as_f64().unwrap() >= 0.0);
}

#[test]
fn test_custom_success_message() {
    let router = single(Route::post(
        "/items",
        handler_fn(|_ctx, _p| Ok(Reply::json_with_msg(json!({"id": 1}), "created"))),
    ));
    let res = call(&router, RequestContext::new(Method::POST, "/api/items"));
    assert_eq!(res.status, 200);
    assert_eq!(res.status_line(), "HTTP/1.1 200 success");
    assert_eq!(body(&res)["msg"], json!("created"));
}

#[test]
fn test_structured_error_is_propagated_verbatim() {
    let router = single(Route::delete(
        "/items/{id::int}",
        handler_fn(|_ctx, _p| {
            Err(ApiError::new(403, "Forbidden")
                .with_details(json!({"reason": "forbidden"}))
                .into())
        }),
    ));
    let res = call(&router, RequestContext::new(Method::DELETE, "/api/items/9"));

    assert_eq!(res.status, 403);
    assert_eq!(res.status_line(), "HTTP/1.1 403 Forbidden");
    assert_eq!(
        body(&res),
        &json!({"status": 403, "msg": "Forbidden", "reason": "forbidden"})
    );
}

#[test]
fn test_structured_error_via_question_mark() {
    fn lookup(id: i64) -> Result<&'static str, ApiError> {
        Err(ApiError::new(404, "Item not found").with_detail("id", id))
    }
    let router = single(Route::get(
        "/items/{id::int}",
        handler_fn(|_ctx, p| {
            let name = lookup(p.get_i64("id").unwrap_or_default())?;
            Ok(Reply::text(name))
        }),
    ));
    let res = get(&router, "/api/items/12");
    assert_eq!(res.status, 404);
    assert_eq!(body(&res)["id"], json!(12));
}

#[test]
fn test_unstructured_error_becomes_500() {
    let router = single(
        Route::get(
            "/items",
            handler_fn(|_ctx, _p| {
                let parsed: HandlerResult = "x"
                    .parse::<i32>()
                    .context("loading items")
                    .map(|n| Reply::json(json!({ "n": n })));
                parsed
            }),
        )
        .named("items.list"),
    );
    let res = get(&router, "/api/items");
    let b = body(&res);

    assert_eq!(res.status, 500);
    assert_eq!(
        b["msg"],
        json!("Server Error: While calling handler 'items.list'")
    );
    assert_eq!(b["handler"], json!("items.list"));
    assert_eq!(b["httpMethod"], json!("GET"));
    assert!(b.get("method").is_none());
    assert_eq!(b["errorMessage"], json!("loading items"));
    let trace = b["trace"].as_array().unwrap();
    assert_eq!(trace[0], json!("invalid digit found in string"));
}

#[test]
fn test_panic_becomes_500() {
    let router = single(
        Route::get(
            "/boom",
            handler_fn(|_ctx, _p| -> HandlerResult { panic!("kaboom") }),
        )
        .named("boom"),
    );
    let res = get(&router, "/api/boom");
    let b = body(&res);

    assert_eq!(res.status, 500);
    assert_eq!(b["msg"], json!("Server Error: Handler panicked"));
    assert_eq!(b["handler"], json!("boom"));
    assert_eq!(b["httpMethod"], json!("GET"));
    assert_eq!(b["errorMessage"], json!("kaboom"));

    // the router survives the panic
    let res = get(&router, "/api/boom");
    assert_eq!(res.status, 500);
}

#[test]
fn test_text_reply() {
    let router = single(Route::get(
        "/ping",
        handler_fn(|_ctx, _p| Ok(Reply::text_with_msg("pong", "alive"))),
    ));
    let res = get(&router, "/api/ping");
    assert_eq!(res.status_line(), "HTTP/1.1 200 alive");
    assert_eq!(res.header("content-type"), Some("text/plain"));
    assert_eq!(res.body, Body::Text("pong".into()));
}

#[test]
fn test_meta_and_headers_reach_every_envelope() {
    let router = single(Route::get(
        "/items/{id::int}",
        handler_fn(|ctx, p| {
            ctx.add_meta("version", "v1");
            ctx.add_header("X-Cache", "miss");
            if p.get_i64("id") == Some(0) {
                return Err(ApiError::new(410, "Gone").into());
            }
            Ok(Reply::json(json!({"id": p.get_i64("id")})))
        }),
    ));

    let ok = get(&router, "/api/items/1");
    assert_eq!(body(&ok)["version"], json!("v1"));
    assert_eq!(ok.header("x-cache"), Some("miss"));

    let gone = get(&router, "/api/items/0");
    assert_eq!(gone.status, 410);
    assert_eq!(body(&gone)["version"], json!("v1"));
    assert_eq!(gone.header("x-cache"), Some("miss"));
}

#[test]
fn test_data_overrides_meta() {
    let router = single(Route::get(
        "/x",
        handler_fn(|ctx, _p| {
            ctx.add_meta("source", "meta");
            Ok(Reply::json(json!({"source": "data"})))
        }),
    ));
    assert_eq!(body(&get(&router, "/api/x"))["source"], json!("data"));
}

#[test]
fn test_request_body_reaches_handler() {
    let router = single(Route::post(
        "/echo",
        handler_fn(|ctx, _p| {
            let payload = ctx.json_body()?.unwrap_or(Value::Null);
            Ok(Reply::json(json!({"echo": payload})))
        }),
    ));
    let ctx = RequestContext::new(Method::POST, "/api/echo").with_body(r#"{"a":[1,2]}"#);
    assert_eq!(body(&call(&router, ctx))["echo"], json!({"a": [1, 2]}));

    // malformed JSON is an unstructured failure
    let ctx = RequestContext::new(Method::POST, "/api/echo").with_body("{nope");
    assert_eq!(call(&router, ctx).status, 500);
}

#[test]
fn test_request_id_is_echoed() {
    let router = single(Route::get("/x", handler_fn(|_ctx, _p| Ok(Reply::json(json!({}))))));
    let id = RequestId::new();
    let req = http::Request::builder()
        .uri("/api/x")
        .header("X-Request-Id", id.to_string())
        .body(Vec::<u8>::new())
        .unwrap();

    let res = call(&router, RequestContext::from_http(&req));
    assert_eq!(res.header("x-request-id"), Some(id.to_string().as_str()));
}

#[test]
fn test_from_http_round_trip() {
    let router = single(Route::put(
        "/items/{id::int}",
        handler_fn(|ctx, p| {
            Ok(Reply::json(json!({
                "id": p.get_i64("id"),
                "body": ctx.json_body()?,
                "dry": p.query_value("dry"),
            })))
        }),
    ));
    let req = http::Request::builder()
        .method(Method::PUT)
        .uri("/api/items/5?dry")
        .body(br#"{"name":"lamp"}"#.to_vec())
        .unwrap();

    let res = call(&router, RequestContext::from_http(&req))
        .into_http()
        .unwrap();
    assert_eq!(res.status(), http::StatusCode::OK);
    let b: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(b["id"], json!(5));
    assert_eq!(b["body"], json!({"name": "lamp"}));
    assert_eq!(b["dry"], json!(true));
}

struct Inventory {
    items: Vec<&'static str>,
}

impl Handler for Inventory {
    fn handle(&self, _ctx: &mut RequestContext, params: &Params) -> HandlerResult {
        let idx = params.get_i64("idx").unwrap_or_default();
        let item = usize::try_from(idx)
            .ok()
            .and_then(|i| self.items.get(i))
            .ok_or_else(|| ApiError::new(404, "No such item").with_detail("idx", idx))?;
        Ok(Reply::json(json!({ "item": item })))
    }
}

#[test]
fn test_struct_handler_and_default_name() {
    let router = single(Route::get(
        "/inventory/{idx::int}",
        Inventory {
            items: vec!["lamp", "desk"],
        },
    ));
    assert!(router.routes()[0].handler_name().ends_with("Inventory"));

    assert_eq!(body(&get(&router, "/api/inventory/1"))["item"], json!("desk"));
    let missing = get(&router, "/api/inventory/-1");
    assert_eq!(missing.status, 404);
    assert_eq!(body(&missing)["idx"], json!(-1));
}
