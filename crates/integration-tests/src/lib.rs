//! Shared fixtures for the cross-crate tests under `tests/`.

use std::sync::Arc;

use api_adapters::{layers, router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use domains::{DocumentStore, Thread};
use serde_json::Value;
use services::{ReplyRetention, ServiceOptions, Services};
use tower::ServiceExt;

pub const BOARD: &str = "general";

pub fn options() -> ServiceOptions {
    ServiceOptions::default()
}

pub fn cascading() -> ServiceOptions {
    ServiceOptions {
        reply_retention: ReplyRetention::Cascade,
        ..ServiceOptions::default()
    }
}

pub fn services(store: impl DocumentStore + 'static, options: ServiceOptions) -> Services {
    Services::new(Arc::new(store), options)
}

pub async fn seed_thread(services: &Services, board: &str, text: &str) -> Thread {
    services
        .threads
        .create_thread(board, text, "secret")
        .await
        .expect("seed thread")
}

/// The full HTTP stack (routes plus middleware) over `store`.
pub fn app(store: impl DocumentStore + 'static) -> Router {
    let state = AppState::new(services(store, options()));
    layers::apply(router(state, None))
}

/// Sends one request and decodes the JSON answer (`Value::Null` for non-JSON).
pub async fn call(app: &Router, method: &str, uri: &str, form: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if form.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    }
    let body = Body::from(form.unwrap_or_default().to_owned());
    let response = app
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("infallible router");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
