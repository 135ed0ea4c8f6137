#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use taller_api::{
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    AppState,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Helper harness for spinning up the full router over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`], letting the caller tune configuration first.
    pub async fn with_config(tune: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        tune(&mut cfg);

        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg, CancellationToken::new());
        let router = build_router(state.clone());
        Self { router, state }
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(payload.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Number of rows currently stored for `E`.
    pub async fn count<E>(&self) -> u64
    where
        E: EntityTrait,
        E::Model: Send + Sync + 'static,
    {
        E::find()
            .count(&*self.state.db)
            .await
            .expect("count rows")
    }

    pub async fn seed_brand(&self, name: &str) -> i32 {
        let (status, body) = self.post("/marcas", json!({ "nombre": name })).await;
        assert_eq!(status, StatusCode::CREATED, "seed brand: {body}");
        body["id"].as_i64().expect("brand id") as i32
    }

    pub async fn seed_product(&self, sku: &str, name: &str, price: i64, stock: i64) -> i32 {
        let (status, body) = self
            .post(
                "/productos",
                json!({ "sku": sku, "nombre": name, "precio": price, "stock": stock }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed product: {body}");
        body["producto"]["id"].as_i64().expect("product id") as i32
    }

    /// Registers a one-line sale and returns its id.
    pub async fn seed_sale(&self, seller: &str, sku: &str, quantity: i64, unit_price: i64) -> i32 {
        let (status, body) = self
            .post(
                "/ventas",
                json!({
                    "vendedor": seller,
                    "forma_pago": "efectivo",
                    "items": [{ "sku": sku, "descripcion": sku, "cantidad": quantity, "precio_unitario": unit_price }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed sale: {body}");
        body["ventaId"].as_i64().expect("sale id") as i32
    }
}

/// Reads a money field whether it was serialized as a string or a number.
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a money value: {other}"),
    }
}
