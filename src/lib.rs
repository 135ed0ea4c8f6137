//! Taller API Library
//!
//! Backend for a repair shop: parts catalog, point-of-sale transactions and
//! repair service orders, each composite write stored atomically.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, Router};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::db::TransactionOptions;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    /// Fired on graceful shutdown; in-flight transactions observe a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let tx_options =
            TransactionOptions::new(config.transaction_timeout(), Some(shutdown.child_token()));
        let services = handlers::AppServices::new(db.clone(), &config, tx_options);
        Self {
            db,
            config,
            services,
            shutdown,
        }
    }
}

/// Every resource route, relative to the server root
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::products::product_routes())
        .merge(handlers::sales::sale_routes())
        .merge(handlers::service_orders::service_order_routes())
        .merge(handlers::taxonomy::taxonomy_routes())
}

/// Builds the CORS layer from configuration.
///
/// Explicit origins win; otherwise permissive CORS is used where the
/// configuration allows it, and cross-origin requests are refused elsewhere.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

/// Full application router: resource routes, Swagger UI and the HTTP
/// middleware stack (request id, tracing, timeout, CORS, compression).
pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::<AppState>::new()
        .merge(api_routes())
        .merge(openapi::swagger_ui())
        .fallback(route_not_found)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn route_not_found(uri: axum::http::Uri) -> errors::ServiceError {
    errors::ServiceError::NotFound(format!("No route for {}", uri.path()))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::models::repair_status::RepairStatus;
    pub use crate::services::*;
}
