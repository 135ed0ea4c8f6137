use super::common::{created_response, ApiJson};
use crate::{
    errors::ServiceError,
    handlers::AppState,
    services::products::{
        AdjustStockRequest, CreateProductRequest, DeletedProduct, ProductListQuery,
        ProductListResponse, ProductResponse, ProductSearchResponse, StockAdjustment,
        UpdateProductRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductMessageResponse {
    pub message: String,
    pub producto: ProductResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockAdjustedResponse {
    pub message: String,
    pub operacion_realizada: StockAdjustment,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDeletedResponse {
    pub message: String,
    pub producto_eliminado: DeletedProduct,
}

/// Catalog routes, mounted at the API root
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/productos", get(list_products).post(create_product))
        .route("/productos/buscar/:termino", get(search_products))
        .route(
            "/productos/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/productos/:id/stock", patch(adjust_stock))
}

#[utoipa::path(
    get,
    path = "/productos",
    summary = "List products",
    description = "Paginated catalog with optional search, brand, part type and stock filters, plus catalog statistics over the same filter",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved", body = ProductListResponse),
        (status = 400, description = "Unknown sort field or malformed filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductListResponse>, ServiceError> {
    let page = state.services.products.list(&query).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/productos/buscar/{termino}",
    summary = "Search products",
    description = "Ranked search: exact SKU first, then name prefix, then any substring",
    params(("termino" = String, Path, description = "Search term")),
    responses(
        (status = 200, description = "Matching products", body = ProductSearchResponse),
        (status = 400, description = "Empty search term", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<ProductSearchResponse>, ServiceError> {
    let found = state.services.products.search(&term).await?;
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/productos/{id}",
    summary = "Get product",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductResponse>, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(Json(product))
}

#[utoipa::path(
    post,
    path = "/productos",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductMessageResponse),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(ProductMessageResponse {
        message: "Producto creado exitosamente".to_string(),
        producto: product,
    }))
}

#[utoipa::path(
    put,
    path = "/productos/{id}",
    summary = "Update product",
    description = "Fields left out of the body keep their stored values",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductMessageResponse),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateProductRequest>,
) -> Result<Json<ProductMessageResponse>, ServiceError> {
    let product = state.services.products.update(id, payload).await?;
    Ok(Json(ProductMessageResponse {
        message: "Producto actualizado exitosamente".to_string(),
        producto: product,
    }))
}

#[utoipa::path(
    patch,
    path = "/productos/{id}/stock",
    summary = "Adjust stock",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = StockAdjustedResponse),
        (status = 400, description = "Invalid quantity or stock would go negative", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<AdjustStockRequest>,
) -> Result<Json<StockAdjustedResponse>, ServiceError> {
    let adjustment = state.services.products.adjust_stock(id, payload).await?;
    Ok(Json(StockAdjustedResponse {
        message: "Stock actualizado exitosamente".to_string(),
        operacion_realizada: adjustment,
    }))
}

#[utoipa::path(
    delete,
    path = "/productos/{id}",
    summary = "Delete product",
    description = "Refused while sales or service orders still reference the product",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = ProductDeletedResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product still referenced", body = crate::errors::ErrorResponse),
    ),
    tag = "Productos"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let deleted = state.services.products.delete(id).await?;
    Ok(Json(ProductDeletedResponse {
        message: "Producto eliminado exitosamente".to_string(),
        producto_eliminado: deleted,
    }))
}
