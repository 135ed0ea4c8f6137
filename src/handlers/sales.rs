use super::common::{created_response, ApiJson};
use crate::{
    errors::ServiceError,
    handlers::AppState,
    services::sales::{
        CreateSaleRequest, CreateSaleResponse, SaleDetailResponse, SalesHistoryQuery,
        SalesHistoryResponse, SalesSummaryResponse,
    },
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};

/// Point-of-sale routes. The literal segments are registered next to
/// `/ventas/:id`; axum prefers static segments over captures.
pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/ventas", post(create_sale))
        .route("/ventas/historial", get(sales_history))
        .route("/ventas/reporte-resumen/:periodo", get(sales_summary))
        .route("/ventas/:id", get(get_sale))
}

#[utoipa::path(
    post,
    path = "/ventas",
    summary = "Register sale",
    description = "Stores the sale and all of its line items as one unit; nothing is kept if any line fails",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale registered", body = CreateSaleResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Missing items or malformed quantity/amount", body = crate::errors::ErrorResponse),
        (status = 409, description = "Receipt number already used", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
        (status = 503, description = "Server shutting down", body = crate::errors::ErrorResponse),
        (status = 504, description = "Transaction timed out", body = crate::errors::ErrorResponse),
    ),
    tag = "Ventas"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateSaleRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.sales.create(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/ventas/historial",
    summary = "Sales history",
    description = "Paginated sales with totals, top sellers and payment-method breakdown over the same filter",
    params(SalesHistoryQuery),
    responses(
        (status = 200, description = "Sales retrieved", body = SalesHistoryResponse),
        (status = 400, description = "Unknown sort field or malformed date", body = crate::errors::ErrorResponse),
    ),
    tag = "Ventas"
)]
pub async fn sales_history(
    State(state): State<AppState>,
    Query(query): Query<SalesHistoryQuery>,
) -> Result<Json<SalesHistoryResponse>, ServiceError> {
    let history = state.services.sales.history(&query).await?;
    Ok(Json(history))
}

#[utoipa::path(
    get,
    path = "/ventas/reporte-resumen/{periodo}",
    summary = "Sales summary",
    params(("periodo" = String, Path, description = "hoy | semana | mes | anio")),
    responses(
        (status = 200, description = "Summary for the period", body = SalesSummaryResponse),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse),
    ),
    tag = "Ventas"
)]
pub async fn sales_summary(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> Result<Json<SalesSummaryResponse>, ServiceError> {
    let summary = state.services.sales.summary_report(&period).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/ventas/{id}",
    summary = "Get sale",
    params(("id" = i32, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale with its items", body = SaleDetailResponse),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Ventas"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SaleDetailResponse>, ServiceError> {
    let sale = state.services.sales.get(id).await?;
    Ok(Json(sale))
}
