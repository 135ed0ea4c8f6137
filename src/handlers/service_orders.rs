use super::common::{created_response, ApiJson, MessageResponse};
use crate::{
    errors::ServiceError,
    handlers::AppState,
    services::service_orders::{
        CreateServiceOrderRequest, CreateServiceOrderResponse, ServiceOrderDetail,
        ServiceOrderListQuery, ServiceOrderListResponse, UpdateRepairStatusRequest,
        UpdateServiceOrderRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceOrderMessageResponse {
    pub message: String,
    pub orden: ServiceOrderDetail,
}

pub fn service_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ordenes-servicio",
            get(list_service_orders).post(create_service_order),
        )
        .route(
            "/ordenes-servicio/:id",
            get(get_service_order)
                .put(update_service_order)
                .delete(delete_service_order),
        )
        .route("/ordenes-servicio/:id/estado", patch(update_repair_status))
}

#[utoipa::path(
    post,
    path = "/ordenes-servicio",
    summary = "Create service order",
    description = "Stores the order with its checklist, faults, parts and photos as one unit. Brand and equipment type may be given by name and are created when missing.",
    request_body = CreateServiceOrderRequest,
    responses(
        (status = 201, description = "Service order created", body = CreateServiceOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid order data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order code already used", body = crate::errors::ErrorResponse),
        (status = 503, description = "Server shutting down", body = crate::errors::ErrorResponse),
        (status = 504, description = "Transaction timed out", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn create_service_order(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateServiceOrderRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.service_orders.create(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/ordenes-servicio",
    summary = "List service orders",
    params(ServiceOrderListQuery),
    responses(
        (status = 200, description = "Service orders retrieved", body = ServiceOrderListResponse),
        (status = 400, description = "Unknown sort field or malformed filter", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn list_service_orders(
    State(state): State<AppState>,
    Query(query): Query<ServiceOrderListQuery>,
) -> Result<Json<ServiceOrderListResponse>, ServiceError> {
    let page = state.services.service_orders.list(&query).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/ordenes-servicio/{id}",
    summary = "Get service order",
    description = "Order header with every child collection and the effective repair status",
    params(("id" = i32, Path, description = "Service order ID")),
    responses(
        (status = 200, description = "Service order retrieved", body = ServiceOrderDetail),
        (status = 404, description = "Service order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn get_service_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ServiceOrderDetail>, ServiceError> {
    let order = state.services.service_orders.get(id).await?;
    Ok(Json(order))
}

#[utoipa::path(
    put,
    path = "/ordenes-servicio/{id}",
    summary = "Update service order",
    description = "Header fields are merged; each child collection present in the body replaces the stored one",
    params(("id" = i32, Path, description = "Service order ID")),
    request_body = UpdateServiceOrderRequest,
    responses(
        (status = 200, description = "Service order updated", body = ServiceOrderMessageResponse),
        (status = 400, description = "Invalid order data or status move", body = crate::errors::ErrorResponse),
        (status = 404, description = "Service order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn update_service_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateServiceOrderRequest>,
) -> Result<Json<ServiceOrderMessageResponse>, ServiceError> {
    let order = state.services.service_orders.update(id, payload).await?;
    Ok(Json(ServiceOrderMessageResponse {
        message: "Orden de servicio actualizada exitosamente".to_string(),
        orden: order,
    }))
}

#[utoipa::path(
    patch,
    path = "/ordenes-servicio/{id}/estado",
    summary = "Change repair status",
    description = "PENDING -> IN_PROGRESS -> DONE, one step at a time",
    params(("id" = i32, Path, description = "Service order ID")),
    request_body = UpdateRepairStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ServiceOrderMessageResponse),
        (status = 400, description = "Unknown status or illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Service order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn update_repair_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateRepairStatusRequest>,
) -> Result<Json<ServiceOrderMessageResponse>, ServiceError> {
    let order = state
        .services
        .service_orders
        .update_status(id, payload)
        .await?;
    Ok(Json(ServiceOrderMessageResponse {
        message: "Estado actualizado exitosamente".to_string(),
        orden: order,
    }))
}

#[utoipa::path(
    delete,
    path = "/ordenes-servicio/{id}",
    summary = "Delete service order",
    description = "Removes the order and all of its child rows",
    params(("id" = i32, Path, description = "Service order ID")),
    responses(
        (status = 200, description = "Service order deleted", body = MessageResponse),
        (status = 404, description = "Service order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Ordenes de servicio"
)]
pub async fn delete_service_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state.services.service_orders.delete(id).await?;
    Ok(Json(MessageResponse::new(
        "Orden de servicio eliminada exitosamente",
    )))
}
