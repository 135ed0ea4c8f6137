use super::common::{created_response, ApiJson};
use crate::{
    errors::ServiceError,
    handlers::AppState,
    services::taxonomy::{CreateTaxonomyEntryRequest, TaxonomyEntry},
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};

/// Reference-data routes: brands, part types and equipment types
pub fn taxonomy_routes() -> Router<AppState> {
    Router::new()
        .route("/marcas", get(list_brands).post(create_brand))
        .route("/marcas/:id/tipos-repuesto", get(part_types_for_brand))
        .route("/tipos-repuesto", get(list_part_types).post(create_part_type))
        .route(
            "/tipos-equipo",
            get(list_equipment_types).post(create_equipment_type),
        )
}

#[utoipa::path(
    get,
    path = "/marcas",
    summary = "List brands",
    responses((status = 200, description = "Brands ordered by name", body = [TaxonomyEntry])),
    tag = "Catalogos"
)]
pub async fn list_brands(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaxonomyEntry>>, ServiceError> {
    Ok(Json(state.services.taxonomy.list_brands().await?))
}

#[utoipa::path(
    post,
    path = "/marcas",
    summary = "Create brand",
    request_body = CreateTaxonomyEntryRequest,
    responses(
        (status = 201, description = "Brand created", body = TaxonomyEntry),
        (status = 400, description = "Blank or overlong name", body = crate::errors::ErrorResponse),
        (status = 409, description = "Brand already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalogos"
)]
pub async fn create_brand(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTaxonomyEntryRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.taxonomy.create_brand(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/marcas/{id}/tipos-repuesto",
    summary = "Part types offered for a brand",
    params(("id" = i32, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Linked part types", body = [TaxonomyEntry]),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalogos"
)]
pub async fn part_types_for_brand(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<TaxonomyEntry>>, ServiceError> {
    Ok(Json(state.services.taxonomy.part_types_for_brand(id).await?))
}

#[utoipa::path(
    get,
    path = "/tipos-repuesto",
    summary = "List part types",
    responses((status = 200, description = "Part types ordered by name", body = [TaxonomyEntry])),
    tag = "Catalogos"
)]
pub async fn list_part_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaxonomyEntry>>, ServiceError> {
    Ok(Json(state.services.taxonomy.list_part_types().await?))
}

#[utoipa::path(
    post,
    path = "/tipos-repuesto",
    summary = "Create part type",
    description = "The new type is linked to every existing brand",
    request_body = CreateTaxonomyEntryRequest,
    responses(
        (status = 201, description = "Part type created", body = TaxonomyEntry),
        (status = 400, description = "Blank or overlong name", body = crate::errors::ErrorResponse),
        (status = 409, description = "Part type already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalogos"
)]
pub async fn create_part_type(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTaxonomyEntryRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.taxonomy.create_part_type(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/tipos-equipo",
    summary = "List equipment types",
    responses((status = 200, description = "Equipment types ordered by name", body = [TaxonomyEntry])),
    tag = "Catalogos"
)]
pub async fn list_equipment_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaxonomyEntry>>, ServiceError> {
    Ok(Json(state.services.taxonomy.list_equipment_types().await?))
}

#[utoipa::path(
    post,
    path = "/tipos-equipo",
    summary = "Create equipment type",
    request_body = CreateTaxonomyEntryRequest,
    responses(
        (status = 201, description = "Equipment type created", body = TaxonomyEntry),
        (status = 400, description = "Blank or overlong name", body = crate::errors::ErrorResponse),
        (status = 409, description = "Equipment type already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalogos"
)]
pub async fn create_equipment_type(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTaxonomyEntryRequest>,
) -> Result<Response, ServiceError> {
    let created = state
        .services
        .taxonomy
        .create_equipment_type(payload)
        .await?;
    Ok(created_response(created))
}
