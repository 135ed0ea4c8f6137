use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taller API",
        version = "0.1.0",
        description = r#"
# Repair shop backend

Parts catalog, point-of-sale transactions and repair service orders.

## Composite writes

`POST /ventas` and `POST /ordenes-servicio` store the parent row and every
child row as one unit. A failure on any line leaves nothing behind.

## Listing

List endpoints accept `pagina`, `limite`, `ordenar_por` and `orden`.
Sort fields come from a fixed list per resource; anything else is a 400.

## Errors

```json
{
  "error": "Bad Request",
  "message": "Validation error: ...",
  "request_id": "6f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "Productos", description = "Parts catalog and stock"),
        (name = "Ventas", description = "Point-of-sale transactions and reports"),
        (name = "Ordenes de servicio", description = "Repair service orders"),
        (name = "Catalogos", description = "Brands, part types and equipment types"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::search_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::adjust_stock,
        crate::handlers::products::delete_product,

        // Sales
        crate::handlers::sales::create_sale,
        crate::handlers::sales::sales_history,
        crate::handlers::sales::sales_summary,
        crate::handlers::sales::get_sale,

        // Service orders
        crate::handlers::service_orders::create_service_order,
        crate::handlers::service_orders::list_service_orders,
        crate::handlers::service_orders::get_service_order,
        crate::handlers::service_orders::update_service_order,
        crate::handlers::service_orders::update_repair_status,
        crate::handlers::service_orders::delete_service_order,

        // Taxonomy
        crate::handlers::taxonomy::list_brands,
        crate::handlers::taxonomy::create_brand,
        crate::handlers::taxonomy::part_types_for_brand,
        crate::handlers::taxonomy::list_part_types,
        crate::handlers::taxonomy::create_part_type,
        crate::handlers::taxonomy::list_equipment_types,
        crate::handlers::taxonomy::create_equipment_type,

        // Health
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            crate::db::PaginationMeta,
            crate::models::repair_status::RepairStatus,
            crate::handlers::common::MessageResponse,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_resource() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Taller API"));
        for path in [
            "/productos",
            "/productos/{id}/stock",
            "/ventas",
            "/ventas/reporte-resumen/{periodo}",
            "/ordenes-servicio/{id}/estado",
            "/tipos-repuesto",
            "/status",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
