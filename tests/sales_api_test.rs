mod common;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use taller_api::entities::{sale, sale_item};

use common::{money, TestApp};

#[tokio::test]
async fn create_sale_stores_parent_and_items_in_input_order() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/ventas",
            json!({
                "numero_boleta": "B-0001",
                "vendedor": "Ana",
                "forma_pago": "efectivo",
                "monto_recibido": 100,
                "items": [
                    { "sku": "PANT-01", "descripcion": "Pantalla", "cantidad": 2, "precio_unitario": 30 },
                    { "sku": "BAT-02", "descripcion": "Bateria", "cantidad": "1", "precio_unitario": "12.5" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Venta registrada exitosamente");
    let id = body["ventaId"].as_i64().unwrap();

    let (status, detail) = app.get(&format!("/ventas/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["numero_boleta"], "B-0001");
    assert_eq!(money(&detail["total"]), Decimal::new(725, 1));
    assert_eq!(money(&detail["vuelto"]), Decimal::new(275, 1));

    let items = detail["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["sku"], "PANT-01");
    assert_eq!(money(&items[0]["subtotal"]), Decimal::from(60));
    assert_eq!(items[1]["sku"], "BAT-02");
    assert_eq!(money(&items[1]["subtotal"]), Decimal::new(125, 1));
}

#[tokio::test]
async fn explicit_total_is_kept() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/ventas",
            json!({
                "vendedor": "Ana",
                "forma_pago": "tarjeta",
                "total": 50,
                "items": [{ "sku": "X", "cantidad": 1, "precio_unitario": 60 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, detail) = app.get(&format!("/ventas/{}", body["ventaId"])).await;
    assert_eq!(money(&detail["total"]), Decimal::from(50));
    assert_eq!(money(&detail["vuelto"]), Decimal::ZERO);
}

#[tokio::test]
async fn sale_without_items_is_rejected_and_nothing_is_stored() {
    let app = TestApp::new().await;

    for payload in [
        json!({ "vendedor": "Ana", "forma_pago": "efectivo", "items": [] }),
        json!({ "vendedor": "Ana", "forma_pago": "efectivo" }),
    ] {
        let (status, body) = app.post("/ventas", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad Request");
    }
    assert_eq!(app.count::<sale::Entity>().await, 0);
}

#[tokio::test]
async fn malformed_line_rolls_back_the_whole_sale() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/ventas",
            json!({
                "vendedor": "Ana",
                "forma_pago": "efectivo",
                "items": [
                    { "sku": "OK", "cantidad": 1, "precio_unitario": 10 },
                    { "sku": "BAD", "cantidad": "dos", "precio_unitario": 10 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.count::<sale::Entity>().await, 0);
    assert_eq!(app.count::<sale_item::Entity>().await, 0);
}

#[tokio::test]
async fn overflowing_amounts_are_rejected_and_nothing_is_stored() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/ventas",
            json!({
                "vendedor": "Ana",
                "forma_pago": "efectivo",
                "items": [
                    { "sku": "BIG", "cantidad": 5, "precio_unitario": "50000000000000000000000000000" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post(
            "/ventas",
            json!({
                "vendedor": "Ana",
                "forma_pago": "efectivo",
                "items": [
                    { "sku": "A", "cantidad": 1, "precio_unitario": "79228162514264337593543950335" },
                    { "sku": "B", "cantidad": 1, "precio_unitario": "79228162514264337593543950335" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = app
        .post(
            "/ventas",
            json!({
                "vendedor": "Ana",
                "forma_pago": "efectivo",
                "total": "-79228162514264337593543950335",
                "monto_recibido": "79228162514264337593543950335",
                "items": [{ "sku": "C", "cantidad": 1, "precio_unitario": 1 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    assert_eq!(app.count::<sale::Entity>().await, 0);
    assert_eq!(app.count::<sale_item::Entity>().await, 0);
}

#[tokio::test]
async fn duplicate_receipt_number_is_a_conflict_and_leaves_one_sale() {
    let app = TestApp::new().await;
    let payload = json!({
        "numero_boleta": "B-77",
        "vendedor": "Ana",
        "forma_pago": "efectivo",
        "items": [{ "sku": "X", "cantidad": 1, "precio_unitario": 10 }]
    });

    let (first, _) = app.post("/ventas", payload.clone()).await;
    assert_eq!(first, StatusCode::CREATED);
    let (second, body) = app.post("/ventas", payload).await;
    assert_eq!(second, StatusCode::CONFLICT, "{body}");

    assert_eq!(app.count::<sale::Entity>().await, 1);
    assert_eq!(app.count::<sale_item::Entity>().await, 1);
}

#[tokio::test]
async fn unknown_sale_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/ventas/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn history_paginates_and_aggregates_the_filtered_set() {
    let app = TestApp::new().await;
    for _ in 0..25 {
        app.seed_sale("Ana", "X", 1, 10).await;
    }
    for _ in 0..3 {
        app.seed_sale("Luis", "Y", 2, 5).await;
    }

    let (status, page) = app
        .get("/ventas/historial?vendedor=Ana&pagina=2&limite=10")
        .await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["ventas"].as_array().unwrap().len(), 10);
    assert_eq!(page["paginacion"]["pagina"], 2);
    assert_eq!(page["paginacion"]["total"], 25);
    assert_eq!(page["paginacion"]["totalPaginas"], 3);
    assert_eq!(page["estadisticas"]["total_ventas"], 25);
    assert_eq!(money(&page["estadisticas"]["total_ingresos"]), Decimal::from(250));

    let (_, all) = app.get("/ventas/historial").await;
    assert_eq!(all["estadisticas"]["total_vendedores"], 2);
    let top = all["top_vendedores"].as_array().unwrap();
    assert_eq!(top[0]["vendedor"], "Ana");
    assert_eq!(all["formas_pago"][0]["forma_pago"], "efectivo");
    assert_eq!(all["formas_pago"][0]["cantidad"], 28);
}

#[tokio::test]
async fn history_rejects_unknown_sort_field_without_touching_sql() {
    let app = TestApp::new().await;
    app.seed_sale("Ana", "X", 1, 10).await;

    let (status, body) = app
        .get("/ventas/historial?ordenar_por=DROP%20TABLE%20ventas")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Invalid sort field"));

    // table still there
    let (status, _) = app.get("/ventas/historial").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.count::<sale::Entity>().await, 1);
}

#[tokio::test]
async fn history_rejects_malformed_dates() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/ventas/historial?fecha_inicio=ayer").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_report_lists_best_sellers() {
    let app = TestApp::new().await;
    app.seed_sale("Ana", "PANT-01", 3, 20).await;
    app.seed_sale("Ana", "PANT-01", 1, 20).await;
    app.seed_sale("Ana", "BAT-02", 1, 8).await;

    let (status, report) = app.get("/ventas/reporte-resumen/hoy").await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["periodo"], "hoy");
    assert_eq!(report["estadisticas"]["total_ventas"], 3);
    assert_eq!(report["ventas_por_dia"].as_array().unwrap().len(), 1);

    let best = report["productos_mas_vendidos"].as_array().unwrap();
    assert_eq!(best[0]["sku"], "PANT-01");
    assert_eq!(best[0]["total_vendido"], 4);
    assert_eq!(money(&best[0]["total_ingresos"]), Decimal::from(80));

    let (status, _) = app.get("/ventas/reporte-resumen/decada").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
