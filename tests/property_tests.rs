//! Property-based tests for pagination, LIKE escaping, repair status
//! resolution, sale totals and service order balances.

mod common;

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use taller_api::db::query_builder::escape_like;
use taller_api::db::Pagination;
use taller_api::models::{effective_status, resolve_fault_status, RepairStatus};

use common::{money, TestApp};

fn status_strategy() -> impl Strategy<Value = RepairStatus> {
    prop_oneof![
        Just(RepairStatus::Pending),
        Just(RepairStatus::InProgress),
        Just(RepairStatus::Done),
    ]
}

/// Signed cents, zero drawn as often as any other bucket.
fn signed_amount_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![Just(0i64), -1_000_000i64..1_000_000].prop_map(|cents| Decimal::new(cents, 2))
}

fn fault_status_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("PENDING".to_string())),
        Just(Some("en proceso".to_string())),
        Just(Some("DONE".to_string())),
        "[a-z]{1,8}".prop_map(Some),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn pagination_is_always_within_bounds(
        page in proptest::option::of(-50i64..500),
        size in proptest::option::of(-50i64..500),
        max in 1u64..200,
    ) {
        let page_raw = page.map(|p| p.to_string());
        let size_raw = size.map(|s| s.to_string());
        let p = Pagination::from_raw(page_raw.as_deref(), size_raw.as_deref(), 10, max);

        prop_assert!(p.page >= 1);
        prop_assert!(p.page_size >= 1 && p.page_size <= max);
        prop_assert_eq!(p.offset(), (p.page - 1) * p.page_size);
    }

    #[test]
    fn total_pages_covers_every_row(total in 0u64..10_000, size in 1u64..100) {
        let p = Pagination { page: 1, page_size: size };
        let pages = p.total_pages(total);

        prop_assert!(pages * size >= total);
        if total > 0 {
            prop_assert!((pages - 1) * size < total);
        } else {
            prop_assert_eq!(pages, 0);
        }
    }

    #[test]
    fn escaped_like_has_no_bare_wildcards(raw in ".{0,40}") {
        let escaped = escape_like(&raw);
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                prop_assert!(matches!(chars.next(), Some('\\' | '%' | '_')));
            } else {
                prop_assert!(c != '%' && c != '_');
            }
        }
    }

    #[test]
    fn status_never_moves_backwards_or_skips(from in status_strategy(), to in status_strategy()) {
        let allowed = from.can_transition_to(to);
        let forward_one = RepairStatus::ALL.windows(2).any(|w| w[0] == from && w[1] == to);
        prop_assert_eq!(allowed, from == to || forward_one);
    }

    #[test]
    fn fault_status_is_first_non_pending(faults in proptest::collection::vec(fault_status_strategy(), 0..8)) {
        let resolved = resolve_fault_status(faults.iter().map(|f| f.as_deref()));
        let expected = faults
            .iter()
            .flatten()
            .filter_map(|raw| RepairStatus::parse(raw).ok())
            .find(|s| *s != RepairStatus::Pending)
            .unwrap_or_default();
        prop_assert_eq!(resolved, expected);
    }

    #[test]
    fn effective_status_prefers_fault_progress(persisted in status_strategy(), derived in status_strategy()) {
        let effective = effective_status(persisted, derived);
        if derived == RepairStatus::Pending {
            prop_assert_eq!(effective, persisted);
        } else {
            prop_assert_eq!(effective, derived);
        }
    }
}

proptest! {
    // Each case boots a database, keep the count small.
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn sale_total_is_sum_of_line_subtotals(
        lines in proptest::collection::vec((1i64..20, 0i64..500), 1..6),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let app = TestApp::new().await;
            let items: Vec<_> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, price))| {
                    json!({ "sku": format!("SKU-{i}"), "cantidad": qty, "precio_unitario": price })
                })
                .collect();

            let (status, body) = app
                .post("/ventas", json!({ "vendedor": "Ana", "forma_pago": "efectivo", "items": items }))
                .await;
            assert_eq!(status.as_u16(), 201, "{body}");

            let (_, detail) = app.get(&format!("/ventas/{}", body["ventaId"])).await;
            let expected: i64 = lines.iter().map(|(qty, price)| qty * price).sum();
            assert_eq!(money(&detail["total"]), Decimal::from(expected));
            assert_eq!(detail["items"].as_array().map(Vec::len), Some(lines.len()));
        });
    }

    #[test]
    fn order_total_is_cost_minus_advance(
        created in (signed_amount_strategy(), signed_amount_strategy()),
        updated in (signed_amount_strategy(), signed_amount_strategy()),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let app = TestApp::new().await;
            let (cost, advance) = created;
            let (status, body) = app
                .post(
                    "/ordenes-servicio",
                    json!({
                        "cliente_nombre": "Cliente",
                        "costo_reparacion": cost.to_string(),
                        "abono": advance.to_string()
                    }),
                )
                .await;
            assert_eq!(status.as_u16(), 201, "{body}");
            let uri = format!("/ordenes-servicio/{}", body["ordenId"]);

            let (_, detail) = app.get(&uri).await;
            assert_eq!(money(&detail["total"]), cost - advance);

            // only the advance changes, the stored cost must be reused
            let (new_cost, new_advance) = updated;
            let (status, body) = app.put(&uri, json!({ "abono": new_advance.to_string() })).await;
            assert_eq!(status.as_u16(), 200, "{body}");
            assert_eq!(money(&body["orden"]["total"]), cost - new_advance);

            let (status, body) = app
                .put(&uri, json!({ "costo_reparacion": new_cost.to_string() }))
                .await;
            assert_eq!(status.as_u16(), 200, "{body}");
            assert_eq!(money(&body["orden"]["costo_reparacion"]), new_cost);
            assert_eq!(money(&body["orden"]["total"]), new_cost - new_advance);
        });
    }
}
