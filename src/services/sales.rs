use crate::{
    db::{
        parse_filter, run_in_transaction, DbPool, FilterSet, Pagination, PaginationMeta,
        QueryBuilder, SortDirection, SortField, TransactionOptions,
    },
    entities::{sale, sale_item},
    errors::ServiceError,
    models::{
        numeric::{checked_difference, checked_sum, line_subtotal},
        LooseNumber,
    },
    services::generate_code,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    Order, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const TOP_SELLERS: u64 = 5;
const TOP_PRODUCTS: u64 = 10;

/// Sortable columns of the sales history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleSort {
    SoldAt,
    Total,
    Seller,
    ReceiptNumber,
}

impl SortField for SaleSort {
    type Entity = sale::Entity;

    const FIELDS: &'static [(&'static str, Self)] = &[
        ("fecha", Self::SoldAt),
        ("total", Self::Total),
        ("vendedor", Self::Seller),
        ("numero_boleta", Self::ReceiptNumber),
    ];

    fn column(self) -> sale::Column {
        match self {
            Self::SoldAt => sale::Column::SoldAt,
            Self::Total => sale::Column::Total,
            Self::Seller => sale::Column::Seller,
            Self::ReceiptNumber => sale::Column::ReceiptNumber,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaleItemInput {
    pub sku: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "cantidad")]
    #[schema(value_type = i32)]
    pub quantity: LooseNumber,
    #[serde(rename = "precio_unitario")]
    #[schema(value_type = f64)]
    pub unit_price: LooseNumber,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    /// Generated as `B-XXXXXXXX` when absent
    #[serde(rename = "numero_boleta", default)]
    pub receipt_number: Option<String>,
    /// Defaults to the time of the request
    #[serde(rename = "fecha", default)]
    pub sold_at: Option<DateTime<Utc>>,
    #[serde(rename = "vendedor")]
    #[validate(length(min = 1, max = 120, message = "vendedor must be between 1 and 120 characters"))]
    pub seller: String,
    #[serde(rename = "forma_pago")]
    #[validate(length(min = 1, max = 40, message = "forma_pago must be between 1 and 40 characters"))]
    pub payment_method: String,
    /// Sum of the line subtotals when absent
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub total: Option<LooseNumber>,
    #[serde(rename = "monto_recibido", default)]
    #[schema(value_type = Option<f64>)]
    pub amount_received: Option<LooseNumber>,
    #[serde(default)]
    pub items: Option<Vec<SaleItemInput>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSaleResponse {
    pub message: String,
    #[serde(rename = "ventaId")]
    pub sale_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleResponse {
    pub id: i32,
    pub numero_boleta: String,
    pub fecha: DateTime<Utc>,
    pub vendedor: String,
    pub forma_pago: String,
    pub total: Decimal,
    pub monto_recibido: Option<Decimal>,
    pub vuelto: Decimal,
    pub fecha_creacion: DateTime<Utc>,
}

impl From<sale::Model> for SaleResponse {
    fn from(m: sale::Model) -> Self {
        Self {
            id: m.id,
            numero_boleta: m.receipt_number,
            fecha: m.sold_at,
            vendedor: m.seller,
            forma_pago: m.payment_method,
            total: m.total,
            monto_recibido: m.amount_received,
            vuelto: m.change_due,
            fecha_creacion: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleItemResponse {
    pub id: i32,
    pub sku: String,
    pub descripcion: String,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
}

impl From<sale_item::Model> for SaleItemResponse {
    fn from(m: sale_item::Model) -> Self {
        Self {
            id: m.id,
            sku: m.sku,
            descripcion: m.description,
            cantidad: m.quantity,
            precio_unitario: m.unit_price,
            subtotal: m.subtotal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleDetailResponse {
    #[serde(flatten)]
    pub sale: SaleResponse,
    pub items: Vec<SaleItemResponse>,
}

/// Raw query string of `GET /ventas/historial`
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SalesHistoryQuery {
    pub pagina: Option<String>,
    pub limite: Option<String>,
    /// First day included, `YYYY-MM-DD`
    pub fecha_inicio: Option<String>,
    /// Last day included, `YYYY-MM-DD`
    pub fecha_fin: Option<String>,
    pub vendedor: Option<String>,
    pub forma_pago: Option<String>,
    pub ordenar_por: Option<String>,
    pub orden: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalesStats {
    pub total_ventas: i64,
    pub total_ingresos: Decimal,
    pub promedio_venta: Decimal,
    pub total_vendedores: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct SellerTotals {
    pub vendedor: String,
    pub total_ventas: i64,
    pub total_ventas_monto: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct PaymentMethodTotals {
    pub forma_pago: String,
    pub cantidad: i64,
    pub total: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesHistoryResponse {
    pub ventas: Vec<SaleResponse>,
    pub paginacion: PaginationMeta,
    pub estadisticas: SalesStats,
    pub top_vendedores: Vec<SellerTotals>,
    pub formas_pago: Vec<PaymentMethodTotals>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailySales {
    pub dia: NaiveDate,
    pub total_ventas: i64,
    pub total_ingresos: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct TopProduct {
    pub sku: String,
    pub descripcion: String,
    pub total_vendido: i64,
    pub total_ingresos: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesSummaryResponse {
    pub periodo: String,
    pub desde: DateTime<Utc>,
    pub estadisticas: SalesStats,
    pub ventas_por_dia: Vec<DailySales>,
    pub productos_mas_vendidos: Vec<TopProduct>,
}

/// Window covered by the summary report, always ending now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    pub fn parse(token: &str) -> Result<Self, ServiceError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "hoy" => Ok(Self::Today),
            "semana" => Ok(Self::Week),
            "mes" => Ok(Self::Month),
            "anio" | "año" => Ok(Self::Year),
            _ => Err(ServiceError::ValidationError(
                "Invalid period; allowed: hoy, semana, mes, anio".to_string(),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "hoy",
            Self::Week => "semana",
            Self::Month => "mes",
            Self::Year => "anio",
        }
    }

    /// Start of the window: midnight UTC of the first day included.
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            Self::Today => today,
            Self::Week => today - Duration::days(6),
            Self::Month => today.with_day(1).unwrap_or(today),
            Self::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        start_of_day(first_day)
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

struct ParsedLine {
    sku: String,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

fn parse_line(position: usize, item: &SaleItemInput) -> Result<ParsedLine, ServiceError> {
    let sku = item.sku.trim();
    if sku.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "items[{}].sku must not be empty",
            position
        )));
    }
    let quantity = item
        .quantity
        .to_quantity(&format!("items[{}].cantidad", position))?;
    let unit_price = item
        .unit_price
        .to_decimal(&format!("items[{}].precio_unitario", position))?
        .round_dp(2);
    let description = item
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(sku)
        .to_string();
    let subtotal = line_subtotal(
        unit_price,
        quantity,
        &format!("items[{}].subtotal", position),
    )?;

    Ok(ParsedLine {
        sku: sku.to_string(),
        description,
        quantity,
        unit_price,
        subtotal,
    })
}

#[derive(Debug, FromQueryResult)]
struct TotalsRow {
    total_ventas: i64,
    total_ingresos: Option<Decimal>,
    total_vendedores: i64,
}

/// Point-of-sale receipts: atomic creation, history and reports
#[derive(Clone)]
pub struct SalesService {
    db: Arc<DbPool>,
    tx_options: TransactionOptions,
    default_page_size: u64,
    max_page_size: u64,
}

impl SalesService {
    pub fn new(
        db: Arc<DbPool>,
        tx_options: TransactionOptions,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        Self {
            db,
            tx_options,
            default_page_size,
            max_page_size,
        }
    }

    /// Persists a receipt and all of its lines, or nothing at all.
    #[instrument(skip(self, request), fields(seller = %request.seller))]
    pub async fn create(&self, request: CreateSaleRequest) -> Result<CreateSaleResponse, ServiceError> {
        request.validate()?;
        let items = match request.items {
            Some(items) if !items.is_empty() => items,
            _ => {
                return Err(ServiceError::ValidationError(
                    "A sale needs at least one item".to_string(),
                ))
            }
        };

        let receipt_number = request
            .receipt_number
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_code("B"));
        let seller = request.seller.trim().to_string();
        let payment_method = request.payment_method.trim().to_string();
        let sold_at = request.sold_at.unwrap_or_else(Utc::now);
        let explicit_total = request.total;
        let amount_received = request.amount_received;
        let line_count = items.len();

        let sale_id = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let lines = items
                    .iter()
                    .enumerate()
                    .map(|(position, item)| parse_line(position, item))
                    .collect::<Result<Vec<_>, _>>()?;

                let total = match explicit_total.as_ref() {
                    Some(total) => total.to_decimal("total")?.round_dp(2),
                    None => checked_sum(lines.iter().map(|line| line.subtotal), "total")?,
                };
                let received = amount_received
                    .as_ref()
                    .map(|value| value.to_decimal("monto_recibido").map(|d| d.round_dp(2)))
                    .transpose()?;
                let change_due = match received {
                    Some(received) => checked_difference(received, total, "vuelto")?,
                    None => Decimal::ZERO,
                };

                let created = sale::ActiveModel {
                    receipt_number: Set(receipt_number.clone()),
                    sold_at: Set(sold_at),
                    seller: Set(seller),
                    payment_method: Set(payment_method),
                    total: Set(total),
                    amount_received: Set(received),
                    change_due: Set(change_due),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(|e| {
                    ServiceError::from_write(e, || {
                        format!("Receipt number '{}' already exists", receipt_number)
                    })
                })?;

                let rows: Vec<sale_item::ActiveModel> = lines
                    .into_iter()
                    .enumerate()
                    .map(|(position, line)| sale_item::ActiveModel {
                        sale_id: Set(created.id),
                        position: Set(position as i32),
                        sku: Set(line.sku),
                        description: Set(line.description),
                        quantity: Set(line.quantity),
                        unit_price: Set(line.unit_price),
                        subtotal: Set(line.subtotal),
                        ..Default::default()
                    })
                    .collect();
                sale_item::Entity::insert_many(rows)
                    .exec_without_returning(txn)
                    .await?;

                Ok(created.id)
            })
        })
        .await?;

        info!(sale_id, lines = line_count, "Sale recorded");
        Ok(CreateSaleResponse {
            message: "Venta registrada exitosamente".to_string(),
            sale_id,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<SaleDetailResponse, ServiceError> {
        let db = &*self.db;
        let found = sale::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", id))?;
        let items = sale_item::Entity::find()
            .filter(sale_item::Column::SaleId.eq(id))
            .order_by_asc(sale_item::Column::Position)
            .order_by_asc(sale_item::Column::Id)
            .all(db)
            .await?;

        Ok(SaleDetailResponse {
            sale: found.into(),
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    /// Filtered sales page with aggregates over the whole filtered set
    #[instrument(skip(self, query))]
    pub async fn history(&self, query: &SalesHistoryQuery) -> Result<SalesHistoryResponse, ServiceError> {
        let sort = SaleSort::parse_optional(query.ordenar_por.as_deref())?.unwrap_or(SaleSort::SoldAt);
        let direction = SortDirection::parse_or(query.orden.as_deref(), SortDirection::Desc)?;
        let from = parse_filter::<NaiveDate>(query.fecha_inicio.as_deref(), "fecha_inicio")?;
        let to = parse_filter::<NaiveDate>(query.fecha_fin.as_deref(), "fecha_fin")?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ServiceError::ValidationError(
                    "fecha_inicio must not be after fecha_fin".to_string(),
                ));
            }
        }
        let pagination = Pagination::from_raw(
            query.pagina.as_deref(),
            query.limite.as_deref(),
            self.default_page_size,
            self.max_page_size,
        );

        let filters = FilterSet::new()
            .date_range(
                sale::Column::SoldAt,
                from.map(start_of_day),
                to.map(|day| start_of_day(day) + Duration::days(1)),
            )
            .contains(sale::Column::Seller, query.vendedor.as_deref())
            .eq(
                sale::Column::PaymentMethod,
                query
                    .forma_pago
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );

        let builder = QueryBuilder::<sale::Entity>::new(filters, pagination).order_by(sort, direction);
        let condition = builder.condition();
        let db = &*self.db;
        let page = builder.execute(db).await.map_err(|e| {
            error!(error = %e, "Failed to load sales history");
            ServiceError::DatabaseError(e)
        })?;

        let estadisticas = sales_stats(db, condition.clone()).await?;
        let top_vendedores = sale::Entity::find()
            .filter(condition.clone())
            .select_only()
            .column_as(sale::Column::Seller, "vendedor")
            .column_as(Expr::col(sale::Column::Id).count(), "total_ventas")
            .column_as(Expr::col(sale::Column::Total).sum(), "total_ventas_monto")
            .group_by(sale::Column::Seller)
            .order_by(Expr::col(sale::Column::Total).sum(), Order::Desc)
            .order_by_asc(sale::Column::Seller)
            .limit(TOP_SELLERS)
            .into_model::<SellerTotals>()
            .all(db)
            .await?;
        let formas_pago = sale::Entity::find()
            .filter(condition)
            .select_only()
            .column_as(sale::Column::PaymentMethod, "forma_pago")
            .column_as(Expr::col(sale::Column::Id).count(), "cantidad")
            .column_as(Expr::col(sale::Column::Total).sum(), "total")
            .group_by(sale::Column::PaymentMethod)
            .order_by(Expr::col(sale::Column::Id).count(), Order::Desc)
            .order_by_asc(sale::Column::PaymentMethod)
            .into_model::<PaymentMethodTotals>()
            .all(db)
            .await?;

        Ok(SalesHistoryResponse {
            paginacion: page.meta(),
            ventas: page.items.into_iter().map(Into::into).collect(),
            estadisticas,
            top_vendedores,
            formas_pago,
        })
    }

    /// Totals, per-day breakdown and best sellers for a period ending now
    #[instrument(skip(self))]
    pub async fn summary_report(&self, period: &str) -> Result<SalesSummaryResponse, ServiceError> {
        let period = ReportPeriod::parse(period)?;
        let since = period.since(Utc::now());
        let db = &*self.db;
        let in_window = Condition::all().add(sale::Column::SoldAt.gte(since));

        let estadisticas = sales_stats(db, in_window.clone()).await?;

        let sold: Vec<(DateTime<Utc>, Decimal)> = sale::Entity::find()
            .filter(in_window)
            .select_only()
            .column(sale::Column::SoldAt)
            .column(sale::Column::Total)
            .into_tuple()
            .all(db)
            .await?;
        let mut per_day: BTreeMap<NaiveDate, (i64, Decimal)> = BTreeMap::new();
        for (sold_at, total) in sold {
            let entry = per_day
                .entry(sold_at.date_naive())
                .or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(total);
        }
        let ventas_por_dia = per_day
            .into_iter()
            .rev()
            .map(|(dia, (total_ventas, total_ingresos))| DailySales {
                dia,
                total_ventas,
                total_ingresos,
            })
            .collect();

        let productos_mas_vendidos = sale_item::Entity::find()
            .inner_join(sale::Entity)
            .filter(sale::Column::SoldAt.gte(since))
            .select_only()
            .column_as(sale_item::Column::Sku, "sku")
            .column_as(sale_item::Column::Description, "descripcion")
            .column_as(Expr::col(sale_item::Column::Quantity).sum(), "total_vendido")
            .column_as(Expr::col(sale_item::Column::Subtotal).sum(), "total_ingresos")
            .group_by(sale_item::Column::Sku)
            .group_by(sale_item::Column::Description)
            .order_by(Expr::col(sale_item::Column::Quantity).sum(), Order::Desc)
            .order_by_asc(sale_item::Column::Sku)
            .limit(TOP_PRODUCTS)
            .into_model::<TopProduct>()
            .all(db)
            .await?;

        Ok(SalesSummaryResponse {
            periodo: period.as_str().to_string(),
            desde: since,
            estadisticas,
            ventas_por_dia,
            productos_mas_vendidos,
        })
    }
}

async fn sales_stats<C: ConnectionTrait>(db: &C, condition: Condition) -> Result<SalesStats, ServiceError> {
    let row = sale::Entity::find()
        .filter(condition)
        .select_only()
        .column_as(Expr::col(sale::Column::Id).count(), "total_ventas")
        .column_as(Expr::col(sale::Column::Total).sum(), "total_ingresos")
        .column_as(Expr::col(sale::Column::Seller).count_distinct(), "total_vendedores")
        .into_model::<TotalsRow>()
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::InternalError("aggregate query returned no row".into()))?;

    let income = row.total_ingresos.unwrap_or(Decimal::ZERO);
    let average = if row.total_ventas > 0 {
        (income / Decimal::from(row.total_ventas)).round_dp(2)
    } else {
        Decimal::ZERO
    };
    Ok(SalesStats {
        total_ventas: row.total_ventas,
        total_ingresos: income,
        promedio_venta: average,
        total_vendedores: row.total_vendedores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::PaginatorTrait;

    async fn service() -> SalesService {
        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        SalesService::new(Arc::new(db), TransactionOptions::default(), 10, 100)
    }

    fn item(sku: &str, quantity: LooseNumber, price: LooseNumber) -> SaleItemInput {
        SaleItemInput {
            sku: sku.to_string(),
            description: None,
            quantity,
            unit_price: price,
        }
    }

    fn sale_request(seller: &str, items: Vec<SaleItemInput>) -> CreateSaleRequest {
        CreateSaleRequest {
            receipt_number: None,
            sold_at: None,
            seller: seller.to_string(),
            payment_method: "efectivo".to_string(),
            total: None,
            amount_received: None,
            items: Some(items),
        }
    }

    #[rstest]
    #[case("hoy", ReportPeriod::Today)]
    #[case("SEMANA", ReportPeriod::Week)]
    #[case("mes", ReportPeriod::Month)]
    #[case("anio", ReportPeriod::Year)]
    fn report_periods_parse(#[case] token: &str, #[case] expected: ReportPeriod) {
        assert_eq!(ReportPeriod::parse(token).unwrap(), expected);
    }

    #[test]
    fn report_windows_start_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 30, 0).unwrap();
        assert_eq!(
            ReportPeriod::Today.since(now),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ReportPeriod::Week.since(now),
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ReportPeriod::Month.since(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ReportPeriod::Year.since(now),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_matches!(ReportPeriod::parse("siglo"), Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn total_defaults_to_sum_of_subtotals() {
        let service = service().await;
        let mut request = sale_request(
            "Ana",
            vec![
                item("A", LooseNumber::from(2), LooseNumber::from("10.5")),
                item("B", LooseNumber::from("3"), LooseNumber::from(4)),
            ],
        );
        request.amount_received = Some(LooseNumber::from(40));

        let created = service.create(request).await.unwrap();
        let detail = service.get(created.sale_id).await.unwrap();

        assert_eq!(detail.sale.total, Decimal::from(33));
        assert_eq!(detail.sale.vuelto, Decimal::from(7));
        assert!(detail.sale.numero_boleta.starts_with("B-"));
        assert_eq!(
            detail.items.iter().map(|i| i.sku.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(detail.items[0].subtotal, Decimal::from(21));
    }

    #[tokio::test]
    async fn bad_quantity_leaves_no_rows() {
        let service = service().await;
        let request = sale_request(
            "Ana",
            vec![
                item("A", LooseNumber::from(1), LooseNumber::from(5)),
                item("B", LooseNumber::from("muchos"), LooseNumber::from(5)),
            ],
        );
        assert_matches!(service.create(request).await, Err(ServiceError::ValidationError(_)));
        assert_eq!(sale::Entity::find().count(&*service.db).await.unwrap(), 0);
        assert_eq!(sale_item::Entity::find().count(&*service.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_items_are_rejected() {
        let service = service().await;
        assert_matches!(
            service.create(sale_request("Ana", vec![])).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut missing = sale_request("Ana", vec![]);
        missing.items = None;
        assert_matches!(service.create(missing).await, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn history_aggregates_filtered_set() {
        let service = service().await;
        for (seller, price) in [("Juan", 10), ("Juan", 30), ("Maria", 5)] {
            service
                .create(sale_request(
                    seller,
                    vec![item("X", LooseNumber::from(1), LooseNumber::from(price))],
                ))
                .await
                .unwrap();
        }

        let all = service.history(&SalesHistoryQuery::default()).await.unwrap();
        assert_eq!(all.estadisticas.total_ventas, 3);
        assert_eq!(all.estadisticas.total_vendedores, 2);
        assert_eq!(all.top_vendedores[0].vendedor, "Juan");
        assert_eq!(all.top_vendedores[0].total_ventas, 2);
        assert_eq!(all.formas_pago.len(), 1);
        assert_eq!(all.formas_pago[0].cantidad, 3);

        let juan = service
            .history(&SalesHistoryQuery {
                vendedor: Some("jua".into()),
                ordenar_por: Some("total".into()),
                orden: Some("asc".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(juan.ventas.len(), 2);
        assert_eq!(juan.ventas[0].total, Decimal::from(10));
        assert_eq!(juan.estadisticas.total_ingresos, Decimal::from(40));
        assert_eq!(juan.estadisticas.promedio_venta, Decimal::from(20));
    }

    #[tokio::test]
    async fn history_rejects_unknown_sort_and_bad_dates() {
        let service = service().await;
        assert_matches!(
            service
                .history(&SalesHistoryQuery {
                    ordenar_por: Some("DROP TABLE x".into()),
                    ..Default::default()
                })
                .await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service
                .history(&SalesHistoryQuery {
                    fecha_inicio: Some("ayer".into()),
                    ..Default::default()
                })
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn summary_groups_best_sellers() {
        let service = service().await;
        service
            .create(sale_request(
                "Ana",
                vec![
                    item("CAR-1", LooseNumber::from(3), LooseNumber::from(2)),
                    item("PAN-1", LooseNumber::from(1), LooseNumber::from(50)),
                ],
            ))
            .await
            .unwrap();
        service
            .create(sale_request(
                "Ana",
                vec![item("CAR-1", LooseNumber::from(2), LooseNumber::from(2))],
            ))
            .await
            .unwrap();

        let report = service.summary_report("hoy").await.unwrap();
        assert_eq!(report.periodo, "hoy");
        assert_eq!(report.estadisticas.total_ventas, 2);
        assert_eq!(report.ventas_por_dia.len(), 1);
        assert_eq!(report.ventas_por_dia[0].total_ventas, 2);
        assert_eq!(report.productos_mas_vendidos[0].sku, "CAR-1");
        assert_eq!(report.productos_mas_vendidos[0].total_vendido, 5);
    }
}
