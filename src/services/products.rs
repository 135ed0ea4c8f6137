use crate::{
    db::{
        parse_filter, query_builder::search_rank, run_in_transaction, DbPool, FilterSet,
        Pagination, PaginationMeta, QueryBuilder, SortDirection, SortField, TransactionOptions,
    },
    entities::{brand, order_part, part_type, product, sale_item},
    errors::ServiceError,
    models::LooseNumber,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Sortable columns of the product listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    Name,
    Sku,
    Price,
    Stock,
    CreatedAt,
}

impl SortField for ProductSort {
    type Entity = product::Entity;

    const FIELDS: &'static [(&'static str, Self)] = &[
        ("nombre", Self::Name),
        ("sku", Self::Sku),
        ("precio", Self::Price),
        ("stock", Self::Stock),
        ("fecha_creacion", Self::CreatedAt),
    ];

    fn column(self) -> product::Column {
        match self {
            Self::Name => product::Column::Name,
            Self::Sku => product::Column::Sku,
            Self::Price => product::Column::Price,
            Self::Stock => product::Column::Stock,
            Self::CreatedAt => product::Column::CreatedAt,
        }
    }
}

/// Raw query string of `GET /productos`; values are validated by the service
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub pagina: Option<String>,
    pub limite: Option<String>,
    pub por_pagina: Option<String>,
    /// Substring of name, SKU or description
    pub busqueda: Option<String>,
    pub marca_id: Option<String>,
    pub tipo_id: Option<String>,
    /// Only products with at most this much stock
    pub stock_minimo: Option<String>,
    pub ordenar_por: Option<String>,
    pub orden: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: i32,
    pub sku: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    pub price: Option<Decimal>,
    #[serde(rename = "precio_mayor")]
    pub wholesale_price: Option<Decimal>,
    #[serde(rename = "precio_cliente")]
    pub client_price: Option<Decimal>,
    pub stock: i32,
    #[serde(rename = "marca_id")]
    pub brand_id: Option<i32>,
    #[serde(rename = "tipo_id")]
    pub part_type_id: Option<i32>,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            description: model.description,
            price: model.price,
            wholesale_price: model.wholesale_price,
            client_price: model.client_price,
            stock: model.stock,
            brand_id: model.brand_id,
            part_type_id: model.part_type_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Aggregates over the filtered catalog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogStats {
    pub total_productos: i64,
    pub stock_total: i64,
    pub precio_promedio: Decimal,
    pub total_marcas: i64,
    pub total_tipos: i64,
    pub productos_stock_bajo: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub productos: Vec<ProductResponse>,
    pub paginacion: PaginationMeta,
    pub estadisticas: CatalogStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSearchResponse {
    pub busqueda: String,
    pub total: usize,
    pub productos: Vec<ProductResponse>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64, message = "sku must be between 1 and 64 characters"))]
    pub sku: String,
    #[serde(rename = "nombre")]
    #[validate(length(min = 1, max = 200, message = "nombre must be between 1 and 200 characters"))]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "precio", default)]
    #[schema(value_type = Option<f64>)]
    pub price: Option<LooseNumber>,
    #[serde(rename = "precio_mayor", alias = "precio_mayorista", default)]
    #[schema(value_type = Option<f64>)]
    pub wholesale_price: Option<LooseNumber>,
    #[serde(rename = "precio_cliente", default)]
    #[schema(value_type = Option<f64>)]
    pub client_price: Option<LooseNumber>,
    #[serde(default)]
    #[schema(value_type = Option<i32>)]
    pub stock: Option<LooseNumber>,
    #[serde(rename = "marca_id", default)]
    pub brand_id: Option<i32>,
    #[serde(rename = "tipo_id", default)]
    pub part_type_id: Option<i32>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "sku must be between 1 and 64 characters"))]
    pub sku: Option<String>,
    #[serde(rename = "nombre", default)]
    #[validate(length(min = 1, max = 200, message = "nombre must be between 1 and 200 characters"))]
    pub name: Option<String>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "precio", default)]
    #[schema(value_type = Option<f64>)]
    pub price: Option<LooseNumber>,
    #[serde(rename = "precio_mayor", alias = "precio_mayorista", default)]
    #[schema(value_type = Option<f64>)]
    pub wholesale_price: Option<LooseNumber>,
    #[serde(rename = "precio_cliente", default)]
    #[schema(value_type = Option<f64>)]
    pub client_price: Option<LooseNumber>,
    #[serde(default)]
    #[schema(value_type = Option<i32>)]
    pub stock: Option<LooseNumber>,
    #[serde(rename = "marca_id", default)]
    pub brand_id: Option<i32>,
    #[serde(rename = "tipo_id", default)]
    pub part_type_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    #[serde(alias = "sumar")]
    Add,
    #[serde(alias = "restar")]
    Subtract,
    #[serde(alias = "establecer")]
    Set,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    #[serde(rename = "operacion")]
    pub operation: StockOperation,
    #[serde(rename = "cantidad")]
    #[schema(value_type = i32)]
    pub quantity: LooseNumber,
    #[serde(rename = "motivo", default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockAdjustment {
    pub stock_anterior: i32,
    pub stock_nuevo: i32,
    pub diferencia: i32,
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedProduct {
    pub id: i32,
    pub nombre: String,
    pub sku: String,
}

#[derive(Debug, FromQueryResult)]
struct CatalogTotals {
    total_productos: i64,
    stock_total: Option<i64>,
    precio_suma: Option<Decimal>,
    con_precio: i64,
    total_marcas: i64,
    total_tipos: i64,
}

/// Parts catalog: listing with filters and statistics, CRUD and stock moves
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
    tx_options: TransactionOptions,
    default_page_size: u64,
    max_page_size: u64,
    low_stock_threshold: i32,
}

impl ProductService {
    pub fn new(
        db: Arc<DbPool>,
        tx_options: TransactionOptions,
        default_page_size: u64,
        max_page_size: u64,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            db,
            tx_options,
            default_page_size,
            max_page_size,
            low_stock_threshold,
        }
    }

    /// Filtered, sorted page of products plus statistics over every match
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: &ProductListQuery) -> Result<ProductListResponse, ServiceError> {
        let sort = ProductSort::parse_optional(query.ordenar_por.as_deref())?;
        let direction = SortDirection::parse_or(query.orden.as_deref(), SortDirection::Asc)?;
        let brand_id = parse_filter::<i32>(query.marca_id.as_deref(), "marca_id")?;
        let part_type_id = parse_filter::<i32>(query.tipo_id.as_deref(), "tipo_id")?;
        let max_stock = parse_filter::<i32>(query.stock_minimo.as_deref(), "stock_minimo")?;
        let pagination = Pagination::from_raw(
            query.pagina.as_deref(),
            query.limite.as_deref().or(query.por_pagina.as_deref()),
            self.default_page_size,
            self.max_page_size,
        );

        let term = query
            .busqueda
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let filters = FilterSet::new()
            .search(
                &[
                    product::Column::Name,
                    product::Column::Sku,
                    product::Column::Description,
                ],
                term,
            )
            .eq(product::Column::BrandId, brand_id)
            .eq(product::Column::PartTypeId, part_type_id)
            .lte(product::Column::Stock, max_stock);

        let builder = QueryBuilder::<product::Entity>::new(filters, pagination);
        let builder = match (sort, term) {
            (Some(field), _) => builder.order_by(field, direction),
            (None, Some(term)) => builder
                .order_by_expr(
                    search_rank(product::Column::Sku, product::Column::Name, term),
                    Order::Asc,
                )
                .order_by(ProductSort::Name, SortDirection::Asc),
            (None, None) => builder.order_by(ProductSort::Name, direction),
        };

        let db = &*self.db;
        let condition = builder.condition();
        let page = builder.execute(db).await.map_err(|e| {
            error!(error = %e, "Failed to list products");
            ServiceError::DatabaseError(e)
        })?;
        let estadisticas = self.catalog_stats(db, condition).await?;

        Ok(ProductListResponse {
            paginacion: page.meta(),
            productos: page.items.into_iter().map(Into::into).collect(),
            estadisticas,
        })
    }

    async fn catalog_stats<C: ConnectionTrait>(
        &self,
        db: &C,
        condition: Condition,
    ) -> Result<CatalogStats, ServiceError> {
        let totals = product::Entity::find()
            .filter(condition.clone())
            .select_only()
            .column_as(Expr::col(product::Column::Id).count(), "total_productos")
            .column_as(Expr::col(product::Column::Stock).sum(), "stock_total")
            .column_as(Expr::col(product::Column::Price).sum(), "precio_suma")
            .column_as(Expr::col(product::Column::Price).count(), "con_precio")
            .column_as(Expr::col(product::Column::BrandId).count_distinct(), "total_marcas")
            .column_as(
                Expr::col(product::Column::PartTypeId).count_distinct(),
                "total_tipos",
            )
            .into_model::<CatalogTotals>()
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("aggregate query returned no row".into()))?;

        let low_stock = product::Entity::find()
            .filter(condition)
            .filter(product::Column::Stock.lte(self.low_stock_threshold))
            .count(db)
            .await?;

        let average = match (totals.precio_suma, totals.con_precio) {
            (Some(sum), count) if count > 0 => (sum / Decimal::from(count)).round_dp(2),
            _ => Decimal::ZERO,
        };

        Ok(CatalogStats {
            total_productos: totals.total_productos,
            stock_total: totals.stock_total.unwrap_or(0),
            precio_promedio: average,
            total_marcas: totals.total_marcas,
            total_tipos: totals.total_tipos,
            productos_stock_bajo: low_stock,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<ProductResponse, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    /// Ranked search over name and SKU: exact SKU first, then substrings
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> Result<ProductSearchResponse, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ServiceError::ValidationError(
                "Search term must not be empty".to_string(),
            ));
        }

        let pagination = Pagination {
            page: 1,
            page_size: self.max_page_size.max(1),
        };
        let filters = FilterSet::new().search(
            &[
                product::Column::Name,
                product::Column::Sku,
                product::Column::Description,
            ],
            Some(term),
        );
        let rows = QueryBuilder::<product::Entity>::new(filters, pagination)
            .order_by_expr(
                search_rank(product::Column::Sku, product::Column::Name, term),
                Order::Asc,
            )
            .order_by(ProductSort::Name, SortDirection::Asc)
            .select()
            .all(&*self.db)
            .await?;

        Ok(ProductSearchResponse {
            busqueda: term.to_string(),
            total: rows.len(),
            productos: rows.into_iter().map(Into::into).collect(),
        })
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let sku = required_text("sku", &request.sku)?;
        let name = required_text("nombre", &request.name)?;
        let price = optional_price(request.price.as_ref(), "precio")?;
        let wholesale_price = optional_price(request.wholesale_price.as_ref(), "precio_mayor")?;
        let client_price = optional_price(request.client_price.as_ref(), "precio_cliente")?;
        let stock = request
            .stock
            .as_ref()
            .map(|s| to_stock(s, "stock"))
            .transpose()?
            .unwrap_or(0);

        let db = &*self.db;
        ensure_sku_free(db, &sku, None).await?;
        ensure_references(db, request.brand_id, request.part_type_id).await?;

        let created = product::ActiveModel {
            sku: Set(sku.clone()),
            name: Set(name),
            description: Set(trimmed(request.description)),
            price: Set(price),
            wholesale_price: Set(wholesale_price),
            client_price: Set(client_price),
            stock: Set(stock),
            brand_id: Set(request.brand_id),
            part_type_id: Set(request.part_type_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| ServiceError::from_write(e, || duplicate_sku(&sku)))?;

        info!(product_id = created.id, "Product created");
        Ok(created.into())
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: i32,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db;
        let existing = product::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        let sku = request
            .sku
            .as_deref()
            .map(|s| required_text("sku", s))
            .transpose()?;
        if let Some(sku) = sku.as_deref() {
            if sku != existing.sku {
                ensure_sku_free(db, sku, Some(id)).await?;
            }
        }
        ensure_references(db, request.brand_id, request.part_type_id).await?;

        let mut active = existing.into_active_model();
        if let Some(sku) = sku.clone() {
            active.sku = Set(sku);
        }
        if let Some(name) = request.name.as_deref() {
            active.name = Set(required_text("nombre", name)?);
        }
        if let Some(description) = request.description {
            active.description = Set(trimmed(Some(description)));
        }
        if let Some(price) = request.price.as_ref() {
            active.price = Set(optional_price(Some(price), "precio")?);
        }
        if let Some(price) = request.wholesale_price.as_ref() {
            active.wholesale_price = Set(optional_price(Some(price), "precio_mayor")?);
        }
        if let Some(price) = request.client_price.as_ref() {
            active.client_price = Set(optional_price(Some(price), "precio_cliente")?);
        }
        if let Some(stock) = request.stock.as_ref() {
            active.stock = Set(to_stock(stock, "stock")?);
        }
        if request.brand_id.is_some() {
            active.brand_id = Set(request.brand_id);
        }
        if request.part_type_id.is_some() {
            active.part_type_id = Set(request.part_type_id);
        }

        let updated = active.update(db).await.map_err(|e| {
            ServiceError::from_write(e, || duplicate_sku(sku.as_deref().unwrap_or_default()))
        })?;

        info!(product_id = id, "Product updated");
        Ok(updated.into())
    }

    /// Moves stock by `cantidad`; subtracting below zero is refused.
    #[instrument(skip(self, request), fields(operation = ?request.operation))]
    pub async fn adjust_stock(
        &self,
        id: i32,
        request: AdjustStockRequest,
    ) -> Result<StockAdjustment, ServiceError> {
        let operation = request.operation;
        let amount = match operation {
            StockOperation::Set => to_stock(&request.quantity, "cantidad")?,
            StockOperation::Add | StockOperation::Subtract => {
                request.quantity.to_quantity("cantidad")?
            }
        };
        let reason = trimmed(request.reason);

        let adjustment = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let existing = product::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product", id))?;
                let before = existing.stock;
                let after = match operation {
                    StockOperation::Add => before.checked_add(amount),
                    StockOperation::Subtract => before.checked_sub(amount),
                    StockOperation::Set => Some(amount),
                }
                .ok_or_else(|| ServiceError::ValidationError("Stock out of range".to_string()))?;
                if after < 0 {
                    return Err(ServiceError::ValidationError(format!(
                        "Insufficient stock: {} available, {} requested",
                        before, amount
                    )));
                }

                let mut active = existing.into_active_model();
                active.stock = Set(after);
                active.update(txn).await?;

                Ok(StockAdjustment {
                    stock_anterior: before,
                    stock_nuevo: after,
                    diferencia: after - before,
                    motivo: reason,
                })
            })
        })
        .await?;

        info!(
            product_id = id,
            before = adjustment.stock_anterior,
            after = adjustment.stock_nuevo,
            "Stock adjusted"
        );
        Ok(adjustment)
    }

    /// Deletes a product nothing refers to anymore.
    ///
    /// The reference checks and the delete share one transaction, so a sale
    /// or order part written concurrently cannot slip in between them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<DeletedProduct, ServiceError> {
        let deleted = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let existing = product::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product", id))?;

                let sales = sale_item::Entity::find()
                    .filter(sale_item::Column::Sku.eq(existing.sku.as_str()))
                    .count(txn)
                    .await?;
                if sales > 0 {
                    warn!(product_id = id, sales, "Refusing to delete product with sales");
                    return Err(ServiceError::Conflict(format!(
                        "Product '{}' appears in {} sale item(s) and cannot be deleted",
                        existing.sku, sales
                    )));
                }

                let repairs = order_part::Entity::find()
                    .filter(order_part::Column::ProductId.eq(id))
                    .count(txn)
                    .await?;
                if repairs > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Product '{}' is used by {} service order part(s) and cannot be deleted",
                        existing.sku, repairs
                    )));
                }

                product::Entity::delete_by_id(id).exec(txn).await?;
                Ok(DeletedProduct {
                    id,
                    nombre: existing.name,
                    sku: existing.sku,
                })
            })
        })
        .await?;

        info!(product_id = id, "Product deleted");
        Ok(deleted)
    }
}

fn duplicate_sku(sku: &str) -> String {
    format!("Product with SKU '{}' already exists", sku)
}

async fn ensure_sku_free<C: ConnectionTrait>(
    db: &C,
    sku: &str,
    except: Option<i32>,
) -> Result<(), ServiceError> {
    let mut query = product::Entity::find().filter(product::Column::Sku.eq(sku));
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.count(db).await? > 0 {
        return Err(ServiceError::Conflict(duplicate_sku(sku)));
    }
    Ok(())
}

async fn ensure_references<C: ConnectionTrait>(
    db: &C,
    brand_id: Option<i32>,
    part_type_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = brand_id {
        if brand::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Brand {} does not exist",
                id
            )));
        }
    }
    if let Some(id) = part_type_id {
        if part_type::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Part type {} does not exist",
                id
            )));
        }
    }
    Ok(())
}

fn required_text(field: &str, raw: &str) -> Result<String, ServiceError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(value.to_string())
}

fn trimmed(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn optional_price(value: Option<&LooseNumber>, field: &str) -> Result<Option<Decimal>, ServiceError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let price = value.to_decimal(field)?;
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(Some(price.round_dp(2)))
}

fn to_stock(value: &LooseNumber, field: &str) -> Result<i32, ServiceError> {
    let amount = value.to_decimal(field)?;
    if !amount.fract().is_zero() || amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must be a whole number not below zero",
            field
        )));
    }
    amount
        .to_i32()
        .ok_or_else(|| ServiceError::ValidationError(format!("{} is out of range", field)))
}
