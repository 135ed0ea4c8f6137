use crate::{
    db::{
        run_in_transaction, DbPool, FilterSet, Pagination, PaginationMeta, QueryBuilder,
        SortDirection, SortField, TransactionOptions,
    },
    entities::{
        brand, equipment_check, equipment_type, order_fault, order_part, order_photo, product,
        service_order,
    },
    errors::ServiceError,
    models::{
        effective_status,
        numeric::{checked_difference, line_subtotal, money_or_zero},
        resolve_fault_status, LooseNumber, RepairStatus,
    },
    services::{
        generate_code,
        taxonomy::{find_or_create_brand, find_or_create_equipment_type},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Sortable columns of the service-order listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    CreatedAt,
    Code,
    Customer,
    Total,
}

impl SortField for OrderSort {
    type Entity = service_order::Entity;

    const FIELDS: &'static [(&'static str, Self)] = &[
        ("fecha", Self::CreatedAt),
        ("codigo", Self::Code),
        ("cliente", Self::Customer),
        ("total", Self::Total),
    ];

    fn column(self) -> service_order::Column {
        match self {
            Self::CreatedAt => service_order::Column::CreatedAt,
            Self::Code => service_order::Column::Code,
            Self::Customer => service_order::Column::CustomerName,
            Self::Total => service_order::Column::Total,
        }
    }
}

/// Intake checklist as sent by the front desk
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EquipmentCheckInput {
    #[serde(rename = "enciende", default)]
    pub powers_on: bool,
    #[serde(rename = "bandeja_sim", default)]
    pub sim_tray: bool,
    #[serde(rename = "golpes", default)]
    pub impact_damage: bool,
    #[serde(rename = "humedad", default)]
    pub moisture: bool,
    #[serde(rename = "parlante", default)]
    pub speaker: bool,
    #[serde(rename = "microfono", default)]
    pub microphone: bool,
    #[serde(rename = "auricular", default)]
    pub earpiece: bool,
    #[serde(rename = "otros", default)]
    pub other: Option<String>,
}

/// A fault is either plain text or a description with a status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FaultInput {
    Text(String),
    Detailed {
        #[serde(rename = "descripcion")]
        description: String,
        #[serde(rename = "estado", default)]
        status: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PartInput {
    #[serde(rename = "producto_id", default)]
    pub product_id: Option<i32>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "cantidad")]
    #[schema(value_type = i32)]
    pub quantity: LooseNumber,
    #[serde(rename = "precio_unitario")]
    #[schema(value_type = f64)]
    pub unit_price: LooseNumber,
}

/// A photo is either a bare path or `{ "ruta": ... }`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PhotoInput {
    Path(String),
    Detailed {
        #[serde(rename = "ruta", alias = "path")]
        path: String,
    },
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateServiceOrderRequest {
    /// Generated as `OS-XXXXXXXX` when absent
    #[serde(rename = "codigo", default)]
    pub code: Option<String>,
    #[serde(rename = "cliente_nombre")]
    #[validate(length(min = 1, max = 150, message = "cliente_nombre must be between 1 and 150 characters"))]
    pub customer_name: String,
    #[serde(rename = "cliente_telefono", default)]
    #[validate(length(max = 40))]
    pub customer_phone: Option<String>,
    #[serde(rename = "cliente_email", default)]
    #[validate(email(message = "cliente_email must be a valid email"))]
    pub customer_email: Option<String>,
    #[serde(rename = "marca_id", default)]
    pub brand_id: Option<i32>,
    /// Brand name, created on demand when no `marca_id` is given
    #[serde(rename = "marca", default)]
    pub brand_name: Option<String>,
    #[serde(rename = "tipo_equipo_id", default)]
    pub equipment_type_id: Option<i32>,
    #[serde(rename = "tipo_equipo", default)]
    pub equipment_type_name: Option<String>,
    #[serde(rename = "modelo", default)]
    pub model: Option<String>,
    #[serde(rename = "diagnostico", default)]
    pub diagnosis: Option<String>,
    #[serde(rename = "observaciones", default)]
    pub observations: Option<String>,
    #[serde(rename = "costo_reparacion", default)]
    #[schema(value_type = Option<f64>)]
    pub repair_cost: Option<LooseNumber>,
    #[serde(rename = "abono", default)]
    #[schema(value_type = Option<f64>)]
    pub advance_payment: Option<LooseNumber>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
    #[serde(rename = "verificaciones", default)]
    pub checks: Option<Vec<EquipmentCheckInput>>,
    #[serde(rename = "fallas", default)]
    pub faults: Option<Vec<FaultInput>>,
    #[serde(rename = "repuestos", default)]
    pub parts: Option<Vec<PartInput>>,
    #[serde(rename = "fotos", default)]
    pub photos: Option<Vec<PhotoInput>>,
}

/// Full-replace update: absent header fields keep their value, present
/// child arrays replace the stored set.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateServiceOrderRequest {
    #[serde(rename = "cliente_nombre", default)]
    #[validate(length(min = 1, max = 150, message = "cliente_nombre must be between 1 and 150 characters"))]
    pub customer_name: Option<String>,
    #[serde(rename = "cliente_telefono", default)]
    #[validate(length(max = 40))]
    pub customer_phone: Option<String>,
    #[serde(rename = "cliente_email", default)]
    #[validate(email(message = "cliente_email must be a valid email"))]
    pub customer_email: Option<String>,
    #[serde(rename = "marca_id", default)]
    pub brand_id: Option<i32>,
    #[serde(rename = "marca", default)]
    pub brand_name: Option<String>,
    #[serde(rename = "tipo_equipo_id", default)]
    pub equipment_type_id: Option<i32>,
    #[serde(rename = "tipo_equipo", default)]
    pub equipment_type_name: Option<String>,
    #[serde(rename = "modelo", default)]
    pub model: Option<String>,
    #[serde(rename = "diagnostico", default)]
    pub diagnosis: Option<String>,
    #[serde(rename = "observaciones", default)]
    pub observations: Option<String>,
    #[serde(rename = "costo_reparacion", default)]
    #[schema(value_type = Option<f64>)]
    pub repair_cost: Option<LooseNumber>,
    #[serde(rename = "abono", default)]
    #[schema(value_type = Option<f64>)]
    pub advance_payment: Option<LooseNumber>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
    #[serde(rename = "verificaciones", default)]
    pub checks: Option<Vec<EquipmentCheckInput>>,
    #[serde(rename = "fallas", default)]
    pub faults: Option<Vec<FaultInput>>,
    #[serde(rename = "repuestos", default)]
    pub parts: Option<Vec<PartInput>>,
    #[serde(rename = "fotos", default)]
    pub photos: Option<Vec<PhotoInput>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRepairStatusRequest {
    pub estado: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateServiceOrderResponse {
    pub message: String,
    #[serde(rename = "ordenId")]
    pub order_id: i32,
    #[serde(rename = "codigo")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentCheckResponse {
    pub enciende: bool,
    pub bandeja_sim: bool,
    pub golpes: bool,
    pub humedad: bool,
    pub parlante: bool,
    pub microfono: bool,
    pub auricular: bool,
    pub otros: Option<String>,
}

impl From<equipment_check::Model> for EquipmentCheckResponse {
    fn from(m: equipment_check::Model) -> Self {
        Self {
            enciende: m.powers_on,
            bandeja_sim: m.sim_tray,
            golpes: m.impact_damage,
            humedad: m.moisture,
            parlante: m.speaker,
            microfono: m.microphone,
            auricular: m.earpiece,
            otros: m.other,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FaultResponse {
    pub id: i32,
    pub descripcion: String,
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartResponse {
    pub id: i32,
    pub producto_id: Option<i32>,
    pub descripcion: Option<String>,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PhotoResponse {
    pub id: i32,
    pub ruta: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceOrderDetail {
    pub id: i32,
    pub codigo: String,
    pub cliente_nombre: String,
    pub cliente_telefono: Option<String>,
    pub cliente_email: Option<String>,
    pub marca_id: Option<i32>,
    pub marca: Option<String>,
    pub tipo_equipo_id: Option<i32>,
    pub tipo_equipo: Option<String>,
    pub modelo: Option<String>,
    pub diagnostico: Option<String>,
    pub observaciones: Option<String>,
    pub costo_reparacion: Decimal,
    pub abono: Decimal,
    pub total: Decimal,
    /// Effective status: fault-derived when not PENDING, else `estado_orden`
    pub estado: RepairStatus,
    pub estado_orden: RepairStatus,
    pub estado_fallas: RepairStatus,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
    pub verificaciones: Vec<EquipmentCheckResponse>,
    pub fallas: Vec<FaultResponse>,
    pub repuestos: Vec<PartResponse>,
    pub fotos: Vec<PhotoResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceOrderSummary {
    pub id: i32,
    pub codigo: String,
    pub cliente_nombre: String,
    pub cliente_telefono: Option<String>,
    pub marca_id: Option<i32>,
    pub tipo_equipo_id: Option<i32>,
    pub modelo: Option<String>,
    pub total: Decimal,
    pub estado: RepairStatus,
    pub estado_orden: RepairStatus,
    pub fecha_creacion: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceOrderListResponse {
    pub ordenes: Vec<ServiceOrderSummary>,
    pub paginacion: PaginationMeta,
}

/// Raw query string of `GET /ordenes-servicio`
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceOrderListQuery {
    pub pagina: Option<String>,
    pub limite: Option<String>,
    /// Substring of code, customer name or phone
    pub busqueda: Option<String>,
    /// Persisted repair status
    pub estado: Option<String>,
    pub marca_id: Option<String>,
    pub ordenar_por: Option<String>,
    pub orden: Option<String>,
}

/// Child collections of one write; `None` leaves a relation untouched.
#[derive(Debug, Default)]
struct ChildSets {
    checks: Option<Vec<EquipmentCheckInput>>,
    faults: Option<Vec<FaultInput>>,
    parts: Option<Vec<PartInput>>,
    photos: Option<Vec<PhotoInput>>,
}

fn persisted_status(order: &service_order::Model) -> RepairStatus {
    RepairStatus::parse(&order.repair_status).unwrap_or_else(|_| {
        warn!(order_id = order.id, status = %order.repair_status, "Unreadable repair status, using PENDING");
        RepairStatus::Pending
    })
}

fn clean(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn money(value: Option<&LooseNumber>, field: &str) -> Result<Decimal, ServiceError> {
    money_or_zero(value, field).map(|d| d.round_dp(2))
}

/// Explicit id wins (and must exist); otherwise a non-blank name is
/// resolved through find-or-create.
async fn resolve_brand<C: ConnectionTrait>(
    conn: &C,
    id: Option<i32>,
    name: Option<&str>,
) -> Result<Option<i32>, ServiceError> {
    if let Some(id) = id {
        return match brand::Entity::find_by_id(id).one(conn).await? {
            Some(_) => Ok(Some(id)),
            None => Err(ServiceError::ValidationError(format!("Brand {} does not exist", id))),
        };
    }
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => find_or_create_brand(conn, name).await.map(Some),
        None => Ok(None),
    }
}

async fn resolve_equipment_type<C: ConnectionTrait>(
    conn: &C,
    id: Option<i32>,
    name: Option<&str>,
) -> Result<Option<i32>, ServiceError> {
    if let Some(id) = id {
        return match equipment_type::Entity::find_by_id(id).one(conn).await? {
            Some(_) => Ok(Some(id)),
            None => Err(ServiceError::ValidationError(format!(
                "Equipment type {} does not exist",
                id
            ))),
        };
    }
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => find_or_create_equipment_type(conn, name).await.map(Some),
        None => Ok(None),
    }
}

/// Writes every present child relation in order: checks, faults, parts,
/// photos. With `replace`, stored rows of a present relation are deleted
/// first.
async fn write_children(
    txn: &DatabaseTransaction,
    order_id: i32,
    children: ChildSets,
    replace: bool,
) -> Result<(), ServiceError> {
    if let Some(checks) = children.checks {
        if checks.len() > 1 {
            return Err(ServiceError::ValidationError(
                "verificaciones accepts at most one checklist per order".to_string(),
            ));
        }
        if replace {
            equipment_check::Entity::delete_many()
                .filter(equipment_check::Column::OrderId.eq(order_id))
                .exec(txn)
                .await?;
        }
        if let Some(check) = checks.into_iter().next() {
            equipment_check::ActiveModel {
                order_id: Set(order_id),
                powers_on: Set(check.powers_on),
                sim_tray: Set(check.sim_tray),
                impact_damage: Set(check.impact_damage),
                moisture: Set(check.moisture),
                speaker: Set(check.speaker),
                microphone: Set(check.microphone),
                earpiece: Set(check.earpiece),
                other: Set(clean(check.other)),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }
    }

    if let Some(faults) = children.faults {
        if replace {
            order_fault::Entity::delete_many()
                .filter(order_fault::Column::OrderId.eq(order_id))
                .exec(txn)
                .await?;
        }
        let mut rows = Vec::with_capacity(faults.len());
        for (position, fault) in faults.into_iter().enumerate() {
            let (description, status) = match fault {
                FaultInput::Text(description) => (description, None),
                FaultInput::Detailed {
                    description,
                    status,
                } => (description, status),
            };
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "fallas[{}].descripcion must not be empty",
                    position
                )));
            }
            let status = match clean(status) {
                Some(raw) => Some(RepairStatus::parse(&raw)?.as_str().to_string()),
                None => None,
            };
            rows.push(order_fault::ActiveModel {
                order_id: Set(order_id),
                position: Set(position as i32),
                description: Set(description),
                status: Set(status),
                ..Default::default()
            });
        }
        if !rows.is_empty() {
            order_fault::Entity::insert_many(rows)
                .exec_without_returning(txn)
                .await?;
        }
    }

    if let Some(parts) = children.parts {
        if replace {
            order_part::Entity::delete_many()
                .filter(order_part::Column::OrderId.eq(order_id))
                .exec(txn)
                .await?;
        }
        let mut rows = Vec::with_capacity(parts.len());
        let mut referenced = BTreeSet::new();
        for (position, part) in parts.into_iter().enumerate() {
            let quantity = part
                .quantity
                .to_quantity(&format!("repuestos[{}].cantidad", position))?;
            let unit_price = part
                .unit_price
                .to_decimal(&format!("repuestos[{}].precio_unitario", position))?
                .round_dp(2);
            line_subtotal(unit_price, quantity, &format!("repuestos[{}].subtotal", position))?;
            if let Some(product_id) = part.product_id {
                referenced.insert(product_id);
            }
            rows.push(order_part::ActiveModel {
                order_id: Set(order_id),
                position: Set(position as i32),
                product_id: Set(part.product_id),
                description: Set(clean(part.description)),
                quantity: Set(quantity),
                unit_price: Set(unit_price),
                ..Default::default()
            });
        }
        if !referenced.is_empty() {
            let found = product::Entity::find()
                .filter(product::Column::Id.is_in(referenced.iter().copied()))
                .count(txn)
                .await?;
            if found as usize != referenced.len() {
                return Err(ServiceError::ValidationError(
                    "repuestos references a product that does not exist".to_string(),
                ));
            }
        }
        if !rows.is_empty() {
            order_part::Entity::insert_many(rows)
                .exec_without_returning(txn)
                .await?;
        }
    }

    if let Some(photos) = children.photos {
        if replace {
            order_photo::Entity::delete_many()
                .filter(order_photo::Column::OrderId.eq(order_id))
                .exec(txn)
                .await?;
        }
        let mut rows = Vec::with_capacity(photos.len());
        for (position, photo) in photos.into_iter().enumerate() {
            let path = match photo {
                PhotoInput::Path(path) | PhotoInput::Detailed { path } => path.trim().to_string(),
            };
            if path.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "fotos[{}] must not be empty",
                    position
                )));
            }
            rows.push(order_photo::ActiveModel {
                order_id: Set(order_id),
                position: Set(position as i32),
                path: Set(path),
                ..Default::default()
            });
        }
        if !rows.is_empty() {
            order_photo::Entity::insert_many(rows)
                .exec_without_returning(txn)
                .await?;
        }
    }

    Ok(())
}

/// Repair orders with their checklist, faults, parts and photos
#[derive(Clone)]
pub struct ServiceOrderService {
    db: Arc<DbPool>,
    tx_options: TransactionOptions,
    default_page_size: u64,
    max_page_size: u64,
}

impl ServiceOrderService {
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

    /// Creates the order and all of its child rows in one transaction.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateServiceOrderRequest,
    ) -> Result<CreateServiceOrderResponse, ServiceError> {
        request.validate()?;
        let customer_name = request.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ServiceError::ValidationError(
                "cliente_nombre must not be empty".to_string(),
            ));
        }
        let status = match request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => RepairStatus::parse(raw)?,
            None => RepairStatus::Pending,
        };
        let code = clean(request.code).unwrap_or_else(|| generate_code("OS"));
        let children = ChildSets {
            checks: request.checks,
            faults: request.faults,
            parts: request.parts,
            photos: request.photos,
        };
        let header = request_header(
            request.customer_phone,
            request.customer_email,
            request.model,
            request.diagnosis,
            request.observations,
        );
        let (brand_id, brand_name) = (request.brand_id, request.brand_name);
        let (type_id, type_name) = (request.equipment_type_id, request.equipment_type_name);
        let repair_cost = request.repair_cost;
        let advance_payment = request.advance_payment;

        let order_code = code.clone();
        let order_id = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let repair_cost = money(repair_cost.as_ref(), "costo_reparacion")?;
                let advance_payment = money(advance_payment.as_ref(), "abono")?;
                let total = checked_difference(repair_cost, advance_payment, "total")?;
                let brand_id = resolve_brand(txn, brand_id, brand_name.as_deref()).await?;
                let equipment_type_id =
                    resolve_equipment_type(txn, type_id, type_name.as_deref()).await?;

                let created = service_order::ActiveModel {
                    code: Set(order_code.clone()),
                    customer_name: Set(customer_name),
                    customer_phone: Set(header.phone),
                    customer_email: Set(header.email),
                    brand_id: Set(brand_id),
                    equipment_type_id: Set(equipment_type_id),
                    model: Set(header.model),
                    diagnosis: Set(header.diagnosis),
                    observations: Set(header.observations),
                    repair_cost: Set(repair_cost),
                    advance_payment: Set(advance_payment),
                    total: Set(total),
                    repair_status: Set(status.as_str().to_string()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(|e| {
                    ServiceError::from_write(e, || {
                        format!("Service order '{}' already exists", order_code)
                    })
                })?;

                write_children(txn, created.id, children, false).await?;
                Ok(created.id)
            })
        })
        .await?;

        info!(order_id, code = %code, "Service order created");
        Ok(CreateServiceOrderResponse {
            message: "Orden de servicio creada exitosamente".to_string(),
            order_id,
            code,
        })
    }

    /// Header first, then every child collection concurrently.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<ServiceOrderDetail, ServiceError> {
        let db = &*self.db;
        let order = service_order::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Service order", id))?;

        let brand_id = order.brand_id;
        let type_id = order.equipment_type_id;
        let children = tokio::try_join!(
            equipment_check::Entity::find()
                .filter(equipment_check::Column::OrderId.eq(id))
                .order_by_asc(equipment_check::Column::Id)
                .all(db),
            order_fault::Entity::find()
                .filter(order_fault::Column::OrderId.eq(id))
                .order_by_asc(order_fault::Column::Position)
                .order_by_asc(order_fault::Column::Id)
                .all(db),
            order_part::Entity::find()
                .filter(order_part::Column::OrderId.eq(id))
                .order_by_asc(order_part::Column::Position)
                .order_by_asc(order_part::Column::Id)
                .all(db),
            order_photo::Entity::find()
                .filter(order_photo::Column::OrderId.eq(id))
                .order_by_asc(order_photo::Column::Position)
                .order_by_asc(order_photo::Column::Id)
                .all(db),
            async {
                match brand_id {
                    Some(bid) => brand::Entity::find_by_id(bid)
                        .one(db)
                        .await
                        .map(|found| found.map(|b| b.name)),
                    None => Ok(None),
                }
            },
            async {
                match type_id {
                    Some(tid) => equipment_type::Entity::find_by_id(tid)
                        .one(db)
                        .await
                        .map(|found| found.map(|t| t.name)),
                    None => Ok(None),
                }
            },
        );
        let (checks, faults, parts, photos, brand_name, type_name) = children.map_err(|e| {
            error!(order_id = id, error = %e, "Failed to load service order children");
            ServiceError::DatabaseError(e)
        })?;

        let from_faults = resolve_fault_status(faults.iter().map(|f| f.status.as_deref()));
        let persisted = persisted_status(&order);

        Ok(ServiceOrderDetail {
            id: order.id,
            codigo: order.code,
            cliente_nombre: order.customer_name,
            cliente_telefono: order.customer_phone,
            cliente_email: order.customer_email,
            marca_id: order.brand_id,
            marca: brand_name,
            tipo_equipo_id: order.equipment_type_id,
            tipo_equipo: type_name,
            modelo: order.model,
            diagnostico: order.diagnosis,
            observaciones: order.observations,
            costo_reparacion: order.repair_cost,
            abono: order.advance_payment,
            total: order.total,
            estado: effective_status(persisted, from_faults),
            estado_orden: persisted,
            estado_fallas: from_faults,
            fecha_creacion: order.created_at,
            fecha_actualizacion: order.updated_at,
            verificaciones: checks.into_iter().map(Into::into).collect(),
            fallas: faults
                .into_iter()
                .map(|f| FaultResponse {
                    id: f.id,
                    descripcion: f.description,
                    estado: f.status,
                })
                .collect(),
            repuestos: parts
                .into_iter()
                .map(|p| PartResponse {
                    id: p.id,
                    producto_id: p.product_id,
                    descripcion: p.description,
                    cantidad: p.quantity,
                    subtotal: p.unit_price.saturating_mul(Decimal::from(p.quantity)),
                    precio_unitario: p.unit_price,
                })
                .collect(),
            fotos: photos
                .into_iter()
                .map(|p| PhotoResponse { id: p.id, ruta: p.path })
                .collect(),
        })
    }

    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        query: &ServiceOrderListQuery,
    ) -> Result<ServiceOrderListResponse, ServiceError> {
        let sort = OrderSort::parse_optional(query.ordenar_por.as_deref())?
            .unwrap_or(OrderSort::CreatedAt);
        let direction = SortDirection::parse_or(query.orden.as_deref(), SortDirection::Desc)?;
        let status = match query.estado.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(RepairStatus::parse(raw)?),
            None => None,
        };
        let brand_id = crate::db::parse_filter::<i32>(query.marca_id.as_deref(), "marca_id")?;
        let pagination = Pagination::from_raw(
            query.pagina.as_deref(),
            query.limite.as_deref(),
            self.default_page_size,
            self.max_page_size,
        );

        let filters = FilterSet::new()
            .search(
                &[
                    service_order::Column::Code,
                    service_order::Column::CustomerName,
                    service_order::Column::CustomerPhone,
                ],
                query.busqueda.as_deref(),
            )
            .eq(
                service_order::Column::RepairStatus,
                status.map(|s| s.as_str().to_string()),
            )
            .eq(service_order::Column::BrandId, brand_id);

        let db = &*self.db;
        let page = QueryBuilder::<service_order::Entity>::new(filters, pagination)
            .order_by(sort, direction)
            .execute(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list service orders");
                ServiceError::DatabaseError(e)
            })?;

        let ids: Vec<i32> = page.items.iter().map(|o| o.id).collect();
        let mut fault_statuses: HashMap<i32, Vec<Option<String>>> = HashMap::new();
        if !ids.is_empty() {
            let faults = order_fault::Entity::find()
                .filter(order_fault::Column::OrderId.is_in(ids))
                .order_by_asc(order_fault::Column::OrderId)
                .order_by_asc(order_fault::Column::Position)
                .order_by_asc(order_fault::Column::Id)
                .all(db)
                .await?;
            for fault in faults {
                fault_statuses
                    .entry(fault.order_id)
                    .or_default()
                    .push(fault.status);
            }
        }

        let paginacion = page.meta();
        let ordenes = page
            .items
            .into_iter()
            .map(|order| {
                let from_faults = fault_statuses
                    .get(&order.id)
                    .map(|statuses| resolve_fault_status(statuses.iter().map(|s| s.as_deref())))
                    .unwrap_or_default();
                let persisted = persisted_status(&order);
                ServiceOrderSummary {
                    id: order.id,
                    codigo: order.code,
                    cliente_nombre: order.customer_name,
                    cliente_telefono: order.customer_phone,
                    marca_id: order.brand_id,
                    tipo_equipo_id: order.equipment_type_id,
                    modelo: order.model,
                    total: order.total,
                    estado: effective_status(persisted, from_faults),
                    estado_orden: persisted,
                    fecha_creacion: order.created_at,
                }
            })
            .collect();

        Ok(ServiceOrderListResponse { ordenes, paginacion })
    }

    /// Coalesce-merges the header and replaces every child relation present
    /// in the request.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: i32,
        request: UpdateServiceOrderRequest,
    ) -> Result<ServiceOrderDetail, ServiceError> {
        request.validate()?;
        let next_status = match request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(RepairStatus::parse(raw)?),
            None => None,
        };

        run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let existing = service_order::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Service order", id))?;

                let brand_id = match (request.brand_id, request.brand_name.as_deref()) {
                    (None, None) => existing.brand_id,
                    (given, name) => resolve_brand(txn, given, name)
                        .await?
                        .or(existing.brand_id),
                };
                let equipment_type_id = match (
                    request.equipment_type_id,
                    request.equipment_type_name.as_deref(),
                ) {
                    (None, None) => existing.equipment_type_id,
                    (given, name) => resolve_equipment_type(txn, given, name)
                        .await?
                        .or(existing.equipment_type_id),
                };

                let repair_cost = match request.repair_cost.as_ref() {
                    Some(value) => money(Some(value), "costo_reparacion")?,
                    None => existing.repair_cost,
                };
                let advance_payment = match request.advance_payment.as_ref() {
                    Some(value) => money(Some(value), "abono")?,
                    None => existing.advance_payment,
                };
                let total = checked_difference(repair_cost, advance_payment, "total")?;
                let status = match next_status {
                    Some(next) => persisted_status(&existing).transition_to(next)?,
                    None => persisted_status(&existing),
                };

                let mut active = existing.into_active_model();
                if let Some(name) = clean(request.customer_name) {
                    active.customer_name = Set(name);
                }
                if let Some(phone) = clean(request.customer_phone) {
                    active.customer_phone = Set(Some(phone));
                }
                if let Some(email) = clean(request.customer_email) {
                    active.customer_email = Set(Some(email));
                }
                if let Some(model) = clean(request.model) {
                    active.model = Set(Some(model));
                }
                if let Some(diagnosis) = clean(request.diagnosis) {
                    active.diagnosis = Set(Some(diagnosis));
                }
                if let Some(observations) = clean(request.observations) {
                    active.observations = Set(Some(observations));
                }
                active.brand_id = Set(brand_id);
                active.equipment_type_id = Set(equipment_type_id);
                active.repair_cost = Set(repair_cost);
                active.advance_payment = Set(advance_payment);
                active.total = Set(total);
                active.repair_status = Set(status.as_str().to_string());
                active.update(txn).await?;

                let children = ChildSets {
                    checks: request.checks,
                    faults: request.faults,
                    parts: request.parts,
                    photos: request.photos,
                };
                write_children(txn, id, children, true).await
            })
        })
        .await?;

        info!(order_id = id, "Service order updated");
        self.get(id).await
    }

    /// Moves the persisted repair status one step forward.
    #[instrument(skip(self, request), fields(estado = %request.estado))]
    pub async fn update_status(
        &self,
        id: i32,
        request: UpdateRepairStatusRequest,
    ) -> Result<ServiceOrderDetail, ServiceError> {
        let next = RepairStatus::parse(&request.estado)?;

        let (from, to) = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let existing = service_order::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Service order", id))?;
                let current = persisted_status(&existing);
                let next = current.transition_to(next)?;
                if next != current {
                    let mut active = existing.into_active_model();
                    active.repair_status = Set(next.as_str().to_string());
                    active.update(txn).await?;
                }
                Ok((current, next))
            })
        })
        .await?;

        info!(order_id = id, from = %from, to = %to, "Repair status changed");
        self.get(id).await
    }

    /// Deletes the order after its checks, faults, parts and photos.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                if service_order::Entity::find_by_id(id).one(txn).await?.is_none() {
                    return Err(ServiceError::not_found("Service order", id));
                }
                equipment_check::Entity::delete_many()
                    .filter(equipment_check::Column::OrderId.eq(id))
                    .exec(txn)
                    .await?;
                order_fault::Entity::delete_many()
                    .filter(order_fault::Column::OrderId.eq(id))
                    .exec(txn)
                    .await?;
                order_part::Entity::delete_many()
                    .filter(order_part::Column::OrderId.eq(id))
                    .exec(txn)
                    .await?;
                order_photo::Entity::delete_many()
                    .filter(order_photo::Column::OrderId.eq(id))
                    .exec(txn)
                    .await?;
                service_order::Entity::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(order_id = id, "Service order deleted");
        Ok(())
    }
}

struct HeaderText {
    phone: Option<String>,
    email: Option<String>,
    model: Option<String>,
    diagnosis: Option<String>,
    observations: Option<String>,
}

fn request_header(
    phone: Option<String>,
    email: Option<String>,
    model: Option<String>,
    diagnosis: Option<String>,
    observations: Option<String>,
) -> HeaderText {
    HeaderText {
        phone: clean(phone),
        email: clean(email),
        model: clean(model),
        diagnosis: clean(diagnosis),
        observations: clean(observations),
    }
}
