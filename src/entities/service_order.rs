use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Repair order header. Owns equipment checks, faults, parts and photos.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Human-facing order code, e.g. `OS-1A2B3C4D`
    #[sea_orm(unique)]
    pub code: String,

    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,

    pub brand_id: Option<i32>,
    pub equipment_type_id: Option<i32>,
    pub model: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub diagnosis: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub observations: Option<String>,

    pub repair_cost: Decimal,
    pub advance_payment: Decimal,
    /// `repair_cost - advance_payment`, recomputed on every write
    pub total: Decimal,

    /// Persisted `RepairStatus` in its canonical spelling
    pub repair_status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::brand::Entity",
        from = "Column::BrandId",
        to = "super::brand::Column::Id"
    )]
    Brand,
    #[sea_orm(
        belongs_to = "super::equipment_type::Entity",
        from = "Column::EquipmentTypeId",
        to = "super::equipment_type::Column::Id"
    )]
    EquipmentType,
    #[sea_orm(has_many = "super::equipment_check::Entity")]
    EquipmentCheck,
    #[sea_orm(has_many = "super::order_fault::Entity")]
    OrderFault,
    #[sea_orm(has_many = "super::order_part::Entity")]
    OrderPart,
    #[sea_orm(has_many = "super::order_photo::Entity")]
    OrderPhoto,
}

impl Related<super::equipment_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EquipmentCheck.def()
    }
}

impl Related<super::order_fault::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderFault.def()
    }
}

impl Related<super::order_part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderPart.def()
    }
}

impl Related<super::order_photo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderPhoto.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
