use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Intake checklist; at most one per order
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_checks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub powers_on: bool,
    pub sim_tray: bool,
    pub impact_damage: bool,
    pub moisture: bool,
    pub speaker: bool,
    pub microphone: bool,
    pub earpiece: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub other: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service_order::Entity",
        from = "Column::OrderId",
        to = "super::service_order::Column::Id"
    )]
    ServiceOrder,
}

impl Related<super::service_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
