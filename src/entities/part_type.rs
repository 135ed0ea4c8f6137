use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of spare part (screen, battery, ...)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "part_types")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::brand_part_type::Entity")]
    BrandPartType,
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        super::brand_part_type::Relation::Brand.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::brand_part_type::Relation::PartType.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
