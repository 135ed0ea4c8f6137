use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Equipment and part brand
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Product,
    #[sea_orm(has_many = "super::brand_part_type::Entity")]
    BrandPartType,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::brand_part_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BrandPartType.def()
    }
}

impl Related<super::part_type::Entity> for Entity {
    fn to() -> RelationDef {
        super::brand_part_type::Relation::PartType.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::brand_part_type::Relation::Brand.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
