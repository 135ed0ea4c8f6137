use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which part types are offered for which brand
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brand_part_types")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub brand_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub part_type_id: i32,
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
        belongs_to = "super::part_type::Entity",
        from = "Column::PartTypeId",
        to = "super::part_type::Column::Id"
    )]
    PartType,
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Brand.def()
    }
}

impl Related<super::part_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PartType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
