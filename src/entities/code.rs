//! Code entity - One unconsumed, globally unique subscription code.
//!
//! A row exists only while the code is in stock: purchases delete it and
//! approved refunds insert it again.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Code database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The credential itself
    #[sea_orm(unique)]
    pub code: String,
    pub product_id: i64,
    /// Duration label, e.g. `"1 month"`
    pub duration_label: String,
    /// Who supplied the code; refunds use a return tag
    pub supplier: String,
    /// Acquisition cost of this single code
    pub unit_cost: f64,
    pub note: Option<String>,
    /// Intake time, used for FIFO allocation
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
