//! Price override entity - An admin's resale price for a (product, duration).
//!
//! Overrides are keyed by product name and duration label rather than by id so
//! they survive catalog edits. `product_key`/`duration_key` hold the trimmed,
//! lowercased forms used for matching.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Price override database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_overrides")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Admin account that owns the override
    pub owner_id: i64,
    /// Product name as entered
    pub product_name: String,
    /// Duration label as entered
    pub duration_label: String,
    pub product_key: String,
    pub duration_key: String,
    /// The owner's own tier price when the override was last set
    pub purchase_price: f64,
    /// Price charged to the owner's resellers
    pub sale_price: f64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
