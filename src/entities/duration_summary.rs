//! Duration summary entity - One row per (product, duration) with sale prices
//! and the figures derived from the code pool.
//!
//! `quantity` and `weighted_average_cost` are owned by
//! [`crate::core::duration_summary::recompute`] and must never be written anywhere else.

use super::account::Tier;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether the duration is offered for sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum SummaryStatus {
    /// Purchasable
    #[sea_orm(string_value = "active")]
    Active,
    /// Hidden from sale; stock is kept
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Duration summary database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "duration_summaries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: i64,
    pub duration_label: String,
    /// Sale price for tier 1 accounts
    pub tier1_price: f64,
    /// Sale price for tier 2 accounts
    pub tier2_price: f64,
    /// Sale price for tier 3 accounts
    pub tier3_price: f64,
    /// Quantity under which the pool is reported as low
    pub minimum_threshold: i64,
    /// Number of codes in the pool for this key
    pub quantity: i64,
    /// Count-weighted mean unit cost of the pool, 0 when empty
    pub weighted_average_cost: f64,
    pub status: SummaryStatus,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Returns the sale price for the given tier.
    #[must_use]
    pub const fn resolve_unit_cost(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Tier1 => self.tier1_price,
            Tier::Tier2 => self.tier2_price,
            Tier::Tier3 => self.tier3_price,
        }
    }

    /// True when the pool has dropped under the configured minimum.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.quantity < self.minimum_threshold
    }
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
