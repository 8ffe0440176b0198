//! Pending transaction entity - Credit moved without proof of payment yet.
//!
//! These rows drive payment reminders between tiers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pending transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Demande whose approval produced this row
    pub demande_id: i64,
    /// Deciding account
    pub from_id: i64,
    /// Credited account
    pub to_id: i64,
    pub amount: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
