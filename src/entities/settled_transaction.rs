//! Settled transaction entity - Credit moved with documentary proof of payment.
//!
//! Written only when an approved demande carried a proof.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settled transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settled_transactions")]
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
    /// Evidence asset path copied from the demande
    pub proof: String,
    pub created_at: DateTimeUtc,
    pub settled_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
