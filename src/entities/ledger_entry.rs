//! Ledger entry entity - The audit record of one purchase or one refund reversal.
//!
//! Product name, duration and codes are snapshots taken at sale time; they are
//! not foreign keys and stay exact when the catalog changes afterwards.
//! Purchases carry a positive `amount`, reversals the negated original amount.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered list of the codes sold, stored as JSON
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CodeList(pub Vec<String>);

impl CodeList {
    /// Number of codes in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the snapshot holds no codes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the codes in sale order
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account that bought (or was refunded)
    pub buyer_id: i64,
    /// Product the codes were drawn from; a plain value, not a foreign key
    pub product_id: i64,
    pub product_name: String,
    pub duration_label: String,
    #[sea_orm(column_type = "Json")]
    pub codes: CodeList,
    /// Unit price times quantity; negative for reversals
    pub amount: f64,
    pub note: Option<String>,
    /// Reviewer who approved the refund, set on reversal entries only
    pub reviewer_id: Option<i64>,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// True for entries written by an approved refund.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.amount < 0.0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::BuyerId",
        to = "super::account::Column::Id"
    )]
    Buyer,
    #[sea_orm(has_many = "super::return_request::Entity")]
    ReturnRequests,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReturnRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
