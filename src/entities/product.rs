//! Product entity - Minimal read model of the catalog.
//!
//! The catalog itself is managed elsewhere; the ledger only needs product names
//! for snapshots and the id to key the code pool.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "IPTV Premium")
    pub name: String,
    /// Soft delete flag - ledger snapshots keep the name after deletion
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many unconsumed codes
    #[sea_orm(has_many = "super::code::Entity")]
    Codes,
    /// One product has one summary per duration
    #[sea_orm(has_many = "super::duration_summary::Entity")]
    DurationSummaries,
}

impl Related<super::code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Codes.def()
    }
}

impl Related<super::duration_summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DurationSummaries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
