//! Account entity - A manager, admin or reseller holding a credit balance.
//!
//! Accounts form a tree through `supervisor_id` (reseller -> admin -> manager).
//! The ledger reads and mutates balances but never deletes an account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Position of an account in the reseller hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    /// Sells codes to end customers, supervised by an admin
    #[sea_orm(string_value = "reseller")]
    Reseller,
    /// Supervises resellers and extends credit to them
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Delegated manager; may review returns
    #[sea_orm(string_value = "admin_boss")]
    AdminBoss,
    /// Root of the hierarchy
    #[sea_orm(string_value = "manager")]
    Manager,
}

impl Role {
    /// Manager-level roles allowed to review return requests.
    #[must_use]
    pub const fn is_top_tier(self) -> bool {
        matches!(self, Self::Manager | Self::AdminBoss)
    }
}

/// Price column applied to an account's purchases
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Tier {
    /// Uses `tier1_price`
    #[sea_orm(string_value = "tier1")]
    Tier1,
    /// Uses `tier2_price`
    #[sea_orm(string_value = "tier2")]
    Tier2,
    /// Uses `tier3_price`
    #[sea_orm(string_value = "tier3")]
    Tier3,
}

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Hierarchy role
    pub role: Role,
    /// Pricing tier
    pub tier: Tier,
    /// Current credit balance
    pub balance: f64,
    /// Supervising account, None for the root
    pub supervisor_id: Option<i64>,
    /// Inactive accounts are denied every ledger operation
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
