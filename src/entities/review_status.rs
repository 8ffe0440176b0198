//! Review status shared by return requests and balance requests.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReviewStatus {
    /// Awaiting a decision
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted (terminal)
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused (terminal)
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ReviewStatus {
    /// True for `Approved` and `Rejected`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}
