//! Demande entity - A balance top-up request sent up the hierarchy.
//!
//! Resellers ask their supervising admin, admins ask any manager. `proof` is the
//! path of an optional payment receipt stored by the upload layer.

use super::review_status::ReviewStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Demande database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "demandes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account asking for credit
    pub requester_id: i64,
    /// Requested credit
    pub amount: f64,
    /// Evidence asset path, if any
    pub proof: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTimeUtc,
    pub decided_at: Option<DateTimeUtc>,
    pub decider_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::RequesterId",
        to = "super::account::Column::Id"
    )]
    Requester,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requester.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
