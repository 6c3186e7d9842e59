use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::agent;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PayoutStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "paid")]
  Paid,
}

impl PayoutStatus {
  /// Forward-only: each status has exactly one successor.
  pub fn next(self) -> Option<PayoutStatus> {
    match self {
      PayoutStatus::Pending => Some(PayoutStatus::Approved),
      PayoutStatus::Approved => Some(PayoutStatus::Paid),
      PayoutStatus::Paid => None,
    }
  }
}

/// Agent name and phone are copied at request time and never follow the
/// agent row afterwards.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payout_requests")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub agent_id: Option<i64>,
  pub agent_name: String,
  pub phone_number: String,
  pub amount: i64,
  pub status: PayoutStatus,
  pub balance_snapshot: i64,
  pub requested_at: DateTime,
  pub approved_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "agent::Entity",
    from = "Column::AgentId",
    to = "agent::Column::TgUserId",
    on_delete = "SetNull"
  )]
  Agent,
}

impl Related<agent::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Agent.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
