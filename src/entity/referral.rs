use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::agent;

/// Write-once edge. `referred_id` is unique across the table's lifetime.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub referrer_id: Option<i64>,
  #[sea_orm(unique)]
  pub referred_id: i64,
  pub reward: i64,
  pub referred_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "agent::Entity",
    from = "Column::ReferrerId",
    to = "agent::Column::TgUserId",
    on_delete = "SetNull"
  )]
  Referrer,
}

impl Related<agent::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Referrer.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
