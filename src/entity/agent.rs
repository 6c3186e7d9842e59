use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{order, payout_request};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub tg_user_id: i64,
  pub full_name: String,
  pub phone_number: String,
  pub referred_by: Option<i64>,
  pub balance: i64,
  pub earnings: i64,
  pub referral_count: i32,
  pub joined_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "Entity",
    from = "Column::ReferredBy",
    to = "Column::TgUserId",
    on_delete = "SetNull"
  )]
  Referrer,
  #[sea_orm(has_many = "order::Entity")]
  Orders,
  #[sea_orm(has_many = "payout_request::Entity")]
  PayoutRequests,
}

impl Related<order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Orders.def()
  }
}

impl Related<payout_request::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::PayoutRequests.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
