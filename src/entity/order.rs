use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::agent;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
  #[sea_orm(string_value = "Pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "Approved")]
  Approved,
  #[sea_orm(string_value = "Rejected")]
  Rejected,
  #[sea_orm(string_value = "Delivered")]
  Delivered,
}

impl OrderStatus {
  pub fn can_become(self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Pending, Approved)
        | (Pending, Rejected)
        | (Approved, Delivered)
        | (Approved, Rejected)
    )
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "pending" => Some(Self::Pending),
      "approved" => Some(Self::Approved),
      "rejected" => Some(Self::Rejected),
      "delivered" => Some(Self::Delivered),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub agent_id: Option<i64>,
  pub customer_name: String,
  pub customer_phone: String,
  pub product_name: String,
  pub product_code: String,
  pub quantity: i32,
  pub region: String,
  pub sub_region: String,
  pub address: String,
  pub status: OrderStatus,
  pub created_at: DateTime,
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
