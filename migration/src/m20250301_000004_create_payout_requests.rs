use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_agents::Agents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(PayoutRequests::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PayoutRequests::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(PayoutRequests::AgentId).big_integer().null())
          .col(ColumnDef::new(PayoutRequests::AgentName).string().not_null())
          .col(ColumnDef::new(PayoutRequests::PhoneNumber).string().not_null())
          .col(ColumnDef::new(PayoutRequests::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(PayoutRequests::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(
            ColumnDef::new(PayoutRequests::BalanceSnapshot)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(PayoutRequests::RequestedAt).date_time().not_null(),
          )
          .col(ColumnDef::new(PayoutRequests::ApprovedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payout_requests_agent")
              .from(PayoutRequests::Table, PayoutRequests::AgentId)
              .to(Agents::Table, Agents::TgUserId)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payout_requests_status")
          .table(PayoutRequests::Table)
          .col(PayoutRequests::Status)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PayoutRequests::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum PayoutRequests {
  Table,
  Id,
  AgentId,
  AgentName,
  PhoneNumber,
  Amount,
  Status,
  BalanceSnapshot,
  RequestedAt,
  ApprovedAt,
}
