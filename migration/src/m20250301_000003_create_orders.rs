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
          .table(Orders::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Orders::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Orders::AgentId).big_integer().null())
          .col(ColumnDef::new(Orders::CustomerName).string().not_null())
          .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
          .col(ColumnDef::new(Orders::ProductName).string().not_null())
          .col(ColumnDef::new(Orders::ProductCode).string().not_null())
          .col(ColumnDef::new(Orders::Quantity).integer().not_null())
          .col(ColumnDef::new(Orders::Region).string().not_null())
          .col(ColumnDef::new(Orders::SubRegion).string().not_null())
          .col(ColumnDef::new(Orders::Address).string().not_null())
          .col(
            ColumnDef::new(Orders::Status)
              .string()
              .not_null()
              .default("Pending"),
          )
          .col(ColumnDef::new(Orders::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_orders_agent")
              .from(Orders::Table, Orders::AgentId)
              .to(Agents::Table, Agents::TgUserId)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_agent")
          .table(Orders::Table)
          .col(Orders::AgentId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Orders {
  Table,
  Id,
  AgentId,
  CustomerName,
  CustomerPhone,
  ProductName,
  ProductCode,
  Quantity,
  Region,
  SubRegion,
  Address,
  Status,
  CreatedAt,
}
