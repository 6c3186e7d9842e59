use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Agents::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Agents::TgUserId)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Agents::FullName).string().not_null())
          .col(ColumnDef::new(Agents::PhoneNumber).string().not_null())
          .col(ColumnDef::new(Agents::ReferredBy).big_integer().null())
          .col(
            ColumnDef::new(Agents::Balance)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Agents::Earnings)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Agents::ReferralCount)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Agents::JoinedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_agents_referred_by")
              .from(Agents::Table, Agents::ReferredBy)
              .to(Agents::Table, Agents::TgUserId)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Agents::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Agents {
  Table,
  TgUserId,
  FullName,
  PhoneNumber,
  ReferredBy,
  Balance,
  Earnings,
  ReferralCount,
  JoinedAt,
}
