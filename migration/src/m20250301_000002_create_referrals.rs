use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_agents::Agents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    // referred_id is not a foreign key: the edge outlives the referred agent
    manager
      .create_table(
        Table::create()
          .table(Referrals::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Referrals::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Referrals::ReferrerId).big_integer().null())
          .col(
            ColumnDef::new(Referrals::ReferredId)
              .big_integer()
              .not_null()
              .unique_key(),
          )
          .col(ColumnDef::new(Referrals::Reward).big_integer().not_null())
          .col(ColumnDef::new(Referrals::ReferredAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_referrals_referrer")
              .from(Referrals::Table, Referrals::ReferrerId)
              .to(Agents::Table, Agents::TgUserId)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_referrals_referrer")
          .table(Referrals::Table)
          .col(Referrals::ReferrerId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Referrals::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Referrals {
  Table,
  Id,
  ReferrerId,
  ReferredId,
  Reward,
  ReferredAt,
}
