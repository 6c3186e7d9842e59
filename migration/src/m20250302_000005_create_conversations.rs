use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    // One row per user: the primary key is the single-conversation rule
    manager
      .create_table(
        Table::create()
          .table(Conversations::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Conversations::TgUserId)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Conversations::Kind).string().not_null())
          .col(ColumnDef::new(Conversations::Step).integer().not_null())
          .col(ColumnDef::new(Conversations::Draft).text().not_null())
          .col(ColumnDef::new(Conversations::StartedAt).date_time().not_null())
          .col(ColumnDef::new(Conversations::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Conversations::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
enum Conversations {
  Table,
  TgUserId,
  Kind,
  Step,
  Draft,
  StartedAt,
  UpdatedAt,
}
