pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_agents;
mod m20250301_000002_create_referrals;
mod m20250301_000003_create_orders;
mod m20250301_000004_create_payout_requests;
mod m20250302_000005_create_conversations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20250301_000001_create_agents::Migration),
      Box::new(m20250301_000002_create_referrals::Migration),
      Box::new(m20250301_000003_create_orders::Migration),
      Box::new(m20250301_000004_create_payout_requests::Migration),
      Box::new(m20250302_000005_create_conversations::Migration),
    ]
  }
}
