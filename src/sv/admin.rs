use super::{Agent, Order, Payout, Registration, Removal};
use crate::{
  backup::Notifier,
  entity::{OrderStatus, PayoutStatus, agent, order, payout_request},
  prelude::*,
};

/// Gate in front of operations reserved to administrators.
#[derive(Clone, Copy)]
pub struct Admin<'a> {
  db: &'a DatabaseConnection,
  sync: &'a Notifier,
  admins: &'a HashSet<i64>,
}

/// Proof that the actor passed [`Admin::authorize`].
pub struct Authorized<'a> {
  pub actor: i64,
  agent: Agent<'a>,
  order: Order<'a>,
  payout: Payout<'a>,
}

impl<'a> Admin<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    sync: &'a Notifier,
    admins: &'a HashSet<i64>,
  ) -> Self {
    Self { db, sync, admins }
  }

  pub fn is_admin(&self, actor: i64) -> bool {
    self.admins.contains(&actor)
  }

  pub fn authorize(&self, actor: i64) -> Result<Authorized<'a>> {
    if !self.is_admin(actor) {
      warn!("user {actor} attempted an admin operation");
      return Err(Error::Unauthorized);
    }

    Ok(Authorized {
      actor,
      agent: Agent::new(self.db, self.sync),
      order: Order::new(self.db, self.sync),
      payout: Payout::new(self.db, self.sync),
    })
  }
}

impl Authorized<'_> {
  /// Direct registration, never attached to a referrer.
  pub async fn add_agent(
    &self,
    tg_user_id: i64,
    full_name: &str,
    phone_number: &str,
  ) -> Result<Registration> {
    info!("admin {} adds agent {tg_user_id}", self.actor);
    self.agent.register(tg_user_id, full_name, phone_number, None).await
  }

  pub async fn remove_agent(&self, tg_user_id: i64) -> Result<Removal> {
    info!("admin {} removes agent {tg_user_id}", self.actor);
    self.agent.remove(tg_user_id).await
  }

  pub async fn roster(&self) -> Result<Vec<agent::Model>> {
    self.agent.all().await
  }

  pub async fn recent_orders(&self, limit: u64) -> Result<Vec<order::Model>> {
    self.order.recent(limit).await
  }

  pub async fn order(&self, id: i32) -> Result<order::Model> {
    self.order.by_id(id).await?.ok_or(Error::OrderNotFound)
  }

  pub async fn update_order(
    &self,
    id: i32,
    status: OrderStatus,
  ) -> Result<order::Model> {
    self.order.set_status(id, status).await
  }

  pub async fn pending_payouts(&self) -> Result<Vec<payout_request::Model>> {
    self.payout.pending().await
  }

  pub async fn approve_payout(&self, id: i32) -> Result<payout_request::Model> {
    self.payout.advance(id, PayoutStatus::Approved).await
  }

  pub async fn mark_paid(&self, id: i32) -> Result<payout_request::Model> {
    self.payout.advance(id, PayoutStatus::Paid).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_non_admin_is_rejected_without_side_effects() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let admins = HashSet::from([1]);
    let admin = Admin::new(&db, &sync, &admins);

    assert!(matches!(admin.authorize(2), Err(Error::Unauthorized)));
    assert!(agent::Entity::find().all(&db).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_admin_manages_agents() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let admins = HashSet::from([1]);
    let admin = Admin::new(&db, &sync, &admins).authorize(1).unwrap();

    let added = admin.add_agent(50, "Field", "+21350").await.unwrap();
    assert!(matches!(added, Registration::Registered(_)));
    let again = admin.add_agent(50, "Field", "+21350").await.unwrap();
    assert!(matches!(again, Registration::AlreadyExists(_)));

    assert_eq!(admin.roster().await.unwrap().len(), 1);
    assert_eq!(admin.remove_agent(50).await.unwrap(), Removal::Removed);
    assert_eq!(admin.remove_agent(50).await.unwrap(), Removal::NotFound);
    assert!(matches!(admin.order(1).await, Err(Error::OrderNotFound)));
  }
}
