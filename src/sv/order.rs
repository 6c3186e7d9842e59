use serde::{Deserialize, Serialize};

use crate::{
  backup::Notifier,
  entity::{OrderStatus, agent, order},
  prelude::*,
};

#[derive(Clone, Copy)]
pub struct Order<'a> {
  db: &'a DatabaseConnection,
  sync: &'a Notifier,
}

/// Fields collected from the agent for one customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
  pub customer_name: String,
  pub customer_phone: String,
  pub product_name: String,
  pub product_code: String,
  pub quantity: i32,
  pub region: String,
  pub sub_region: String,
  pub address: String,
}

#[cfg(test)]
impl NewOrder {
  pub fn sample() -> Self {
    Self {
      customer_name: "Karim".into(),
      customer_phone: "0555000000".into(),
      product_name: "Widget".into(),
      product_code: "W1".into(),
      quantity: 3,
      region: "R".into(),
      sub_region: "B".into(),
      address: "12 St".into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
  Recorded(order::Model),
  AgentNotFound,
}

impl<'a> Order<'a> {
  pub fn new(db: &'a DatabaseConnection, sync: &'a Notifier) -> Self {
    Self { db, sync }
  }

  pub async fn record(
    &self,
    tg_user_id: i64,
    new: NewOrder,
  ) -> Result<OrderOutcome> {
    if new.quantity <= 0 {
      return Err(Error::InvalidArgs("Quantity must be positive".into()));
    }

    let txn = self.db.begin().await?;

    if agent::Entity::find_by_id(tg_user_id).one(&txn).await?.is_none() {
      return Ok(OrderOutcome::AgentNotFound);
    }

    let order = order::ActiveModel {
      agent_id: Set(Some(tg_user_id)),
      customer_name: Set(new.customer_name),
      customer_phone: Set(new.customer_phone),
      product_name: Set(new.product_name),
      product_code: Set(new.product_code),
      quantity: Set(new.quantity),
      region: Set(new.region),
      sub_region: Set(new.sub_region),
      address: Set(new.address),
      status: Set(OrderStatus::Pending),
      created_at: Set(utils::now()),
      ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    self.sync.mutated();

    info!("order #{} recorded for {tg_user_id}", order.id);
    Ok(OrderOutcome::Recorded(order))
  }

  /// Orders of one agent, most recent first.
  pub async fn list(&self, tg_user_id: i64) -> Result<Vec<order::Model>> {
    Ok(
      order::Entity::find()
        .filter(order::Column::AgentId.eq(tg_user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn recent(&self, limit: u64) -> Result<Vec<order::Model>> {
    Ok(
      order::Entity::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<order::Model>> {
    Ok(order::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn set_status(
    &self,
    id: i32,
    status: OrderStatus,
  ) -> Result<order::Model> {
    let txn = self.db.begin().await?;

    let order = order::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::OrderNotFound)?;

    if !order.status.can_become(status) {
      return Err(Error::OrderTransition { from: order.status, to: status });
    }

    let from = order.status;
    let updated = order::ActiveModel { status: Set(status), ..order.into() }
      .update(&txn)
      .await?;

    txn.commit().await?;
    self.sync.mutated();

    info!("order #{id}: {from:?} -> {status:?}");
    Ok(updated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{self, test_utils::test_db};

  #[tokio::test]
  async fn test_record_requires_agent() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();

    let outcome = Order::new(&db, &sync).record(111, NewOrder::sample()).await;
    assert_eq!(outcome.unwrap(), OrderOutcome::AgentNotFound);
  }

  #[tokio::test]
  async fn test_record_and_list_latest_first() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    sv::Agent::new(&db, &sync)
      .register(111, "Agent", "+213111", None)
      .await
      .unwrap();
    let orders = Order::new(&db, &sync);

    let OrderOutcome::Recorded(first) =
      orders.record(111, NewOrder::sample()).await.unwrap()
    else {
      panic!("expected order");
    };
    assert_eq!(first.status, OrderStatus::Pending);
    assert_eq!(first.agent_id, Some(111));

    let second = NewOrder { product_name: "Gadget".into(), ..NewOrder::sample() };
    orders.record(111, second).await.unwrap();

    let listed = orders.list(111).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].product_name, "Gadget");
    assert_eq!(listed[1].product_name, "Widget");
    assert!(orders.list(222).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_zero_quantity_is_rejected() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();

    let bad = NewOrder { quantity: 0, ..NewOrder::sample() };
    let outcome = Order::new(&db, &sync).record(111, bad).await;
    assert!(matches!(outcome, Err(Error::InvalidArgs(_))));
  }

  #[tokio::test]
  async fn test_status_transitions() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    sv::Agent::new(&db, &sync)
      .register(111, "Agent", "+213111", None)
      .await
      .unwrap();
    let orders = Order::new(&db, &sync);
    let OrderOutcome::Recorded(order) =
      orders.record(111, NewOrder::sample()).await.unwrap()
    else {
      panic!("expected order");
    };

    let approved = orders.set_status(order.id, OrderStatus::Approved).await;
    assert_eq!(approved.unwrap().status, OrderStatus::Approved);

    assert!(matches!(
      orders.set_status(order.id, OrderStatus::Pending).await,
      Err(Error::OrderTransition { .. })
    ));

    orders.set_status(order.id, OrderStatus::Delivered).await.unwrap();
    assert!(matches!(
      orders.set_status(order.id, OrderStatus::Rejected).await,
      Err(Error::OrderTransition { .. })
    ));
    assert!(matches!(
      orders.set_status(42, OrderStatus::Approved).await,
      Err(Error::OrderNotFound)
    ));
  }
}
