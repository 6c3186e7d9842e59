use super::commission;
use crate::{
  backup::Notifier,
  entity::{PayoutStatus, agent, payout_request},
  prelude::*,
};

#[derive(Clone, Copy)]
pub struct Payout<'a> {
  db: &'a DatabaseConnection,
  sync: &'a Notifier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutOutcome {
  Submitted { request: payout_request::Model, balance: i64 },
  InsufficientBalance { balance: i64 },
  AgentNotFound,
}

impl<'a> Payout<'a> {
  pub fn new(db: &'a DatabaseConnection, sync: &'a Notifier) -> Self {
    Self { db, sync }
  }

  /// Records a payout request when the balance passes the gate. The balance
  /// itself is left untouched; the request carries a snapshot of it.
  pub async fn request(
    &self,
    tg_user_id: i64,
    amount: i64,
  ) -> Result<PayoutOutcome> {
    if amount <= 0 {
      return Err(Error::InvalidArgs("Payout amount must be positive".into()));
    }

    let txn = self.db.begin().await?;

    let Some(agent) = agent::Entity::find_by_id(tg_user_id).one(&txn).await?
    else {
      return Ok(PayoutOutcome::AgentNotFound);
    };

    if !commission::payout_allowed(agent.balance, amount) {
      debug!(
        "payout of {amount} refused for {tg_user_id} (balance {})",
        agent.balance
      );
      return Ok(PayoutOutcome::InsufficientBalance { balance: agent.balance });
    }

    let request = payout_request::ActiveModel {
      agent_id: Set(Some(tg_user_id)),
      agent_name: Set(agent.full_name.clone()),
      phone_number: Set(agent.phone_number.clone()),
      amount: Set(amount),
      status: Set(PayoutStatus::Pending),
      balance_snapshot: Set(agent.balance),
      requested_at: Set(utils::now()),
      approved_at: Set(None),
      ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    self.sync.mutated();

    info!("payout request #{} of {amount} by {tg_user_id}", request.id);
    Ok(PayoutOutcome::Submitted { request, balance: agent.balance })
  }

  /// Moves a request one step forward. Skipping or reversing is refused.
  pub async fn advance(
    &self,
    id: i32,
    target: PayoutStatus,
  ) -> Result<payout_request::Model> {
    let txn = self.db.begin().await?;

    let request = payout_request::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;

    let current = request.status;
    if current.next() != Some(target) {
      return Err(Error::PayoutTransition(current));
    }

    let mut active: payout_request::ActiveModel = request.into();
    active.status = Set(target);
    if target == PayoutStatus::Approved {
      active.approved_at = Set(Some(utils::now()));
    }
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    self.sync.mutated();

    info!("payout request #{id}: {current:?} -> {target:?}");
    Ok(updated)
  }

  pub async fn pending(&self) -> Result<Vec<payout_request::Model>> {
    Ok(
      payout_request::Entity::find()
        .filter(payout_request::Column::Status.eq(PayoutStatus::Pending))
        .order_by_asc(payout_request::Column::RequestedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_agent(
    &self,
    tg_user_id: i64,
  ) -> Result<Vec<payout_request::Model>> {
    Ok(
      payout_request::Entity::find()
        .filter(payout_request::Column::AgentId.eq(tg_user_id))
        .order_by_desc(payout_request::Column::RequestedAt)
        .order_by_desc(payout_request::Column::Id)
        .all(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::sea_query::Expr;
  use tokio_test::assert_ok;

  use super::*;
  use crate::sv::{self, test_utils::test_db};

  async fn agent_with_balance(
    db: &DatabaseConnection,
    sync: &Notifier,
    balance: i64,
  ) {
    sv::Agent::new(db, sync)
      .register(222, "Payee", "+213222", None)
      .await
      .unwrap();
    agent::Entity::update_many()
      .col_expr(agent::Column::Balance, Expr::value(balance))
      .filter(agent::Column::TgUserId.eq(222))
      .exec(db)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_below_minimum_is_refused() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    agent_with_balance(&db, &sync, 50).await;

    let outcome = Payout::new(&db, &sync).request(222, 2000).await.unwrap();

    assert_eq!(outcome, PayoutOutcome::InsufficientBalance { balance: 50 });
    assert!(payout_request::Entity::find().all(&db).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_amount_above_balance_is_refused() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    agent_with_balance(&db, &sync, 2500).await;

    let outcome = Payout::new(&db, &sync).request(222, 3000).await.unwrap();

    assert_eq!(outcome, PayoutOutcome::InsufficientBalance { balance: 2500 });
  }

  #[tokio::test]
  async fn test_submitted_request_snapshots_agent() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    agent_with_balance(&db, &sync, 2500).await;

    let outcome = Payout::new(&db, &sync).request(222, 2000).await.unwrap();
    let PayoutOutcome::Submitted { request, balance } = outcome else {
      panic!("expected submission");
    };

    assert_eq!(balance, 2500);
    assert_eq!(request.status, PayoutStatus::Pending);
    assert_eq!(request.balance_snapshot, 2500);
    assert_eq!(request.agent_name, "Payee");
    assert_eq!(request.approved_at, None);

    // balance is only reserved, never deducted at request time
    let agent = agent::Entity::find_by_id(222i64).one(&db).await.unwrap().unwrap();
    assert_eq!(agent.balance, 2500);
    assert_eq!(payout_request::Entity::find().all(&db).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_unknown_agent_and_bad_amount() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let payout = Payout::new(&db, &sync);

    assert_eq!(
      payout.request(404, 2000).await.unwrap(),
      PayoutOutcome::AgentNotFound
    );
    assert!(matches!(
      payout.request(404, 0).await,
      Err(Error::InvalidArgs(_))
    ));
  }

  #[tokio::test]
  async fn test_status_moves_forward_only() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    agent_with_balance(&db, &sync, 2000).await;
    let payout = Payout::new(&db, &sync);

    let PayoutOutcome::Submitted { request, .. } =
      payout.request(222, 2000).await.unwrap()
    else {
      panic!("expected submission");
    };

    assert!(matches!(
      payout.advance(request.id, PayoutStatus::Paid).await,
      Err(Error::PayoutTransition(PayoutStatus::Pending))
    ));

    let approved = assert_ok!(payout.advance(request.id, PayoutStatus::Approved).await);
    assert!(approved.approved_at.is_some());
    assert!(payout.pending().await.unwrap().is_empty());

    let paid = assert_ok!(payout.advance(request.id, PayoutStatus::Paid).await);
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert_eq!(paid.approved_at, approved.approved_at);

    assert!(matches!(
      payout.advance(request.id, PayoutStatus::Approved).await,
      Err(Error::PayoutTransition(PayoutStatus::Paid))
    ));
    assert!(matches!(
      payout.advance(999, PayoutStatus::Approved).await,
      Err(Error::PayoutNotFound)
    ));
  }
}
