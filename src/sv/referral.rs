use sea_orm::sea_query::{Expr, OnConflict};

use super::commission::REFERRAL_REWARD;
use crate::{
  backup::Notifier,
  entity::{agent, referral},
  prelude::*,
};

#[derive(Clone, Copy)]
pub struct Referral<'a> {
  db: &'a DatabaseConnection,
  sync: &'a Notifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralOutcome {
  Credited { balance: i64, earnings: i64 },
  AlreadyReferred,
  AgentNotFound,
  SelfReferral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralStats {
  pub referral_count: i32,
  pub earnings: i64,
  pub referred: Vec<i64>,
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection, sync: &'a Notifier) -> Self {
    Self { db, sync }
  }

  /// Inserts the referral edge and credits the referrer in one transaction.
  ///
  /// The unique key on `referred_id` decides: when the insert is ignored the
  /// transaction is dropped and nothing is credited, so retries are no-ops.
  pub async fn record(
    &self,
    referrer_id: i64,
    referred_id: i64,
  ) -> Result<ReferralOutcome> {
    if referrer_id == referred_id {
      return Ok(ReferralOutcome::SelfReferral);
    }

    let txn = self.db.begin().await?;

    let referrer = agent::Entity::find_by_id(referrer_id).one(&txn).await?;
    let referred = agent::Entity::find_by_id(referred_id).one(&txn).await?;
    if referrer.is_none() || referred.is_none() {
      return Ok(ReferralOutcome::AgentNotFound);
    }

    let edge = referral::ActiveModel {
      referrer_id: Set(Some(referrer_id)),
      referred_id: Set(referred_id),
      reward: Set(REFERRAL_REWARD),
      referred_at: Set(utils::now()),
      ..Default::default()
    };

    let inserted = referral::Entity::insert(edge)
      .on_conflict(
        OnConflict::column(referral::Column::ReferredId).do_nothing().to_owned(),
      )
      .exec_without_returning(&txn)
      .await?;

    if inserted == 0 {
      debug!("{referred_id} was already referred, no credit");
      return Ok(ReferralOutcome::AlreadyReferred);
    }

    agent::Entity::update_many()
      .col_expr(
        agent::Column::Balance,
        Expr::col(agent::Column::Balance).add(REFERRAL_REWARD),
      )
      .col_expr(
        agent::Column::Earnings,
        Expr::col(agent::Column::Earnings).add(REFERRAL_REWARD),
      )
      .col_expr(
        agent::Column::ReferralCount,
        Expr::col(agent::Column::ReferralCount).add(1),
      )
      .filter(agent::Column::TgUserId.eq(referrer_id))
      .exec(&txn)
      .await?;

    // keep the agent row consistent when the edge is recorded on its own
    agent::Entity::update_many()
      .col_expr(agent::Column::ReferredBy, Expr::value(referrer_id))
      .filter(agent::Column::TgUserId.eq(referred_id))
      .filter(agent::Column::ReferredBy.is_null())
      .exec(&txn)
      .await?;

    let credited = agent::Entity::find_by_id(referrer_id)
      .one(&txn)
      .await?
      .ok_or(Error::AgentNotFound)?;

    txn.commit().await?;
    self.sync.mutated();

    info!(
      "referrer {referrer_id} credited {REFERRAL_REWARD} for {referred_id}"
    );

    Ok(ReferralOutcome::Credited {
      balance: credited.balance,
      earnings: credited.earnings,
    })
  }

  pub async fn stats(&self, tg_user_id: i64) -> Result<ReferralStats> {
    let agent = agent::Entity::find_by_id(tg_user_id)
      .one(self.db)
      .await?
      .ok_or(Error::AgentNotFound)?;

    let referred = referral::Entity::find()
      .filter(referral::Column::ReferrerId.eq(tg_user_id))
      .order_by_asc(referral::Column::ReferredAt)
      .all(self.db)
      .await?
      .into_iter()
      .map(|edge| edge.referred_id)
      .collect();

    Ok(ReferralStats {
      referral_count: agent.referral_count,
      earnings: agent.earnings,
      referred,
    })
  }
}
