use sea_orm::sea_query::OnConflict;

use crate::{backup::Notifier, entity::agent, prelude::*};

#[derive(Clone, Copy)]
pub struct Agent<'a> {
  db: &'a DatabaseConnection,
  sync: &'a Notifier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
  Registered(agent::Model),
  AlreadyExists(agent::Model),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
  Removed,
  NotFound,
}

impl<'a> Agent<'a> {
  pub fn new(db: &'a DatabaseConnection, sync: &'a Notifier) -> Self {
    Self { db, sync }
  }

  /// Creates the agent row. An unknown referrer never blocks registration,
  /// the link is dropped instead. No reward is granted here, see
  /// [`super::Referral::record`].
  pub async fn register(
    &self,
    tg_user_id: i64,
    full_name: &str,
    phone_number: &str,
    referrer_id: Option<i64>,
  ) -> Result<Registration> {
    let txn = self.db.begin().await?;

    if let Some(existing) =
      agent::Entity::find_by_id(tg_user_id).one(&txn).await?
    {
      debug!("agent {tg_user_id} already registered");
      return Ok(Registration::AlreadyExists(existing));
    }

    let referred_by = match referrer_id {
      Some(id) if id == tg_user_id => None,
      Some(id) => {
        let found = agent::Entity::find_by_id(id).one(&txn).await?;
        if found.is_none() {
          info!("referrer {id} of {tg_user_id} does not exist, link dropped");
        }
        found.map(|r| r.tg_user_id)
      }
      None => None,
    };

    let model = agent::ActiveModel {
      tg_user_id: Set(tg_user_id),
      full_name: Set(full_name.to_string()),
      phone_number: Set(phone_number.to_string()),
      referred_by: Set(referred_by),
      balance: Set(0),
      earnings: Set(0),
      referral_count: Set(0),
      joined_at: Set(utils::now()),
    };

    let inserted = agent::Entity::insert(model)
      .on_conflict(
        OnConflict::column(agent::Column::TgUserId).do_nothing().to_owned(),
      )
      .exec_without_returning(&txn)
      .await?;

    let stored = agent::Entity::find_by_id(tg_user_id)
      .one(&txn)
      .await?
      .ok_or(Error::AgentNotFound)?;

    if inserted == 0 {
      return Ok(Registration::AlreadyExists(stored));
    }

    txn.commit().await?;
    self.sync.mutated();

    info!("agent {tg_user_id} registered (referred by {referred_by:?})");
    Ok(Registration::Registered(stored))
  }

  pub async fn get(&self, tg_user_id: i64) -> Result<Option<agent::Model>> {
    Ok(agent::Entity::find_by_id(tg_user_id).one(self.db).await?)
  }

  /// Removes the agent. Foreign keys null out every backlink; credited
  /// balances of other agents stay untouched.
  pub async fn remove(&self, tg_user_id: i64) -> Result<Removal> {
    let res = agent::Entity::delete_by_id(tg_user_id).exec(self.db).await?;

    if res.rows_affected == 0 {
      return Ok(Removal::NotFound);
    }

    self.sync.mutated();
    info!("agent {tg_user_id} removed");
    Ok(Removal::Removed)
  }

  pub async fn all(&self) -> Result<Vec<agent::Model>> {
    Ok(
      agent::Entity::find()
        .order_by_asc(agent::Column::JoinedAt)
        .order_by_asc(agent::Column::TgUserId)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(agent::Entity::find().count(self.db).await?)
  }
}
