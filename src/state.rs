use teloxide::Bot;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::{
  backup::Notifier,
  config::Config,
  conversation::{Conversations, Dialog, OrderIntake, Registration},
  prelude::*,
  report::{Documents, TextReport},
  sv,
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub bot: Bot,
  pub admins: HashSet<i64>,
  pub config: Config,
  pub sync: Notifier,
  pub docs: TextReport,
  pub shutdown: CancellationToken,
  turns: Turns,
}

impl AppState {
  pub fn new(db: DatabaseConnection, config: Config, sync: Notifier) -> Self {
    Self {
      db,
      bot: Bot::new(&config.token),
      admins: config.admins.clone(),
      config,
      sync,
      docs: TextReport,
      shutdown: CancellationToken::new(),
      turns: Turns::default(),
    }
  }

  pub fn sv(&self) -> Services<'_> {
    Services::new(
      &self.db,
      &self.sync,
      &self.admins,
      &self.docs,
      self.config.order_recipient,
    )
  }

  /// Serializes message handling per user so two updates from the same chat
  /// never race on one conversation.
  pub async fn turn(&self, user_id: i64) -> TurnGuard<'_> {
    self.turns.lock(user_id).await
  }
}

/// Per-user locks; an entry lives only while someone holds or awaits it.
#[derive(Default)]
pub struct Turns {
  locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl Turns {
  pub async fn lock(&self, user_id: i64) -> TurnGuard<'_> {
    let lock = self.locks.entry(user_id).or_default().clone();
    let guard = lock.lock_owned().await;
    TurnGuard { guard: Some(guard), user_id, locks: &self.locks }
  }
}

pub struct TurnGuard<'a> {
  guard: Option<OwnedMutexGuard<()>>,
  user_id: i64,
  locks: &'a DashMap<i64, Arc<Mutex<()>>>,
}

impl Drop for TurnGuard<'_> {
  fn drop(&mut self) {
    // release first so the map holds the only remaining handle when idle
    self.guard.take();
    self.locks.remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
  }
}

pub struct Services<'a> {
  pub agent: sv::Agent<'a>,
  pub order: sv::Order<'a>,
  pub referral: sv::Referral<'a>,
  pub payout: sv::Payout<'a>,
  pub admin: sv::Admin<'a>,
  pub dialog: Dialog<'a>,
  pub docs: &'a dyn Documents,
}

impl<'a> Services<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    sync: &'a Notifier,
    admins: &'a HashSet<i64>,
    docs: &'a dyn Documents,
    order_recipient: Option<i64>,
  ) -> Self {
    let agent = sv::Agent::new(db, sync);
    let order = sv::Order::new(db, sync);
    let referral = sv::Referral::new(db, sync);

    let dialog = Dialog::new(
      Conversations::new(db),
      Registration::new(agent, referral),
      OrderIntake::new(agent, order, docs, order_recipient),
    );

    Self {
      agent,
      order,
      referral,
      payout: sv::Payout::new(db, sync),
      admin: sv::Admin::new(db, sync, admins),
      dialog,
      docs,
    }
  }
}
