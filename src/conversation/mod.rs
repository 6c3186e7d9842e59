//! Multi-turn input collection driven as a finite state machine.
//!
//! A [`Flow`] is a fixed list of [`Step`]s over a typed draft. The engine
//! persists `(kind, step, draft)` per user so a conversation survives
//! restarts, and a user has at most one open conversation: starting a new
//! one replaces whatever was there.
//!
//! ```text
//! NotStarted -> Step 1 -> ... -> Step n -> Completed
//!                  \________________________/
//!                        abort / restart
//! ```

mod dialog;
pub mod order;
pub mod registration;

use serde::{Serialize, de::DeserializeOwned};

pub use self::{
  dialog::{Begin, Dialog, Reply},
  order::{OrderDraft, OrderIntake, Placed},
  registration::{Registered, Registration, RegistrationDraft},
};
use crate::{
  entity::{ConversationKind, conversation},
  prelude::*,
};

/// Inbound message as seen by a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
  Text(String),
  Contact { phone: String },
}

impl Input {
  pub fn text(s: impl Into<String>) -> Self {
    Input::Text(s.into())
  }
}

/// Why an answer was refused. The step is asked again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject(pub String);

impl Reject {
  pub fn new(reason: impl Into<String>) -> Self {
    Self(reason.into())
  }
}

pub struct Step<D> {
  pub field: &'static str,
  pub prompt: &'static str,
  /// Offer the "share contact" button for this step.
  pub contact: bool,
  pub apply: fn(&mut D, &Input) -> Result<(), Reject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prompt {
  pub field: &'static str,
  pub text: &'static str,
  pub contact: bool,
}

impl<D> From<&Step<D>> for Prompt {
  fn from(step: &Step<D>) -> Self {
    Prompt { field: step.field, text: step.prompt, contact: step.contact }
  }
}

#[async_trait::async_trait]
pub trait Flow: Send + Sync {
  type Draft: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
  type Output: Send;

  const KIND: ConversationKind;

  fn steps(&self) -> &'static [Step<Self::Draft>];

  /// Validation that needs the store. Runs on the candidate draft after
  /// `apply` succeeded; a rejection discards the candidate.
  async fn check(
    &self,
    _user_id: i64,
    _field: &'static str,
    _draft: &Self::Draft,
  ) -> Result<Option<Reject>> {
    Ok(None)
  }

  async fn finalize(
    &self,
    user_id: i64,
    draft: Self::Draft,
  ) -> Result<Self::Output>;
}

#[derive(Debug)]
pub enum Turn<O> {
  Ask(Prompt),
  Retry { reason: String, prompt: Prompt },
  Done(O),
}

#[derive(Clone, Copy)]
pub struct Conversations<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Conversations<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Opens `F` for the user with an empty draft, discarding any previous
  /// conversation, and returns the first prompt.
  pub async fn start<F: Flow>(&self, user_id: i64, flow: &F) -> Result<Prompt> {
    let first = flow
      .steps()
      .first()
      .ok_or_else(|| Error::InvalidArgs("conversation has no steps".into()))?;

    let txn = self.db.begin().await?;

    if let Some(previous) =
      conversation::Entity::find_by_id(user_id).one(&txn).await?
    {
      debug!(
        "user {user_id}: {:?} at step {} replaced by {:?}",
        previous.kind,
        previous.step,
        F::KIND
      );
      conversation::Entity::delete_by_id(user_id).exec(&txn).await?;
    }

    let now = utils::now();
    conversation::ActiveModel {
      tg_user_id: Set(user_id),
      kind: Set(F::KIND),
      step: Set(0),
      draft: Set(json::to_string(&F::Draft::default())?),
      started_at: Set(now),
      updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(first.into())
  }

  pub async fn active(
    &self,
    user_id: i64,
  ) -> Result<Option<conversation::Model>> {
    Ok(conversation::Entity::find_by_id(user_id).one(self.db).await?)
  }

  /// Current step index and draft of an open `F` conversation.
  pub async fn draft<F: Flow>(
    &self,
    user_id: i64,
  ) -> Result<Option<(usize, F::Draft)>> {
    match self.active(user_id).await? {
      Some(row) if row.kind == F::KIND => {
        Ok(Some((row.step as usize, json::from_str(&row.draft)?)))
      }
      _ => Ok(None),
    }
  }

  pub async fn abort(&self, user_id: i64) -> Result<bool> {
    let res = conversation::Entity::delete_by_id(user_id).exec(self.db).await?;
    Ok(res.rows_affected > 0)
  }

  /// Feeds one answer to the open `F` conversation. Returns `None` when the
  /// user has no conversation of that kind.
  ///
  /// Valid input advances the step; invalid input leaves step and draft as
  /// they were. After the last step the draft is finalized and the
  /// conversation cleared. A failing finalize keeps the conversation on its
  /// last step so the answer can be sent again.
  pub async fn advance<F: Flow>(
    &self,
    user_id: i64,
    flow: &F,
    input: &Input,
  ) -> Result<Option<Turn<F::Output>>> {
    let Some(row) = self.active(user_id).await? else {
      return Ok(None);
    };
    if row.kind != F::KIND {
      return Ok(None);
    }

    let steps = flow.steps();
    let index = row.step as usize;
    let Some(step) = steps.get(index) else {
      warn!("user {user_id}: step {index} out of range for {:?}, dropped", F::KIND);
      self.abort(user_id).await?;
      return Ok(None);
    };

    let draft: F::Draft = json::from_str(&row.draft)?;
    let mut candidate = draft.clone();

    if let Err(Reject(reason)) = (step.apply)(&mut candidate, input) {
      return Ok(Some(Turn::Retry { reason, prompt: step.into() }));
    }
    if let Some(Reject(reason)) =
      flow.check(user_id, step.field, &candidate).await?
    {
      return Ok(Some(Turn::Retry { reason, prompt: step.into() }));
    }

    let Some(next) = steps.get(index + 1) else {
      // cleared before finalize so a committed finalize never leaves the
      // conversation open; restored if finalize fails
      self.abort(user_id).await?;
      return match flow.finalize(user_id, candidate).await {
        Ok(output) => {
          debug!("user {user_id}: {:?} completed", F::KIND);
          Ok(Some(Turn::Done(output)))
        }
        Err(err) => {
          self.restore(row).await;
          Err(err)
        }
      };
    };

    conversation::ActiveModel {
      step: Set(row.step + 1),
      draft: Set(json::to_string(&candidate)?),
      updated_at: Set(utils::now()),
      ..row.into()
    }
    .update(self.db)
    .await?;

    Ok(Some(Turn::Ask(next.into())))
  }

  async fn restore(&self, row: conversation::Model) {
    let user_id = row.tg_user_id;
    let res = conversation::ActiveModel {
      tg_user_id: Set(row.tg_user_id),
      kind: Set(row.kind),
      step: Set(row.step),
      draft: Set(row.draft),
      started_at: Set(row.started_at),
      updated_at: Set(row.updated_at),
    }
    .insert(self.db)
    .await;
    if let Err(err) = res {
      warn!("user {user_id}: failed to restore conversation: {err}");
    }
  }
}

/// Non-empty trimmed text; contacts are refused.
pub fn plain_text(input: &Input) -> Result<String, Reject> {
  match input {
    Input::Text(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
    Input::Text(_) => Err(Reject::new("⚠️ This field cannot be empty.")),
    Input::Contact { .. } => Err(Reject::new("⚠️ Please answer with text.")),
  }
}

/// Text or a shared contact's phone number.
pub fn text_or_contact(input: &Input) -> Result<String, Reject> {
  match input {
    Input::Contact { phone } => Ok(phone.trim().to_string()),
    other => plain_text(other),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicBool, Ordering};

  use serde::Deserialize;

  use super::*;
  use crate::sv::test_utils::test_db;

  #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
  struct PairDraft {
    left: String,
    right: i32,
  }

  struct Pair;

  static PAIR: [Step<PairDraft>; 2] = [
    Step {
      field: "left",
      prompt: "left?",
      contact: false,
      apply: |d, input| {
        d.left = plain_text(input)?;
        Ok(())
      },
    },
    Step {
      field: "right",
      prompt: "right?",
      contact: false,
      apply: |d, input| {
        d.right = plain_text(input)?
          .parse()
          .map_err(|_| Reject::new("number please"))?;
        Ok(())
      },
    },
  ];

  #[async_trait::async_trait]
  impl Flow for Pair {
    type Draft = PairDraft;
    type Output = PairDraft;

    const KIND: ConversationKind = ConversationKind::Order;

    fn steps(&self) -> &'static [Step<PairDraft>] {
      &PAIR
    }

    async fn check(
      &self,
      _user_id: i64,
      field: &'static str,
      draft: &PairDraft,
    ) -> Result<Option<Reject>> {
      Ok((field == "left" && draft.left == "taken")
        .then(|| Reject::new("taken")))
    }

    async fn finalize(&self, _user_id: i64, draft: PairDraft) -> Result<PairDraft> {
      Ok(draft)
    }
  }

  #[tokio::test]
  async fn test_walks_steps_and_clears_on_completion() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);

    let first = engine.start(1, &Pair).await.unwrap();
    assert_eq!(first.field, "left");

    let turn = engine.advance(1, &Pair, &Input::text("a")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Ask(Prompt { field: "right", .. }))));

    let turn = engine.advance(1, &Pair, &Input::text("4")).await.unwrap();
    let Some(Turn::Done(out)) = turn else {
      panic!("expected completion");
    };
    assert_eq!(out, PairDraft { left: "a".into(), right: 4 });
    assert!(engine.active(1).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_invalid_input_does_not_advance() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);
    engine.start(1, &Pair).await.unwrap();
    engine.advance(1, &Pair, &Input::text("a")).await.unwrap();

    let turn = engine.advance(1, &Pair, &Input::text("abc")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Retry { prompt: Prompt { field: "right", .. }, .. })));

    let (step, draft) = engine.draft::<Pair>(1).await.unwrap().unwrap();
    assert_eq!(step, 1);
    assert_eq!(draft, PairDraft { left: "a".into(), right: 0 });
  }

  #[tokio::test]
  async fn test_failed_check_leaves_draft_untouched() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);
    engine.start(1, &Pair).await.unwrap();

    let turn = engine.advance(1, &Pair, &Input::text("taken")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Retry { .. })));

    let (step, draft) = engine.draft::<Pair>(1).await.unwrap().unwrap();
    assert_eq!(step, 0);
    assert_eq!(draft, PairDraft::default());
  }

  #[tokio::test]
  async fn test_restart_discards_previous_draft() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);
    engine.start(1, &Pair).await.unwrap();
    engine.advance(1, &Pair, &Input::text("first attempt")).await.unwrap();

    engine.start(1, &Pair).await.unwrap();

    let (step, draft) = engine.draft::<Pair>(1).await.unwrap().unwrap();
    assert_eq!(step, 0);
    assert_eq!(draft, PairDraft::default());
  }

  #[tokio::test]
  async fn test_state_survives_a_new_engine() {
    let db = test_db::setup().await;
    Conversations::new(&db).start(1, &Pair).await.unwrap();
    Conversations::new(&db)
      .advance(1, &Pair, &Input::text("kept"))
      .await
      .unwrap();

    let (step, draft) =
      Conversations::new(&db).draft::<Pair>(1).await.unwrap().unwrap();
    assert_eq!(step, 1);
    assert_eq!(draft.left, "kept");
  }

  struct Flaky(AtomicBool);

  #[async_trait::async_trait]
  impl Flow for Flaky {
    type Draft = PairDraft;
    type Output = PairDraft;

    const KIND: ConversationKind = ConversationKind::Order;

    fn steps(&self) -> &'static [Step<PairDraft>] {
      &PAIR
    }

    async fn finalize(&self, _user_id: i64, draft: PairDraft) -> Result<PairDraft> {
      if self.0.swap(false, Ordering::SeqCst) {
        return Err(Error::InvalidArgs("store unavailable".into()));
      }
      Ok(draft)
    }
  }

  #[tokio::test]
  async fn test_failed_finalize_keeps_last_step() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);
    let flow = Flaky(AtomicBool::new(true));
    engine.start(1, &flow).await.unwrap();
    engine.advance(1, &flow, &Input::text("a")).await.unwrap();

    assert!(engine.advance(1, &flow, &Input::text("4")).await.is_err());
    let (step, draft) = engine.draft::<Flaky>(1).await.unwrap().unwrap();
    assert_eq!(step, 1);
    assert_eq!(draft, PairDraft { left: "a".into(), right: 0 });

    let turn = engine.advance(1, &flow, &Input::text("4")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Done(PairDraft { right: 4, .. }))));
    assert!(engine.active(1).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_no_conversation_and_abort() {
    let db = test_db::setup().await;
    let engine = Conversations::new(&db);

    assert!(engine.advance(1, &Pair, &Input::text("x")).await.unwrap().is_none());
    assert!(!engine.abort(1).await.unwrap());

    engine.start(1, &Pair).await.unwrap();
    assert!(engine.abort(1).await.unwrap());
    assert!(engine.active(1).await.unwrap().is_none());
  }

  #[test]
  fn test_text_helpers() {
    assert_eq!(plain_text(&Input::text("  hi ")), Ok("hi".into()));
    assert!(plain_text(&Input::text("   ")).is_err());
    assert!(plain_text(&Input::Contact { phone: "213".into() }).is_err());
    assert_eq!(
      text_or_contact(&Input::Contact { phone: "213555".into() }),
      Ok("213555".into())
    );
  }
}
