use super::{
  Conversations, Input, OrderIntake, Placed, Prompt, Registered,
  Registration, Turn,
};
use crate::{
  entity::{ConversationKind, agent},
  prelude::*,
};

/// Outcome of a `/start` or `/place_order` request.
#[derive(Debug, Clone, PartialEq)]
pub enum Begin {
  Asked(Prompt),
  AlreadyRegistered(agent::Model),
  NotRegistered,
}

/// Outcome of feeding a message to whatever conversation is open.
#[derive(Debug)]
pub enum Reply {
  Ask(Prompt),
  Retry { reason: String, prompt: Prompt },
  Registered(Registered),
  Placed(Placed),
  /// No conversation is open for the user.
  Idle,
}

impl<O> From<Option<Turn<O>>> for Reply
where
  Reply: From<O>,
{
  fn from(turn: Option<Turn<O>>) -> Self {
    match turn {
      None => Reply::Idle,
      Some(Turn::Ask(prompt)) => Reply::Ask(prompt),
      Some(Turn::Retry { reason, prompt }) => Reply::Retry { reason, prompt },
      Some(Turn::Done(out)) => out.into(),
    }
  }
}

impl From<Registered> for Reply {
  fn from(r: Registered) -> Self {
    Reply::Registered(r)
  }
}

impl From<Placed> for Reply {
  fn from(p: Placed) -> Self {
    Reply::Placed(p)
  }
}

/// Routes each user to the flow recorded for them.
#[derive(Clone, Copy)]
pub struct Dialog<'a> {
  engine: Conversations<'a>,
  registration: Registration<'a>,
  order: OrderIntake<'a>,
}

impl<'a> Dialog<'a> {
  pub fn new(
    engine: Conversations<'a>,
    registration: Registration<'a>,
    order: OrderIntake<'a>,
  ) -> Self {
    Self { engine, registration, order }
  }

  pub async fn begin_registration(
    &self,
    user_id: i64,
    registered: Option<agent::Model>,
  ) -> Result<Begin> {
    if let Some(agent) = registered {
      return Ok(Begin::AlreadyRegistered(agent));
    }
    Ok(Begin::Asked(self.engine.start(user_id, &self.registration).await?))
  }

  pub async fn begin_order(
    &self,
    user_id: i64,
    registered: Option<agent::Model>,
  ) -> Result<Begin> {
    if registered.is_none() {
      return Ok(Begin::NotRegistered);
    }
    Ok(Begin::Asked(self.engine.start(user_id, &self.order).await?))
  }

  pub async fn handle(&self, user_id: i64, input: &Input) -> Result<Reply> {
    let Some(active) = self.engine.active(user_id).await? else {
      return Ok(Reply::Idle);
    };

    Ok(match active.kind {
      ConversationKind::Registration => {
        self.engine.advance(user_id, &self.registration, input).await?.into()
      }
      ConversationKind::Order => {
        self.engine.advance(user_id, &self.order, input).await?.into()
      }
    })
  }

  pub async fn cancel(&self, user_id: i64) -> Result<bool> {
    self.engine.abort(user_id).await
  }

  pub async fn kind(&self, user_id: i64) -> Result<Option<ConversationKind>> {
    Ok(self.engine.active(user_id).await?.map(|c| c.kind))
  }
}
