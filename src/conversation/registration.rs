use serde::{Deserialize, Serialize};

use super::{Flow, Input, Reject, Step, plain_text, text_or_contact};
use crate::{
  entity::{ConversationKind, agent},
  prelude::*,
  sv::{self, ReferralOutcome},
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDraft {
  pub full_name: String,
  pub phone_number: String,
  /// `None` when the user answered `0`.
  pub referrer: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Registered {
  Completed { agent: agent::Model, referral: Option<ReferralOutcome> },
  AlreadyRegistered(agent::Model),
}

fn full_name(d: &mut RegistrationDraft, input: &Input) -> Result<(), Reject> {
  d.full_name = plain_text(input)?;
  Ok(())
}

fn phone_number(d: &mut RegistrationDraft, input: &Input) -> Result<(), Reject> {
  let phone = text_or_contact(input)?;
  if !(phone.starts_with("+213") || phone.starts_with("213")) {
    return Err(Reject::new(
      "⚠️ Invalid phone number! Please send a valid number (starting with +213 or 213).",
    ));
  }
  d.phone_number = phone;
  Ok(())
}

const INVALID_CODE: &str =
  "⚠️ Invalid referral code! Please enter a valid Telegram ID or type '0' if you don't have one:";

fn referral_code(d: &mut RegistrationDraft, input: &Input) -> Result<(), Reject> {
  let code = plain_text(input)?;
  if code == "0" {
    d.referrer = None;
    return Ok(());
  }
  if !code.chars().all(|c| c.is_ascii_digit()) {
    return Err(Reject::new(INVALID_CODE));
  }
  d.referrer = Some(code.parse().map_err(|_| Reject::new(INVALID_CODE))?);
  Ok(())
}

static STEPS: [Step<RegistrationDraft>; 3] = [
  Step {
    field: "full_name",
    prompt: "👋 Welcome! Please send your full name to register.",
    contact: false,
    apply: full_name,
  },
  Step {
    field: "phone_number",
    prompt: "📞 Now, please send your phone number or share your contact.",
    contact: true,
    apply: phone_number,
  },
  Step {
    field: "referral_code",
    prompt: "🔢 Enter the referral code (Telegram ID of the inviter) or type '0' if you don't have one:",
    contact: false,
    apply: referral_code,
  },
];

/// Collects name, phone and an optional referrer, then registers the agent
/// and credits the referrer once.
#[derive(Clone, Copy)]
pub struct Registration<'a> {
  agent: sv::Agent<'a>,
  referral: sv::Referral<'a>,
}

impl<'a> Registration<'a> {
  pub fn new(agent: sv::Agent<'a>, referral: sv::Referral<'a>) -> Self {
    Self { agent, referral }
  }
}

#[async_trait::async_trait]
impl Flow for Registration<'_> {
  type Draft = RegistrationDraft;
  type Output = Registered;

  const KIND: ConversationKind = ConversationKind::Registration;

  fn steps(&self) -> &'static [Step<RegistrationDraft>] {
    &STEPS
  }

  async fn check(
    &self,
    user_id: i64,
    field: &'static str,
    draft: &RegistrationDraft,
  ) -> Result<Option<Reject>> {
    if field != "referral_code" {
      return Ok(None);
    }
    let Some(referrer) = draft.referrer else {
      return Ok(None);
    };
    if referrer == user_id {
      return Ok(Some(Reject::new("⚠️ You cannot use your own ID as a referral code.")));
    }
    if self.agent.get(referrer).await?.is_none() {
      return Ok(Some(Reject::new(INVALID_CODE)));
    }
    Ok(None)
  }

  async fn finalize(
    &self,
    user_id: i64,
    draft: RegistrationDraft,
  ) -> Result<Registered> {
    let registration = self
      .agent
      .register(user_id, &draft.full_name, &draft.phone_number, draft.referrer)
      .await?;

    // The agent row and the referral credit commit separately. An existing
    // agent whose link was never credited gets the credit now; `record` is
    // a no-op for an edge that already exists.
    let (agent, fresh) = match registration {
      sv::Registration::Registered(agent) => (agent, true),
      sv::Registration::AlreadyExists(agent) => (agent, false),
    };

    let referral = match agent.referred_by {
      Some(referrer) => Some(self.referral.record(referrer, user_id).await?),
      None => None,
    };

    match referral {
      _ if fresh => Ok(Registered::Completed { agent, referral }),
      Some(ReferralOutcome::Credited { .. }) => {
        info!("credited pending referral of {user_id} on retry");
        Ok(Registered::Completed { agent, referral })
      }
      _ => Ok(Registered::AlreadyRegistered(agent)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    backup::Notifier,
    conversation::{Conversations, Turn},
    sv::test_utils::test_db,
  };

  fn text(s: &str) -> Input {
    Input::text(s)
  }

  #[test]
  fn test_phone_prefixes() {
    let mut d = RegistrationDraft::default();
    assert!(phone_number(&mut d, &text(" +213555000 ")).is_ok());
    assert_eq!(d.phone_number, "+213555000");
    assert!(phone_number(&mut d, &text("213555000")).is_ok());
    assert!(phone_number(&mut d, &Input::Contact { phone: "213777".into() }).is_ok());
    assert_eq!(d.phone_number, "213777");
    assert!(phone_number(&mut d, &text("0555000000")).is_err());
    assert!(phone_number(&mut d, &text("+33555000")).is_err());
  }

  #[test]
  fn test_referral_code_shapes() {
    let mut d = RegistrationDraft::default();
    assert!(referral_code(&mut d, &text("0")).is_ok());
    assert_eq!(d.referrer, None);
    assert!(referral_code(&mut d, &text("222")).is_ok());
    assert_eq!(d.referrer, Some(222));
    assert!(referral_code(&mut d, &text("abc")).is_err());
    assert!(referral_code(&mut d, &text("-5")).is_err());
    assert!(referral_code(&mut d, &text("99999999999999999999999")).is_err());
  }

  #[tokio::test]
  async fn test_registration_with_referrer_credits_once() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(222, "Referrer", "+213111", None).await.unwrap();

    let flow = Registration::new(agents, sv::Referral::new(&db, &sync));
    let engine = Conversations::new(&db);

    engine.start(111, &flow).await.unwrap();
    engine.advance(111, &flow, &text("Amine")).await.unwrap();
    engine.advance(111, &flow, &text("+213555000")).await.unwrap();
    let turn = engine.advance(111, &flow, &text("222")).await.unwrap();

    let Some(Turn::Done(Registered::Completed { agent, referral })) = turn else {
      panic!("expected completed registration, got {turn:?}");
    };
    assert_eq!(agent.full_name, "Amine");
    assert_eq!(agent.referred_by, Some(222));
    assert_eq!(
      referral,
      Some(ReferralOutcome::Credited { balance: 50, earnings: 50 })
    );

    let referrer = agents.get(222).await.unwrap().unwrap();
    assert_eq!(referrer.balance, 50);
    assert_eq!(referrer.referral_count, 1);
  }

  #[tokio::test]
  async fn test_unknown_referral_code_asks_again() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let flow =
      Registration::new(sv::Agent::new(&db, &sync), sv::Referral::new(&db, &sync));
    let engine = Conversations::new(&db);

    engine.start(111, &flow).await.unwrap();
    engine.advance(111, &flow, &text("Amine")).await.unwrap();
    engine.advance(111, &flow, &text("213555000")).await.unwrap();

    let turn = engine.advance(111, &flow, &text("999")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Retry { .. })));
    let turn = engine.advance(111, &flow, &text("111")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Retry { .. })));

    let turn = engine.advance(111, &flow, &text("0")).await.unwrap();
    let Some(Turn::Done(Registered::Completed { agent, referral })) = turn else {
      panic!("expected completed registration");
    };
    assert_eq!(agent.referred_by, None);
    assert_eq!(referral, None);
  }

  #[tokio::test]
  async fn test_invalid_phone_keeps_step() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let flow =
      Registration::new(sv::Agent::new(&db, &sync), sv::Referral::new(&db, &sync));
    let engine = Conversations::new(&db);

    engine.start(111, &flow).await.unwrap();
    engine.advance(111, &flow, &text("Amine")).await.unwrap();
    let turn = engine.advance(111, &flow, &text("0555")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Retry { .. })));

    let (step, draft) = engine.draft::<Registration>(111).await.unwrap().unwrap();
    assert_eq!(step, 1);
    assert_eq!(draft.phone_number, "");
  }

  #[tokio::test]
  async fn test_resent_code_completes_credit_after_partial_finalize() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(222, "Referrer", "+213111", None).await.unwrap();

    let flow = Registration::new(agents, sv::Referral::new(&db, &sync));
    let engine = Conversations::new(&db);
    engine.start(111, &flow).await.unwrap();
    engine.advance(111, &flow, &text("Amine")).await.unwrap();
    engine.advance(111, &flow, &text("+213555000")).await.unwrap();

    // agent row committed, credit never reached
    agents.register(111, "Amine", "+213555000", Some(222)).await.unwrap();

    let turn = engine.advance(111, &flow, &text("222")).await.unwrap();
    assert!(matches!(
      turn,
      Some(Turn::Done(Registered::Completed {
        referral: Some(ReferralOutcome::Credited { balance: 50, earnings: 50 }),
        ..
      }))
    ));

    let referrer = agents.get(222).await.unwrap().unwrap();
    assert_eq!((referrer.balance, referrer.referral_count), (50, 1));

    // a further retry stays a no-op
    let referral = sv::Referral::new(&db, &sync);
    assert_eq!(
      referral.record(222, 111).await.unwrap(),
      ReferralOutcome::AlreadyReferred
    );
    assert_eq!(agents.get(222).await.unwrap().unwrap().balance, 50);
  }

  #[tokio::test]
  async fn test_existing_agent_is_not_registered_twice() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(111, "Old", "+213000", None).await.unwrap();

    let flow = Registration::new(agents, sv::Referral::new(&db, &sync));
    let engine = Conversations::new(&db);
    engine.start(111, &flow).await.unwrap();
    engine.advance(111, &flow, &text("New")).await.unwrap();
    engine.advance(111, &flow, &text("+213999")).await.unwrap();
    let turn = engine.advance(111, &flow, &text("0")).await.unwrap();

    assert!(matches!(
      turn,
      Some(Turn::Done(Registered::AlreadyRegistered(agent::Model { ref full_name, .. })))
        if full_name == "Old"
    ));
  }
}
