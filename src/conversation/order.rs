use serde::{Deserialize, Serialize};

use super::{Flow, Input, Reject, Step, plain_text, text_or_contact};
use crate::{
  entity::{ConversationKind, order},
  prelude::*,
  report::{Document, Documents},
  sv::{self, NewOrder, OrderOutcome},
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
  pub customer_name: String,
  pub customer_phone: String,
  pub product_name: String,
  pub product_code: String,
  pub quantity: i32,
  pub region: String,
  pub sub_region: String,
  pub address: String,
}

impl From<OrderDraft> for NewOrder {
  fn from(d: OrderDraft) -> Self {
    NewOrder {
      customer_name: d.customer_name,
      customer_phone: d.customer_phone,
      product_name: d.product_name,
      product_code: d.product_code,
      quantity: d.quantity,
      region: d.region,
      sub_region: d.sub_region,
      address: d.address,
    }
  }
}

/// Confirmation document addressed to whoever handles new orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
  pub recipient: i64,
  pub document: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
  Recorded { order: order::Model, confirmation: Option<Outbound> },
  NotRegistered,
}

macro_rules! text_step {
  ($name:ident, $field:ident) => {
    fn $name(d: &mut OrderDraft, input: &Input) -> Result<(), Reject> {
      d.$field = plain_text(input)?;
      Ok(())
    }
  };
}

text_step!(customer_name, customer_name);
text_step!(product_name, product_name);
text_step!(product_code, product_code);
text_step!(region, region);
text_step!(sub_region, sub_region);
text_step!(address, address);

fn customer_phone(d: &mut OrderDraft, input: &Input) -> Result<(), Reject> {
  d.customer_phone = text_or_contact(input)?;
  Ok(())
}

fn quantity(d: &mut OrderDraft, input: &Input) -> Result<(), Reject> {
  let invalid = || Reject::new("⚠️ Please enter a valid quantity (number).");
  match plain_text(input)?.parse::<i32>() {
    Ok(n) if n > 0 => {
      d.quantity = n;
      Ok(())
    }
    _ => Err(invalid()),
  }
}

static STEPS: [Step<OrderDraft>; 8] = [
  Step {
    field: "customer_name",
    prompt: "📝 Enter the customer's full name:",
    contact: false,
    apply: customer_name,
  },
  Step {
    field: "customer_phone",
    prompt: "📞 Enter the customer's phone number:",
    contact: false,
    apply: customer_phone,
  },
  Step {
    field: "product_name",
    prompt: "📦 Enter the product name:",
    contact: false,
    apply: product_name,
  },
  Step {
    field: "product_code",
    prompt: "🔢 Enter the product code:",
    contact: false,
    apply: product_code,
  },
  Step {
    field: "quantity",
    prompt: "🔢 Enter the quantity:",
    contact: false,
    apply: quantity,
  },
  Step {
    field: "region",
    prompt: "📍 Enter the wilaya (state):",
    contact: false,
    apply: region,
  },
  Step {
    field: "sub_region",
    prompt: "🏙 Enter the baladiya (city):",
    contact: false,
    apply: sub_region,
  },
  Step {
    field: "address",
    prompt: "📌 Enter the exact address:",
    contact: false,
    apply: address,
  },
];

/// Collects a customer order from a registered agent and records it as
/// `Pending`.
#[derive(Clone, Copy)]
pub struct OrderIntake<'a> {
  agent: sv::Agent<'a>,
  order: sv::Order<'a>,
  docs: &'a dyn Documents,
  recipient: Option<i64>,
}

impl<'a> OrderIntake<'a> {
  pub fn new(
    agent: sv::Agent<'a>,
    order: sv::Order<'a>,
    docs: &'a dyn Documents,
    recipient: Option<i64>,
  ) -> Self {
    Self { agent, order, docs, recipient }
  }
}

#[async_trait::async_trait]
impl Flow for OrderIntake<'_> {
  type Draft = OrderDraft;
  type Output = Placed;

  const KIND: ConversationKind = ConversationKind::Order;

  fn steps(&self) -> &'static [Step<OrderDraft>] {
    &STEPS
  }

  async fn finalize(&self, user_id: i64, draft: OrderDraft) -> Result<Placed> {
    let order = match self.order.record(user_id, draft.into()).await? {
      OrderOutcome::Recorded(order) => order,
      OrderOutcome::AgentNotFound => return Ok(Placed::NotRegistered),
    };

    let confirmation = match (self.recipient, self.agent.get(user_id).await?) {
      (Some(recipient), Some(agent)) => Some(Outbound {
        recipient,
        document: self.docs.order_confirmation(&order, &agent),
      }),
      _ => None,
    };

    Ok(Placed::Recorded { order, confirmation })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    backup::Notifier,
    conversation::{Conversations, Turn},
    entity::OrderStatus,
    report::TextReport,
    sv::test_utils::test_db,
  };

  const ANSWERS: [&str; 8] =
    ["Karim", "0555000000", "Widget", "W1", "3", "R", "B", "12 St"];

  #[test]
  fn test_quantity_must_be_positive_integer() {
    let mut d = OrderDraft::default();
    for bad in ["abc", "-1", "0", "1.5", ""] {
      assert!(quantity(&mut d, &Input::text(bad)).is_err(), "{bad:?}");
    }
    assert_eq!(d.quantity, 0);
    assert!(quantity(&mut d, &Input::text(" 7 ")).is_ok());
    assert_eq!(d.quantity, 7);
  }

  #[tokio::test]
  async fn test_order_intake_records_pending_order() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(111, "Amine", "+213555", None).await.unwrap();

    let flow = OrderIntake::new(agents, sv::Order::new(&db, &sync), &TextReport, Some(999));
    let engine = Conversations::new(&db);
    engine.start(111, &flow).await.unwrap();

    let mut last = None;
    for answer in ANSWERS {
      last = engine.advance(111, &flow, &Input::text(answer)).await.unwrap();
    }

    let Some(Turn::Done(Placed::Recorded { order, confirmation })) = last else {
      panic!("expected recorded order, got {last:?}");
    };
    assert_eq!(order.agent_id, Some(111));
    assert_eq!(order.product_name, "Widget");
    assert_eq!(order.quantity, 3);
    assert_eq!(order.address, "12 St");
    assert_eq!(order.status, OrderStatus::Pending);

    let confirmation = confirmation.unwrap();
    assert_eq!(confirmation.recipient, 999);
    assert!(!confirmation.document.bytes.is_empty());
    assert!(engine.active(111).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_bad_quantity_repeats_step() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(111, "Amine", "+213555", None).await.unwrap();

    let flow = OrderIntake::new(agents, sv::Order::new(&db, &sync), &TextReport, None);
    let engine = Conversations::new(&db);
    engine.start(111, &flow).await.unwrap();
    for answer in &ANSWERS[..4] {
      engine.advance(111, &flow, &Input::text(*answer)).await.unwrap();
    }

    for bad in ["abc", "-1", "0"] {
      let turn = engine.advance(111, &flow, &Input::text(bad)).await.unwrap();
      assert!(
        matches!(turn, Some(Turn::Retry { prompt, .. }) if prompt.field == "quantity")
      );
    }

    let (step, draft) = engine.draft::<OrderIntake>(111).await.unwrap().unwrap();
    assert_eq!(step, 4);
    assert_eq!(draft.product_code, "W1");
  }

  #[tokio::test]
  async fn test_agent_removed_mid_conversation() {
    let db = test_db::setup().await;
    let sync = Notifier::disabled();
    let agents = sv::Agent::new(&db, &sync);
    agents.register(111, "Amine", "+213555", None).await.unwrap();

    let flow = OrderIntake::new(agents, sv::Order::new(&db, &sync), &TextReport, Some(999));
    let engine = Conversations::new(&db);
    engine.start(111, &flow).await.unwrap();
    for answer in &ANSWERS[..7] {
      engine.advance(111, &flow, &Input::text(*answer)).await.unwrap();
    }
    agents.remove(111).await.unwrap();

    let turn = engine.advance(111, &flow, &Input::text("12 St")).await.unwrap();
    assert!(matches!(turn, Some(Turn::Done(Placed::NotRegistered))));
  }
}
