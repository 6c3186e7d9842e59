//! Document rendering for rosters, order histories and confirmations.
//!
//! The transport only needs bytes plus a file name; the plain-text renderer
//! below produces fixed-width tables that read well in any viewer.

use crate::{
  entity::{agent, order, payout_request},
  prelude::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  pub file_name: String,
  pub bytes: Vec<u8>,
}

pub trait Documents: Send + Sync {
  fn agent_roster(&self, agents: &[agent::Model]) -> Document;

  fn order_history(&self, owner: i64, orders: &[order::Model]) -> Document;

  fn order_confirmation(
    &self,
    order: &order::Model,
    agent: &agent::Model,
  ) -> Document;

  fn order_details(&self, order: &order::Model) -> Document;

  fn payout_queue(&self, requests: &[payout_request::Model]) -> Document;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextReport;

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
  let mut widths: Vec<usize> =
    headers.iter().map(|h| h.chars().count()).collect();
  for row in rows {
    for (i, cell) in row.iter().enumerate() {
      widths[i] = widths[i].max(cell.chars().count());
    }
  }

  let line = |cells: &mut dyn Iterator<Item = String>| {
    let padded: Vec<String> = cells
      .enumerate()
      .map(|(i, cell)| {
        let pad = widths[i] - cell.chars().count();
        format!("{cell}{}", " ".repeat(pad))
      })
      .collect();
    format!("| {} |\n", padded.join(" | "))
  };

  let mut out = line(&mut headers.iter().map(|h| h.to_string()));
  let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
  out.push_str(&format!("|-{}-|\n", rule.join("-|-")));
  for row in rows {
    out.push_str(&line(&mut row.iter().cloned()));
  }
  out
}

fn document(file_name: String, title: &str, body: String) -> Document {
  let text = format!(
    "{title}\nGenerated {}\n\n{body}",
    utils::format_date(utils::now())
  );
  Document { file_name, bytes: text.into_bytes() }
}

impl Documents for TextReport {
  fn agent_roster(&self, agents: &[agent::Model]) -> Document {
    let rows: Vec<Vec<String>> = agents
      .iter()
      .map(|a| {
        vec![
          a.tg_user_id.to_string(),
          a.full_name.clone(),
          a.phone_number.clone(),
          a.referred_by.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
          a.balance.to_string(),
          a.earnings.to_string(),
          utils::format_date(a.joined_at),
          a.referral_count.to_string(),
        ]
      })
      .collect();

    let headers = [
      "Telegram ID", "Full Name", "Phone", "Invited By", "Balance", "Earnings",
      "Date Joined", "Invites",
    ];
    document(
      "agents.txt".into(),
      "Agent List Report",
      table(&headers, &rows),
    )
  }

  fn order_history(&self, owner: i64, orders: &[order::Model]) -> Document {
    let rows: Vec<Vec<String>> = orders
      .iter()
      .map(|o| {
        vec![
          o.id.to_string(),
          o.product_name.clone(),
          o.product_code.clone(),
          o.quantity.to_string(),
          format!("{}, {}", o.region, o.sub_region),
          format!("{:?}", o.status),
          utils::format_date(o.created_at),
        ]
      })
      .collect();

    let headers =
      ["#", "Product", "Code", "Qty", "Location", "Status", "Date"];
    document(
      format!("orders_{owner}.txt"),
      "Order History",
      table(&headers, &rows),
    )
  }

  fn order_confirmation(
    &self,
    order: &order::Model,
    agent: &agent::Model,
  ) -> Document {
    let body = format!(
      "Agent\n\
       \x20 ID: {}\n\
       \x20 Name: {}\n\
       \x20 Phone: {}\n\n\
       Order\n\
       \x20 Customer: {} ({})\n\
       \x20 Product: {} (code {})\n\
       \x20 Quantity: {}\n\n\
       Shipping address\n\
       \x20 Region: {}\n\
       \x20 Sub-region: {}\n\
       \x20 Address: {}\n\n\
       Status: {:?}\n\n\
       Please confirm the order details before processing.\n",
      agent.tg_user_id,
      agent.full_name,
      agent.phone_number,
      order.customer_name,
      order.customer_phone,
      order.product_name,
      order.product_code,
      order.quantity,
      order.region,
      order.sub_region,
      order.address,
      order.status,
    );

    document(
      format!("order_{}.txt", order.id),
      &format!("Order Confirmation #{}", order.id),
      body,
    )
  }

  fn order_details(&self, order: &order::Model) -> Document {
    let agent = order
      .agent_id
      .map(|id| id.to_string())
      .unwrap_or_else(|| "removed".into());
    let body = format!(
      "Agent: {agent}\n\
       Customer: {} ({})\n\
       Product: {} (code {})\n\
       Quantity: {}\n\
       Address: {}, {}, {}\n\
       Status: {:?}\n\
       Date: {}\n",
      order.customer_name,
      order.customer_phone,
      order.product_name,
      order.product_code,
      order.quantity,
      order.region,
      order.sub_region,
      order.address,
      order.status,
      utils::format_date(order.created_at),
    );

    document(
      format!("order_{}.txt", order.id),
      &format!("Order Details #{}", order.id),
      body,
    )
  }

  fn payout_queue(&self, requests: &[payout_request::Model]) -> Document {
    let rows: Vec<Vec<String>> = requests
      .iter()
      .map(|r| {
        vec![
          r.id.to_string(),
          r.agent_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
          r.agent_name.clone(),
          r.phone_number.clone(),
          r.amount.to_string(),
          r.balance_snapshot.to_string(),
          utils::format_date(r.requested_at),
        ]
      })
      .collect();

    let headers =
      ["#", "Agent", "Name", "Phone", "Amount", "Balance", "Requested"];
    document(
      "payouts.txt".into(),
      "Pending Payout Requests",
      table(&headers, &rows),
    )
  }
}
