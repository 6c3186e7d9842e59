use std::sync::Arc;

use teloxide::{
  prelude::*,
  types::{InlineKeyboardButton, InlineKeyboardMarkup},
  utils::html::escape,
};

use super::ReplyBot;
use crate::{
  entity::{OrderStatus, PayoutStatus, order, payout_request},
  prelude::*,
  state::AppState,
};

/// Callback data for admin inline actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
  SetOrder(i32, OrderStatus),
  ApprovePayout(i32),
  MarkPaid(i32),
}

impl Callback {
  pub fn to_data(self) -> String {
    match self {
      Callback::SetOrder(id, status) => format!("ord:{id}:{status:?}"),
      Callback::ApprovePayout(id) => format!("pay_ok:{id}"),
      Callback::MarkPaid(id) => format!("pay_paid:{id}"),
    }
  }

  pub fn from_data(data: &str) -> Option<Self> {
    let (tag, rest) = data.split_once(':')?;
    match tag {
      "ord" => {
        let (id, status) = rest.split_once(':')?;
        Some(Callback::SetOrder(id.parse().ok()?, OrderStatus::parse(status)?))
      }
      "pay_ok" => Some(Callback::ApprovePayout(rest.parse().ok()?)),
      "pay_paid" => Some(Callback::MarkPaid(rest.parse().ok()?)),
      _ => None,
    }
  }
}

/// Buttons for every status the order may still move to.
pub fn order_keyboard(order: &order::Model) -> InlineKeyboardMarkup {
  let buttons: Vec<InlineKeyboardButton> = [
    (OrderStatus::Approved, "✅ Approve"),
    (OrderStatus::Delivered, "📦 Delivered"),
    (OrderStatus::Rejected, "❌ Reject"),
  ]
  .into_iter()
  .filter(|(status, _)| order.status.can_become(*status))
  .map(|(status, label)| {
    InlineKeyboardButton::callback(
      label,
      Callback::SetOrder(order.id, status).to_data(),
    )
  })
  .collect();

  InlineKeyboardMarkup::new(vec![buttons])
}

pub fn payout_keyboard(request: &payout_request::Model) -> InlineKeyboardMarkup {
  let button = match request.status {
    PayoutStatus::Pending => Some(InlineKeyboardButton::callback(
      "✅ Approve",
      Callback::ApprovePayout(request.id).to_data(),
    )),
    PayoutStatus::Approved => Some(InlineKeyboardButton::callback(
      "💸 Mark paid",
      Callback::MarkPaid(request.id).to_data(),
    )),
    PayoutStatus::Paid => None,
  };
  InlineKeyboardMarkup::new(vec![button.into_iter().collect::<Vec<_>>()])
}

pub fn order_line(order: &order::Model) -> String {
  format!(
    "📦 <b>Order #{}</b> ({:?})\n\
    Agent: <code>{}</code>\n\
    {} x{} ({})\n\
    Customer: {} {}\n\
    {} / {} / {}",
    order.id,
    order.status,
    order.agent_id.map(|id| id.to_string()).unwrap_or_else(|| "removed".into()),
    escape(&order.product_name),
    order.quantity,
    escape(&order.product_code),
    escape(&order.customer_name),
    escape(&order.customer_phone),
    escape(&order.region),
    escape(&order.sub_region),
    escape(&order.address),
  )
}

pub fn payout_line(request: &payout_request::Model) -> String {
  format!(
    "💰 <b>Payout #{}</b> ({:?})\n\
    {} (<code>{}</code>) {}\n\
    Amount: {} | Balance at request: {}\n\
    Requested: {}",
    request.id,
    request.status,
    escape(&request.agent_name),
    request.agent_id.map(|id| id.to_string()).unwrap_or_else(|| "removed".into()),
    escape(&request.phone_number),
    utils::format_amount(request.amount),
    utils::format_amount(request.balance_snapshot),
    utils::format_date(request.requested_at),
  )
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  data: &str,
) -> ResponseResult<()> {
  let sv = app.sv();

  let Some(callback) = Callback::from_data(data) else {
    return Ok(());
  };

  let admin = match sv.admin.authorize(bot.user_id) {
    Ok(admin) => admin,
    Err(e) => {
      bot.reply_html(e.user_message()).await?;
      return Ok(());
    }
  };

  match callback {
    Callback::SetOrder(id, status) => {
      match admin.update_order(id, status).await {
        Ok(order) => {
          bot.edit_with_keyboard(order_line(&order), order_keyboard(&order)).await?;
        }
        Err(e) => {
          bot.reply_html(format!("❌ {}", e.user_message())).await?;
        }
      }
    }
    Callback::ApprovePayout(id) | Callback::MarkPaid(id) => {
      let result = if let Callback::ApprovePayout(_) = callback {
        admin.approve_payout(id).await
      } else {
        admin.mark_paid(id).await
      };
      match result {
        Ok(request) => {
          bot
            .edit_with_keyboard(payout_line(&request), payout_keyboard(&request))
            .await?;
        }
        Err(e) => {
          bot.reply_html(format!("❌ {}", e.user_message())).await?;
        }
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_callback_data_parses_back() {
    for cb in [
      Callback::SetOrder(12, OrderStatus::Delivered),
      Callback::ApprovePayout(3),
      Callback::MarkPaid(4),
    ] {
      assert_eq!(Callback::from_data(&cb.to_data()), Some(cb));
    }
    assert_eq!(Callback::from_data("ord:1:Shipped"), None);
    assert_eq!(Callback::from_data("pay_ok:x"), None);
    assert_eq!(Callback::from_data("profile"), None);
  }
}
