use std::sync::Arc;

use teloxide::{
  prelude::*,
  types::{KeyboardRemove, ParseMode},
  utils::{command::BotCommands, html::escape},
};

use super::{
  ReplyBot,
  callback::{order_keyboard, order_line, payout_keyboard, payout_line},
};
use crate::{
  backup::{self, Pushed},
  entity::OrderStatus,
  prelude::*,
  report::Document,
  state::AppState,
  sv::{PayoutOutcome, Registration, Removal, commission},
};

const RECENT_ORDERS: u64 = 10;

/// Longer payout queues are sent as one document instead of a message each.
const PAYOUT_MESSAGES: usize = 10;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Agent commands:")]
pub enum UserCommand {
  #[command(description = "register or show the welcome message")]
  Start,
  #[command(description = "show your profile")]
  Profile,
  #[command(description = "show how many agents you invited")]
  Referrals,
  #[command(description = "show earnings and balance")]
  Earnings,
  #[command(description = "request a payout (default 2000 DZD)")]
  PayMe(String),
  #[command(description = "place a customer order")]
  PlaceOrder,
  #[command(description = "download your order history")]
  Orders,
  #[command(description = "abort the current form")]
  Cancel,
  #[command(description = "show this message")]
  Help,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Admin commands:")]
pub enum AdminCommand {
  #[command(description = "<id> <full name> <phone>: register an agent")]
  AddUser(String),
  #[command(description = "<id>: remove an agent")]
  RemoveUser(String),
  #[command(description = "download the agent roster")]
  ListUsers,
  #[command(description = "show the most recent orders")]
  OrderList,
  #[command(description = "<id>: show one order")]
  SeeOrder(String),
  #[command(description = "<id> <status>: change an order status")]
  UpdateOrder(String),
  #[command(description = "show pending payout requests")]
  Payouts,
  #[command(description = "<id>: approve a payout request")]
  ApprovePayout(String),
  #[command(description = "<id>: mark a payout request as paid")]
  MarkPaid(String),
  #[command(description = "send the database and push a backup")]
  Backup,
}

fn parse_id<T: std::str::FromStr>(input: &str, usage: &str) -> Result<T> {
  input.trim().parse().map_err(|_| Error::InvalidArgs(usage.into()))
}

/// `<id> <full name...> <phone>`
fn parse_add_user(input: &str) -> Result<(i64, String, String)> {
  const USAGE: &str = "Usage: /add_user <telegram_id> <full name> <phone>";

  let parts: Vec<&str> = input.split_whitespace().collect();
  let [id, name @ .., phone] = parts.as_slice() else {
    return Err(Error::InvalidArgs(USAGE.into()));
  };
  if name.is_empty() {
    return Err(Error::InvalidArgs(USAGE.into()));
  }
  let id = id
    .parse()
    .map_err(|_| Error::InvalidArgs("⚠️ Invalid Telegram ID. Please enter a numeric value.".into()))?;

  Ok((id, name.join(" "), phone.to_string()))
}

fn parse_update_order(input: &str) -> Result<(i32, OrderStatus)> {
  const USAGE: &str =
    "Usage: /update_order <order_id> <Approved|Rejected|Delivered>";

  let mut parts = input.split_whitespace();
  let (Some(id), Some(status), None) = (parts.next(), parts.next(), parts.next())
  else {
    return Err(Error::InvalidArgs(USAGE.into()));
  };
  let id = parse_id(id, "⚠️ Invalid Order ID. Please enter a numeric value.")?;
  let status = OrderStatus::parse(status).ok_or_else(|| Error::InvalidArgs(USAGE.into()))?;
  Ok((id, status))
}

fn parse_amount(input: &str) -> Result<i64> {
  let input = input.trim();
  if input.is_empty() {
    return Ok(commission::DEFAULT_PAYOUT);
  }
  match input.parse::<i64>() {
    Ok(amount) if amount > 0 => Ok(amount),
    _ => Err(Error::InvalidArgs("Usage: /pay_me [amount in DZD]".into())),
  }
}

fn help_text(is_admin: bool) -> String {
  let mut text = UserCommand::descriptions().to_string();
  if is_admin {
    text.push_str("\n\n");
    text.push_str(&AdminCommand::descriptions().to_string());
  }
  escape(&text)
}

pub async fn handle_user(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: UserCommand,
) -> ResponseResult<()> {
  let _turn = app.turn(bot.user_id).await;
  let sv = app.sv();

  let result: Result<String> = match cmd {
    UserCommand::Start => {
      return match async {
        let me = sv.agent.get(bot.user_id).await?;
        sv.dialog.begin_registration(bot.user_id, me).await
      }
      .await
      {
        Ok(begin) => bot.begin_reply(begin).await,
        Err(e) => fail(&bot, e).await,
      };
    }
    UserCommand::PlaceOrder => {
      return match async {
        let me = sv.agent.get(bot.user_id).await?;
        sv.dialog.begin_order(bot.user_id, me).await
      }
      .await
      {
        Ok(begin) => bot.begin_reply(begin).await,
        Err(e) => fail(&bot, e).await,
      };
    }
    UserCommand::Cancel => {
      let text = match sv.dialog.cancel(bot.user_id).await {
        Ok(true) => "❌ Cancelled.",
        Ok(false) => "Nothing to cancel.",
        Err(e) => return fail(&bot, e).await,
      };
      bot.reply_with_markup(text, KeyboardRemove::new()).await?;
      return Ok(());
    }
    UserCommand::Help => Ok(help_text(app.admins.contains(&bot.user_id))),

    UserCommand::Profile => async {
      let agent = sv.agent.get(bot.user_id).await?.ok_or(Error::AgentNotFound)?;
      Ok::<_, Error>(format!(
        "👤 <b>Your Profile</b>\n\n\
        🆔 Telegram ID: <code>{}</code>\n\
        📛 Name: {}\n\
        📞 Phone: {}\n\
        🤝 Invited by: {}\n\
        📅 Joined: {}\n\n\
        💰 Balance: {}\n\
        📈 Earnings: {}\n\
        👥 Referrals: {}",
        agent.tg_user_id,
        escape(&agent.full_name),
        escape(&agent.phone_number),
        agent.referred_by.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
        utils::format_date(agent.joined_at),
        utils::format_amount(agent.balance),
        utils::format_amount(agent.earnings),
        agent.referral_count,
      ))
    }
    .await,

    UserCommand::Referrals => async {
      sv.agent.get(bot.user_id).await?.ok_or(Error::AgentNotFound)?;
      let stats = sv.referral.stats(bot.user_id).await?;
      let mut text = format!(
        "👥 <b>Your Referrals</b>\n\n\
        Invited agents: <b>{}</b>\n\
        Referral earnings: <b>{}</b>\n\n\
        Your referral code: <code>{}</code>",
        stats.referral_count,
        utils::format_amount(stats.earnings),
        bot.user_id
      );
      if !stats.referred.is_empty() {
        text.push_str("\n\nInvited:");
        for id in &stats.referred {
          text.push_str(&format!("\n• <code>{id}</code>"));
        }
      }
      Ok::<_, Error>(text)
    }
    .await,

    UserCommand::Earnings => async {
      let agent = sv.agent.get(bot.user_id).await?.ok_or(Error::AgentNotFound)?;
      Ok::<_, Error>(format!(
        "💵 <b>Your Earnings</b>\n\n\
        📈 Total earned: <b>{}</b>\n\
        💰 Current balance: <b>{}</b>\n\n\
        Minimum payout: {}. Use /pay_me to request one.",
        utils::format_amount(agent.earnings),
        utils::format_amount(agent.balance),
        utils::format_amount(commission::PAYOUT_MINIMUM),
      ))
    }
    .await,

    UserCommand::PayMe(amount) => async {
      let amount = parse_amount(&amount)?;
      Ok::<_, Error>(match sv.payout.request(bot.user_id, amount).await? {
        PayoutOutcome::Submitted { request, balance } => {
          notify_admins(&app, payout_line(&request), Some(&request)).await;
          format!(
            "✅ <b>Payment Request Submitted!</b>\n\n\
            📌 Amount: <b>{}</b>\n\
            💰 Your Balance: <b>{}</b>\n\
            🔄 Status: <b>Pending approval</b>\n\n\
            🔔 Admin will review your request soon.",
            utils::format_amount(amount),
            utils::format_amount(balance),
          )
        }
        PayoutOutcome::InsufficientBalance { balance } => format!(
          "❌ <b>Insufficient Balance!</b>\n\n\
          💰 Your Balance: <b>{}</b>\n\
          ⚠️ You need at least <b>{}</b> to request a payment.",
          utils::format_amount(balance),
          utils::format_amount(amount.max(commission::PAYOUT_MINIMUM)),
        ),
        PayoutOutcome::AgentNotFound => return Err(Error::AgentNotFound),
      })
    }
    .await,

    UserCommand::Orders => {
      let orders = match sv.order.list(bot.user_id).await {
        Ok(orders) => orders,
        Err(e) => return fail(&bot, e).await,
      };
      if orders.is_empty() {
        bot.reply_html("📭 You have no orders yet.").await?;
      } else {
        bot.send_document(sv.docs.order_history(bot.user_id, &orders)).await?;
      }
      return Ok(());
    }
  };

  reply(&bot, result).await
}

pub async fn handle_admin(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: AdminCommand,
) -> ResponseResult<()> {
  let sv = app.sv();

  let admin = match sv.admin.authorize(bot.user_id) {
    Ok(admin) => admin,
    Err(e) => return fail(&bot, e).await,
  };

  let result: Result<String> = match cmd {
    AdminCommand::AddUser(args) => async {
      let (id, name, phone) = parse_add_user(&args)?;
      Ok::<_, Error>(match admin.add_agent(id, &name, &phone).await? {
        Registration::Registered(agent) => format!(
          "✅ Agent <b>{}</b> (<code>{}</code>) added.",
          escape(&agent.full_name),
          agent.tg_user_id
        ),
        Registration::AlreadyExists(agent) => format!(
          "ℹ️ <code>{}</code> is already registered as <b>{}</b>.",
          agent.tg_user_id,
          escape(&agent.full_name)
        ),
      })
    }
    .await,

    AdminCommand::RemoveUser(id) => async {
      let id: i64 =
        parse_id(&id, "⚠️ Invalid Telegram ID. Please enter a numeric value.")?;
      Ok::<_, Error>(match admin.remove_agent(id).await? {
        Removal::Removed => format!("🗑 Agent <code>{id}</code> removed."),
        Removal::NotFound => format!("⚠️ No agent with ID <code>{id}</code>."),
      })
    }
    .await,

    AdminCommand::ListUsers => {
      match admin.roster().await {
        Ok(agents) if agents.is_empty() => {
          bot.reply_html("📭 No agents registered yet.").await?;
        }
        Ok(agents) => {
          bot.send_document(sv.docs.agent_roster(&agents)).await?;
        }
        Err(e) => return fail(&bot, e).await,
      }
      return Ok(());
    }

    AdminCommand::OrderList => {
      match admin.recent_orders(RECENT_ORDERS).await {
        Ok(orders) if orders.is_empty() => {
          bot.reply_html("📭 No orders yet.").await?;
        }
        Ok(orders) => {
          let text = orders.iter().map(order_line).collect::<Vec<_>>().join("\n\n");
          bot
            .reply_html_chunked(format!("🗂 <b>Recent orders</b>\n\n{text}"))
            .await?;
        }
        Err(e) => return fail(&bot, e).await,
      }
      return Ok(());
    }

    AdminCommand::SeeOrder(id) => {
      let order = match async {
        let id = parse_id(&id, "⚠️ Invalid Order ID. Please enter a numeric value.")?;
        admin.order(id).await
      }
      .await
      {
        Ok(order) => order,
        Err(e) => return fail(&bot, e).await,
      };
      bot.send_document(sv.docs.order_details(&order)).await?;
      bot.reply_with_markup(order_line(&order), order_keyboard(&order)).await?;
      return Ok(());
    }

    AdminCommand::UpdateOrder(args) => async {
      let (id, status) = parse_update_order(&args)?;
      let order = admin.update_order(id, status).await?;
      Ok::<_, Error>(format!("✅ Order #{} is now {:?}.", order.id, order.status))
    }
    .await,

    AdminCommand::Payouts => {
      match admin.pending_payouts().await {
        Ok(requests) if requests.is_empty() => {
          bot.reply_html("📭 No pending payout requests.").await?;
        }
        Ok(requests) if requests.len() > PAYOUT_MESSAGES => {
          bot.send_document(sv.docs.payout_queue(&requests)).await?;
        }
        Ok(requests) => {
          for request in &requests {
            bot
              .reply_with_markup(payout_line(request), payout_keyboard(request))
              .await?;
          }
        }
        Err(e) => return fail(&bot, e).await,
      }
      return Ok(());
    }

    AdminCommand::ApprovePayout(id) => async {
      let id = parse_id(&id, "Usage: /approve_payout <request_id>")?;
      let request = admin.approve_payout(id).await?;
      Ok::<_, Error>(format!("✅ Payout #{} approved.\n\n{}", request.id, payout_line(&request)))
    }
    .await,

    AdminCommand::MarkPaid(id) => async {
      let id = parse_id(&id, "Usage: /mark_paid <request_id>")?;
      let request = admin.mark_paid(id).await?;
      Ok::<_, Error>(format!("💸 Payout #{} marked as paid.", request.id))
    }
    .await,

    AdminCommand::Backup => {
      match backup::snapshot(&app.db).await {
        Ok(bytes) => {
          let file_name = app
            .config
            .database_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger.db".into());
          bot.send_document(Document { file_name, bytes }).await?;
        }
        Err(e) => {
          error!("manual snapshot failed: {e}");
          return fail(&bot, e).await;
        }
      }
      app.sync.flush().await.map(|pushed| match pushed {
        Pushed::Uploaded { bytes } => {
          format!("☁️ Backup pushed ({bytes} bytes compressed).")
        }
        Pushed::Unchanged => "☁️ Remote copy already up to date.".into(),
        Pushed::Disabled => "⚠️ Remote backup is not configured.".into(),
      })
    }
  };

  reply(&bot, result).await
}

async fn reply(bot: &ReplyBot, result: Result<String>) -> ResponseResult<()> {
  match result {
    Ok(text) => {
      bot.reply_html_chunked(text).await?;
    }
    Err(e) => return fail(bot, e).await,
  }
  Ok(())
}

async fn fail(bot: &ReplyBot, e: Error) -> ResponseResult<()> {
  if e.is_storage() {
    error!("request from {} failed: {e}", bot.user_id);
  } else {
    debug!("request from {} rejected: {e}", bot.user_id);
  }
  bot.reply_html(format!("❌ {}", escape(&e.user_message()))).await?;
  Ok(())
}

async fn notify_admins(
  app: &AppState,
  text: String,
  request: Option<&crate::entity::payout_request::Model>,
) {
  for &admin in &app.admins {
    let mut message = app
      .bot
      .send_message(ChatId(admin), format!("🔔 New payout request\n\n{text}"))
      .parse_mode(ParseMode::Html);
    if let Some(request) = request {
      message = message.reply_markup(payout_keyboard(request));
    }
    if let Err(e) = message.await {
      warn!("admin {admin} not notified: {e}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_add_user() {
    let (id, name, phone) = parse_add_user("42 Amine Ben Ali +213555").unwrap();
    assert_eq!((id, name.as_str(), phone.as_str()), (42, "Amine Ben Ali", "+213555"));
    assert!(parse_add_user("42 +213555").is_err());
    assert!(parse_add_user("abc Amine +213555").is_err());
    assert!(parse_add_user("").is_err());
  }

  #[test]
  fn test_parse_update_order() {
    assert_eq!(parse_update_order("7 delivered").unwrap(), (7, OrderStatus::Delivered));
    assert!(parse_update_order("7").is_err());
    assert!(parse_update_order("7 shipped").is_err());
    assert!(parse_update_order("x Approved").is_err());
  }

  #[test]
  fn test_parse_amount() {
    assert_eq!(parse_amount("").unwrap(), commission::DEFAULT_PAYOUT);
    assert_eq!(parse_amount(" 2500 ").unwrap(), 2500);
    assert!(parse_amount("-1").is_err());
    assert!(parse_amount("lots").is_err());
  }

  #[test]
  fn test_commands_parse() {
    assert!(matches!(
      UserCommand::parse("/pay_me 3000", "bot"),
      Ok(UserCommand::PayMe(ref a)) if a == "3000"
    ));
    assert!(matches!(UserCommand::parse("/place_order", "bot"), Ok(UserCommand::PlaceOrder)));
    assert!(matches!(
      AdminCommand::parse("/update_order 3 Approved", "bot"),
      Ok(AdminCommand::UpdateOrder(_))
    ));
    assert!(UserCommand::parse("/add_user 1 a b", "bot").is_err());
  }
}
