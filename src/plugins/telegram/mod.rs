mod callback;
mod command;

use std::{collections::HashSet, sync::Arc};

use command::{AdminCommand, UserCommand};
use teloxide::{
  Bot,
  dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{
    BotCommandScope, ButtonRequest, CallbackQuery, ChatId, InlineKeyboardMarkup,
    InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, Message,
    MessageId, ParseMode, ReplyMarkup, Update,
  },
  utils::{command::BotCommands, html},
};

use crate::{
  conversation::{Begin, Input, Placed, Prompt, Registered, Reply},
  prelude::*,
  report::Document,
  state::AppState,
  sv::ReferralOutcome,
};

pub struct Plugin;

#[async_trait::async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    run_bot(app).await;
    Ok(())
  }
}

/// Users see only user commands, admins see both.
async fn setup_commands(bot: &Bot, admins: &HashSet<i64>) {
  if let Err(e) = bot
    .set_my_commands(UserCommand::bot_commands())
    .scope(BotCommandScope::Default)
    .await
  {
    warn!("Failed to set default commands: {}", e);
  }

  let mut admin_commands = UserCommand::bot_commands();
  admin_commands.extend(AdminCommand::bot_commands());

  for &admin_id in admins {
    if let Err(e) = bot
      .set_my_commands(admin_commands.clone())
      .scope(BotCommandScope::Chat { chat_id: ChatId(admin_id).into() })
      .await
    {
      warn!("Failed to set admin commands for {}: {}", admin_id, e);
    }
  }

  info!(
    "Command hints configured: {} user commands, {} admin commands",
    UserCommand::bot_commands().len(),
    AdminCommand::bot_commands().len()
  );
}

pub async fn run_bot(app: Arc<AppState>) {
  info!("Starting Telegram bot...");

  let bot = app.bot.clone();

  setup_commands(&bot, &app.admins).await;

  let handler = teloxide::dptree::entry()
    .branch(Update::filter_message().filter_command::<UserCommand>().endpoint({
      let app = app.clone();
      move |bot: Bot, msg: Message, cmd: UserCommand| {
        let app = app.clone();
        async move {
          let Some(bot) = ReplyBot::from_message(bot, &msg) else {
            return Ok(());
          };
          command::handle_user(app, bot, cmd).await
        }
      }
    }))
    .branch(Update::filter_message().filter_command::<AdminCommand>().endpoint({
      let app = app.clone();
      move |bot: Bot, msg: Message, cmd: AdminCommand| {
        let app = app.clone();
        async move {
          let Some(bot) = ReplyBot::from_message(bot, &msg) else {
            return Ok(());
          };
          command::handle_admin(app, bot, cmd).await
        }
      }
    }))
    .branch(Update::filter_message().endpoint({
      let app = app.clone();
      move |bot: Bot, msg: Message| {
        let app = app.clone();
        message_handle(app, bot, msg)
      }
    }))
    .branch(Update::filter_callback_query().endpoint({
      let app = app.clone();
      move |bot: Bot, query: CallbackQuery| {
        let app = app.clone();
        callback_handle(app, bot, query)
      }
    }));

  Dispatcher::builder(bot, handler)
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

  info!("Telegram bot stopped");
}

/// Plain messages and shared contacts feed the open conversation, if any.
async fn message_handle(
  app: Arc<AppState>,
  bot: Bot,
  msg: Message,
) -> ResponseResult<()> {
  let Some(bot) = ReplyBot::from_message(bot, &msg) else {
    return Ok(());
  };

  let input = if let Some(contact) = msg.contact() {
    Input::Contact { phone: contact.phone_number.clone() }
  } else if let Some(text) = msg.text() {
    if text.starts_with('/') {
      bot.reply_html("❓ Unknown command. Use /help to see what I can do.").await?;
      return Ok(());
    }
    Input::text(text)
  } else {
    return Ok(());
  };

  let _turn = app.turn(bot.user_id).await;
  let sv = app.sv();

  match sv.dialog.handle(bot.user_id, &input).await {
    Ok(reply) => bot.conversation_reply(reply).await,
    Err(e) => {
      error!("conversation step for {} failed: {e}", bot.user_id);
      bot.reply_html(format!("❌ {}", e.user_message())).await?;
      Ok(())
    }
  }
}

async fn callback_handle(
  app: Arc<AppState>,
  bot: Bot,
  query: CallbackQuery,
) -> ResponseResult<()> {
  if let Some(data) = query.data
    && let Some(msg) = query.message.as_ref()
  {
    let bot =
      ReplyBot::new(bot, query.from.id.0 as i64, msg.chat().id, msg.id());

    bot.inner.answer_callback_query(query.id.clone()).await?;

    callback::handle(app, bot, &data).await
  } else {
    Ok(())
  }
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  pub user_id: i64,
  pub chat_id: ChatId,
  pub message_id: MessageId,
}

impl ReplyBot {
  pub fn new(
    inner: Bot,
    user_id: i64,
    chat_id: ChatId,
    message_id: MessageId,
  ) -> Self {
    Self { inner, user_id, chat_id, message_id }
  }

  /// Messages without a sender (channel posts) are ignored.
  fn from_message(inner: Bot, msg: &Message) -> Option<Self> {
    let user = msg.from.as_ref()?;
    Some(Self::new(inner, user.id.0 as i64, msg.chat.id, msg.id))
  }

  async fn reply_html(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .await
  }

  /// Sends a long message as several chunks, returning the last one.
  async fn reply_html_chunked(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Option<Message>> {
    let mut last_msg = None;

    for chunk in utils::chunk_message(&text.into(), 0) {
      last_msg = Some(
        self
          .inner
          .send_message(self.chat_id, chunk)
          .parse_mode(ParseMode::Html)
          .await?,
      );
    }

    Ok(last_msg)
  }

  async fn reply_with_markup(
    &self,
    text: impl Into<String>,
    markup: impl Into<ReplyMarkup>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .reply_markup(markup)
      .await
  }

  pub async fn edit_with_keyboard(
    &self,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
  ) -> ResponseResult<()> {
    self
      .inner
      .edit_message_text(self.chat_id, self.message_id, text.into())
      .parse_mode(ParseMode::Html)
      .reply_markup(keyboard)
      .await?;
    Ok(())
  }

  async fn send_document(&self, document: Document) -> ResponseResult<Message> {
    send_document(&self.inner, self.chat_id, document, None).await
  }

  /// Asks a conversation question; contact steps get a share button.
  async fn ask(&self, text: impl Into<String>, prompt: Prompt) -> ResponseResult<Message> {
    let text = text.into();
    if prompt.contact {
      let keyboard = KeyboardMarkup::new(vec![vec![
        KeyboardButton::new("📱 Share contact").request(ButtonRequest::Contact),
      ]])
      .resize_keyboard()
      .one_time_keyboard();
      self.reply_with_markup(text, keyboard).await
    } else {
      self.reply_with_markup(text, KeyboardRemove::new()).await
    }
  }

  async fn begin_reply(&self, begin: Begin) -> ResponseResult<()> {
    match begin {
      Begin::Asked(prompt) => {
        self.ask(prompt.text, prompt).await?;
      }
      Begin::AlreadyRegistered(agent) => {
        self
          .reply_html(format!(
            "👋 Welcome back, <b>{}</b>!\n\nUse /help to see available commands.",
            html::escape(&agent.full_name)
          ))
          .await?;
      }
      Begin::NotRegistered => {
        self
          .reply_html("⚠️ You are not registered! Please use /start to register first.")
          .await?;
      }
    }
    Ok(())
  }

  async fn conversation_reply(&self, reply: Reply) -> ResponseResult<()> {
    match reply {
      Reply::Idle => {
        self
          .reply_html("Use /help to see available commands.")
          .await?;
      }
      Reply::Ask(prompt) => {
        self.ask(prompt.text, prompt).await?;
      }
      Reply::Retry { reason, prompt } => {
        self.ask(format!("{reason}\n\n{}", prompt.text), prompt).await?;
      }
      Reply::Registered(Registered::Completed { agent, referral }) => {
        let mut text = format!(
          "✅ Registration complete, <b>{}</b>!\n\n\
          🔗 Your referral code: <code>{}</code>\n\
          Share it with new agents to earn {} per registration.",
          html::escape(&agent.full_name),
          agent.tg_user_id,
          utils::format_amount(crate::sv::commission::REFERRAL_REWARD)
        );
        if let Some(ReferralOutcome::Credited { .. }) = referral {
          text.push_str("\n\n🤝 Your inviter has been credited.");
        }
        self.reply_with_markup(text, KeyboardRemove::new()).await?;
      }
      Reply::Registered(Registered::AlreadyRegistered(agent)) => {
        self
          .reply_with_markup(
            format!(
              "ℹ️ You are already registered as <b>{}</b>.",
              html::escape(&agent.full_name)
            ),
            KeyboardRemove::new(),
          )
          .await?;
      }
      Reply::Placed(Placed::Recorded { order, confirmation }) => {
        self
          .reply_html(format!(
            "✅ Order #{} placed successfully! Status: {:?}.",
            order.id, order.status
          ))
          .await?;
        if let Some(out) = confirmation
          && let Err(e) = send_document(
            &self.inner,
            ChatId(out.recipient),
            out.document,
            Some("📄 New Order Received"),
          )
          .await
        {
          warn!("order #{} confirmation not delivered: {e}", order.id);
        }
      }
      Reply::Placed(Placed::NotRegistered) => {
        self
          .reply_html("⚠️ Agent not found. Please register first with /start.")
          .await?;
      }
    }
    Ok(())
  }
}

async fn send_document(
  bot: &Bot,
  chat_id: ChatId,
  document: Document,
  caption: Option<&str>,
) -> ResponseResult<Message> {
  let file = InputFile::memory(document.bytes).file_name(document.file_name);
  let request = bot.send_document(chat_id, file);
  match caption {
    Some(caption) => request.caption(caption).await,
    None => request.await,
  }
}
