use sea_orm::DbErr;

use crate::entity::{OrderStatus, PayoutStatus};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("database error: {0}")]
  Db(#[from] DbErr),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("json error: {0}")]
  Json(#[from] json::Error),
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("backup failed: {0}")]
  Backup(String),
  #[error("{0}")]
  InvalidArgs(String),
  #[error("agent not found")]
  AgentNotFound,
  #[error("order not found")]
  OrderNotFound,
  #[error("payout request not found")]
  PayoutNotFound,
  #[error("order cannot move from {from:?} to {to:?}")]
  OrderTransition { from: OrderStatus, to: OrderStatus },
  #[error("payout request is already {0:?}")]
  PayoutTransition(PayoutStatus),
  #[error("not authorized")]
  Unauthorized,
}

impl Error {
  /// Text shown to the chat user. Infrastructure failures collapse into a
  /// generic retry message.
  pub fn user_message(&self) -> String {
    match self {
      Error::Db(_) | Error::Io(_) | Error::Json(_) => {
        "Something went wrong on our side. Please try again later.".into()
      }
      Error::Http(_) | Error::Backup(_) => {
        "Backup storage is unreachable right now. Please try again later."
          .into()
      }
      Error::InvalidArgs(msg) => msg.clone(),
      Error::AgentNotFound => "Agent not found.".into(),
      Error::OrderNotFound => "Order not found.".into(),
      Error::PayoutNotFound => "Payout request not found.".into(),
      Error::OrderTransition { from, to } => {
        format!("Order status cannot change from {from:?} to {to:?}.")
      }
      Error::PayoutTransition(status) => {
        format!("Payout request is already {status:?}.")
      }
      Error::Unauthorized => "⛔ You are not authorized to use this command.".into(),
    }
  }

  /// Failures of the local store or its I/O, as opposed to rejected input.
  pub fn is_storage(&self) -> bool {
    matches!(self, Error::Db(_) | Error::Io(_) | Error::Json(_))
  }
}
