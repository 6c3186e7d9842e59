pub mod agent;
pub mod conversation;
pub mod order;
pub mod payout_request;
pub mod referral;

pub use conversation::ConversationKind;
pub use order::OrderStatus;
pub use payout_request::PayoutStatus;
