pub mod admin;
pub mod agent;
pub mod commission;
pub mod order;
pub mod payout;
pub mod referral;
#[cfg(test)]
pub mod test_utils;

pub use admin::{Admin, Authorized};
pub use agent::{Agent, Registration, Removal};
pub use order::{NewOrder, Order, OrderOutcome};
pub use payout::{Payout, PayoutOutcome};
pub use referral::{Referral, ReferralOutcome, ReferralStats};
