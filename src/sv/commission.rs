//! Money rules. Amounts are whole dinars.

/// Credited to the referrer once per referred agent.
pub const REFERRAL_REWARD: i64 = 50;

/// Balance an agent must hold before any payout request is accepted.
pub const PAYOUT_MINIMUM: i64 = 2000;

/// Amount requested when the agent does not name one.
pub const DEFAULT_PAYOUT: i64 = PAYOUT_MINIMUM;

/// Whether a payout of `amount` may be requested against `balance`.
pub fn payout_allowed(balance: i64, amount: i64) -> bool {
  balance >= PAYOUT_MINIMUM && amount <= balance
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_payout_gate() {
    assert!(!payout_allowed(50, 2000));
    assert!(!payout_allowed(1999, 1000));
    assert!(payout_allowed(2000, 2000));
    assert!(!payout_allowed(2500, 2501));
    assert!(payout_allowed(2500, 100));
  }
}
