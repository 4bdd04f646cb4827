//! Local view of the user's credit balance.
//!
//! Two balances are tracked: the last value the server confirmed and an
//! optimistic balance that is adjusted locally right after each run so the
//! next action does not wait for a round trip. A refresh always wins and
//! overwrites both.

use crate::service::EmulatorService;
use crate::Result;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreditLedger {
    optimistic_balance: i64,
    last_confirmed_balance: Option<i64>,
    stale: bool,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with a known balance (e.g. from a user listing).
    pub fn with_balance(balance: i64) -> Self {
        Self {
            optimistic_balance: balance,
            last_confirmed_balance: Some(balance),
            stale: false,
        }
    }

    /// Balance as currently known locally, including optimistic charges.
    pub fn balance(&self) -> i64 {
        self.optimistic_balance
    }

    pub fn optimistic_balance(&self) -> i64 {
        self.optimistic_balance
    }

    pub fn last_confirmed_balance(&self) -> Option<i64> {
        self.last_confirmed_balance
    }

    /// True when local adjustments were applied since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// `balance += delta`. Never rejected; the balance may go negative until
    /// the next refresh corrects it.
    pub fn apply_optimistic(&mut self, delta: i64) {
        self.optimistic_balance = self.optimistic_balance.saturating_add(delta);
        self.stale = true;
        debug!(
            delta,
            balance = self.optimistic_balance,
            "Applied optimistic credit adjustment"
        );
    }

    /// Charge `amount` credits locally.
    pub fn charge(&mut self, amount: u64) {
        let delta = i64::try_from(amount).unwrap_or(i64::MAX);
        self.apply_optimistic(-delta);
    }

    /// Replace both balances with an authoritative value.
    pub fn confirm(&mut self, balance: i64) {
        if self.stale && balance != self.optimistic_balance {
            info!(
                optimistic = self.optimistic_balance,
                confirmed = balance,
                "Server balance differs from optimistic estimate"
            );
        }
        self.optimistic_balance = balance;
        self.last_confirmed_balance = Some(balance);
        self.stale = false;
    }

    /// Authoritative read; replaces the balance unconditionally.
    pub async fn refresh(&mut self, service: &dyn EmulatorService) -> Result<i64> {
        let balance = service.user_credits().await?;
        self.confirm(balance);
        Ok(balance)
    }
}
