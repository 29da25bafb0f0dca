#![deny(warnings)]

//! Greedy autoplay policy for headless runs.

use idle_core::{Business, Session};
use rust_decimal::Decimal;
use tracing::trace;

/// One player action against a named business.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Collect(String),
    HireManager(String),
    Unlock(String),
    Upgrade(String),
}

impl Action {
    /// Name of the business the action targets.
    pub fn business(&self) -> &str {
        match self {
            Action::Collect(n)
            | Action::HireManager(n)
            | Action::Unlock(n)
            | Action::Upgrade(n) => n,
        }
    }
}

/// Income gained per unit of capital spent. Free purchases rank highest.
pub fn utility(income_gain_per_sec: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::MAX;
    }
    income_gain_per_sec / price
}

fn level_gain_per_sec(b: &Business) -> Decimal {
    if b.cooldown <= Decimal::ZERO {
        return b.base_rewards;
    }
    b.base_rewards / b.cooldown
}

/// Pick the next action, or `None` when nothing useful is affordable.
///
/// Order: collect idle manual businesses, hire the cheapest affordable
/// manager, unlock the cheapest affordable business, then buy the upgrade
/// with the best [`utility`].
pub fn next_action(session: &Session) -> Option<Action> {
    let capital = session.capital();
    let unlocked = || session.businesses.iter().filter(|b| b.is_unlocked());

    if let Some(b) = unlocked().find(|b| !b.is_managed && !b.is_cooling_down) {
        return Some(Action::Collect(b.name.clone()));
    }
    if let Some(b) = unlocked()
        .filter(|b| !b.is_managed && b.manager_cost <= capital)
        .min_by_key(|b| b.manager_cost)
    {
        return Some(Action::HireManager(b.name.clone()));
    }
    if let Some(b) = session
        .businesses
        .iter()
        .filter(|b| !b.is_unlocked() && b.unlocking_price <= capital)
        .min_by_key(|b| b.unlocking_price)
    {
        return Some(Action::Unlock(b.name.clone()));
    }
    let best = unlocked()
        .filter(|b| b.upgrading_price <= capital)
        .max_by_key(|b| utility(level_gain_per_sec(b), b.upgrading_price))?;
    trace!(business = %best.name, price = %best.upgrading_price, "upgrade chosen");
    Some(Action::Upgrade(best.name.clone()))
}
