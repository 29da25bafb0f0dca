#![deny(warnings)]

//! Core domain models and invariants for the idle tycoon engine.
//!
//! This crate defines the serializable business record, the capital ledger,
//! engine configuration and the validation helpers that guard catalog data
//! before any progression happens.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Stable opaque player identifier, generated once per installation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Generate a fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single business: catalog constants plus progression state.
///
/// Field names follow the persistence collaborator's snake_case layout.
/// Money is carried as [`Decimal`] and travels as plain JSON numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Business {
    /// Unique name within a session.
    pub name: String,
    /// 0 means locked.
    #[serde(default)]
    pub current_level: u32,
    /// Rewards per level per collection.
    #[serde(with = "rust_decimal::serde::float")]
    pub base_rewards: Decimal,
    /// Price of the first upgrade (level 1 → 2).
    #[serde(with = "rust_decimal::serde::float")]
    pub base_upgrading_price: Decimal,
    /// One-off price to reach level 1.
    #[serde(with = "rust_decimal::serde::float")]
    pub unlocking_price: Decimal,
    /// Cooldown of one collection cycle, in seconds.
    #[serde(with = "rust_decimal::serde::float")]
    pub cooldown: Decimal,
    /// One-off price to automate collection.
    #[serde(with = "rust_decimal::serde::float")]
    pub manager_cost: Decimal,
    /// Derived: `current_level * base_rewards`. Never authoritative when loaded.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub rewards: Decimal,
    /// Derived: upgrade price at the current level. Never authoritative when loaded.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub upgrading_price: Decimal,
    #[serde(default)]
    pub is_managed: bool,
    #[serde(default)]
    pub is_cooling_down: bool,
    /// Elapsed cooldown in milliseconds.
    #[serde(default)]
    pub cooldown_progress: u64,
}

impl Business {
    /// Build a locked business from catalog constants.
    pub fn new(
        name: impl Into<String>,
        base_rewards: Decimal,
        base_upgrading_price: Decimal,
        unlocking_price: Decimal,
        cooldown: Decimal,
        manager_cost: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            current_level: 0,
            base_rewards,
            base_upgrading_price,
            unlocking_price,
            cooldown,
            manager_cost,
            rewards: Decimal::ZERO,
            upgrading_price: Decimal::ZERO,
            is_managed: false,
            is_cooling_down: false,
            cooldown_progress: 0,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.current_level >= 1
    }

    /// Cooldown length in whole milliseconds.
    pub fn cooldown_ms(&self) -> u64 {
        (self.cooldown * Decimal::ONE_THOUSAND)
            .trunc()
            .to_u64()
            .unwrap_or(0)
    }

    /// Period of the automation trigger: cooldown plus a fixed buffer.
    pub fn cycle_period_ms(&self, buffer_ms: u64) -> u64 {
        self.cooldown_ms().saturating_add(buffer_ms)
    }

    /// Fraction of the current cooldown elapsed, in [0, 1]. Zero while idle.
    pub fn cooldown_fraction(&self) -> f64 {
        let total = self.cooldown_ms();
        if !self.is_cooling_down || total == 0 {
            return 0.0;
        }
        (self.cooldown_progress.min(total) as f64) / (total as f64)
    }
}

/// The single shared capital balance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ledger {
    capital: Decimal,
}

impl Ledger {
    pub fn new(capital: Decimal) -> Self {
        Self { capital }
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.capital >= amount
    }

    /// Subtract `amount` if the balance covers it. The balance is untouched on error.
    pub fn debit(&mut self, amount: Decimal) -> Result<Decimal, TransitionError> {
        if amount < Decimal::ZERO {
            return Err(TransitionError::NegativeAmount(amount));
        }
        if !self.can_afford(amount) {
            return Err(TransitionError::InsufficientFunds {
                required: amount,
                available: self.capital,
            });
        }
        self.capital -= amount;
        Ok(self.capital)
    }

    /// Add `amount`. Negative amounts and results past the [`Decimal`] range are
    /// rejected with the balance untouched.
    pub fn credit(&mut self, amount: Decimal) -> Result<Decimal, TransitionError> {
        if amount < Decimal::ZERO {
            return Err(TransitionError::NegativeAmount(amount));
        }
        self.capital = self
            .capital
            .checked_add(amount)
            .ok_or(TransitionError::Overflow)?;
        Ok(self.capital)
    }
}

/// Tunables for progression and timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cooldown sub-tick period and progress quantum, in milliseconds.
    pub tick_ms: u64,
    /// Slack added to the cooldown to form the automation period.
    pub cycle_buffer_ms: u64,
    /// Per-level growth of the upgrade price.
    #[serde(with = "rust_decimal::serde::float")]
    pub upgrade_growth: Decimal,
    /// Capital granted to a brand new player.
    #[serde(with = "rust_decimal::serde::float")]
    pub starting_capital: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            cycle_buffer_ms: 100,
            upgrade_growth: Decimal::new(15, 2),
            starting_capital: Decimal::new(1000, 0),
        }
    }
}

/// Player state for one session: identity, ledger and ordered businesses.
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: UserId,
    pub ledger: Ledger,
    pub businesses: Vec<Business>,
}

impl Session {
    pub fn new(user_id: UserId, capital: Decimal, businesses: Vec<Business>) -> Self {
        Self {
            user_id,
            ledger: Ledger::new(capital),
            businesses,
        }
    }

    pub fn capital(&self) -> Decimal {
        self.ledger.capital()
    }

    pub fn business(&self, name: &str) -> Option<&Business> {
        self.businesses.iter().find(|b| b.name == name)
    }

    /// Split borrow of one business and the ledger, for transitions that touch both.
    pub fn business_and_ledger(&mut self, name: &str) -> Option<(&mut Business, &mut Ledger)> {
        let Session {
            ledger, businesses, ..
        } = self;
        businesses
            .iter_mut()
            .find(|b| b.name == name)
            .map(|b| (b, ledger))
    }
}

/// Rejected progression actions. Callers at the session layer treat these as no-ops.
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("invalid transition for {business}: {reason}")]
    InvalidStateTransition {
        business: String,
        reason: &'static str,
    },
    #[error("unknown business: {0}")]
    UnknownBusiness(String),
    #[error("negative amount {0} is invalid")]
    NegativeAmount(Decimal),
    #[error("capital overflow")]
    Overflow,
}

/// Validation errors for catalog and persisted data.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("business name must not be empty")]
    EmptyName,
    #[error("business {0}: negative monetary value is invalid")]
    NegativeMoney(String),
    #[error("business {0}: cooldown must be >= 0")]
    NegativeCooldown(String),
    #[error("duplicate business name: {0}")]
    DuplicateName(String),
    #[error("negative capital is invalid")]
    NegativeCapital,
    #[error("tick_ms must be at least 1")]
    ZeroTick,
}

/// Validate one business record.
pub fn validate_business(b: &Business) -> Result<(), ValidationError> {
    if b.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let money = [
        b.base_rewards,
        b.base_upgrading_price,
        b.unlocking_price,
        b.manager_cost,
    ];
    if money.iter().any(|m| *m < Decimal::ZERO) {
        return Err(ValidationError::NegativeMoney(b.name.clone()));
    }
    if b.cooldown < Decimal::ZERO {
        return Err(ValidationError::NegativeCooldown(b.name.clone()));
    }
    Ok(())
}

/// Validate a list of businesses, including name uniqueness.
pub fn validate_catalog(businesses: &[Business]) -> Result<(), ValidationError> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for b in businesses {
        validate_business(b)?;
        if !names.insert(b.name.as_str()) {
            return Err(ValidationError::DuplicateName(b.name.clone()));
        }
    }
    Ok(())
}

/// Validate engine tunables. A zero tick would never advance a cooldown.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ValidationError> {
    if cfg.tick_ms == 0 {
        return Err(ValidationError::ZeroTick);
    }
    Ok(())
}

/// Validate a whole session.
pub fn validate_session(session: &Session) -> Result<(), ValidationError> {
    if session.capital() < Decimal::ZERO {
        return Err(ValidationError::NegativeCapital);
    }
    validate_catalog(&session.businesses)
}
