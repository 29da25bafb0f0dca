#![deny(warnings)]

//! Progression rules: pricing formulas and the pure transitions that move a
//! business through unlock, upgrade, collection and automation.
//!
//! Every transition validates its preconditions first and mutates nothing
//! when it returns an error. Callers decide whether an error is surfaced or
//! treated as an inert no-op.

use idle_core::{Business, EngineConfig, Ledger, TransitionError};
use rust_decimal::Decimal;
use tracing::trace;

/// Rewards credited per collection at `level`.
///
/// Example:
/// assert_eq!(rewards_at(3, Decimal::new(2, 0)), Decimal::new(6, 0));
pub fn rewards_at(level: u32, base_rewards: Decimal) -> Decimal {
    Decimal::from(level) * base_rewards
}

/// Price of the next upgrade at `level`: `base * (1 + growth * (level - 1))`.
///
/// Zero while locked; the price is meaningless before level 1.
///
/// Example:
/// let p = upgrading_price_at(2, Decimal::new(4, 0), Decimal::new(15, 2));
/// assert_eq!(p, Decimal::new(46, 1));
pub fn upgrading_price_at(level: u32, base_price: Decimal, growth: Decimal) -> Decimal {
    if level == 0 {
        return Decimal::ZERO;
    }
    base_price * (Decimal::ONE + growth * Decimal::from(level - 1))
}

/// Recompute derived fields from level and catalog constants.
///
/// Persisted `rewards`/`upgrading_price` are never trusted. Cooldown state is
/// reset as well: no sub-tick survives a reload.
pub fn normalize(b: &mut Business, cfg: &EngineConfig) {
    b.rewards = rewards_at(b.current_level, b.base_rewards);
    b.upgrading_price =
        upgrading_price_at(b.current_level, b.base_upgrading_price, cfg.upgrade_growth);
    b.is_cooling_down = false;
    b.cooldown_progress = 0;
}

/// Collection state of one business.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownPhase {
    Idle,
    CoolingDown { progress_ms: u64 },
}

pub fn phase(b: &Business) -> CooldownPhase {
    if b.is_cooling_down {
        CooldownPhase::CoolingDown {
            progress_ms: b.cooldown_progress,
        }
    } else {
        CooldownPhase::Idle
    }
}

/// Result of advancing a cooldown by one sub-tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Still counting down.
    Advanced { progress_ms: u64 },
    /// Cooldown reached its end; `credited` was added to the ledger.
    Completed { credited: Decimal },
}

fn invalid(b: &Business, reason: &'static str) -> TransitionError {
    TransitionError::InvalidStateTransition {
        business: b.name.clone(),
        reason,
    }
}

/// Unlock a locked business, debiting its unlocking price.
pub fn unlock(b: &mut Business, ledger: &mut Ledger) -> Result<Decimal, TransitionError> {
    if b.is_unlocked() {
        return Err(invalid(b, "already unlocked"));
    }
    let capital = ledger.debit(b.unlocking_price)?;
    b.current_level = 1;
    b.rewards = b.base_rewards;
    b.upgrading_price = b.base_upgrading_price;
    trace!(business = %b.name, %capital, "unlocked");
    Ok(capital)
}

/// Raise the level by one, debiting the current upgrade price.
pub fn upgrade(
    b: &mut Business,
    ledger: &mut Ledger,
    cfg: &EngineConfig,
) -> Result<Decimal, TransitionError> {
    if !b.is_unlocked() {
        return Err(invalid(b, "locked business cannot be upgraded"));
    }
    let capital = ledger.debit(b.upgrading_price)?;
    b.current_level += 1;
    b.rewards = rewards_at(b.current_level, b.base_rewards);
    b.upgrading_price =
        upgrading_price_at(b.current_level, b.base_upgrading_price, cfg.upgrade_growth);
    trace!(business = %b.name, level = b.current_level, %capital, "upgraded");
    Ok(capital)
}

/// Start a collection cycle. Rejected while locked or already cooling down.
pub fn begin_collect(b: &mut Business) -> Result<(), TransitionError> {
    if !b.is_unlocked() {
        return Err(invalid(b, "locked business has nothing to collect"));
    }
    if b.is_cooling_down {
        return Err(invalid(b, "already cooling down"));
    }
    b.is_cooling_down = true;
    b.cooldown_progress = 0;
    Ok(())
}

/// Advance a running cooldown by `quantum_ms`.
///
/// On reaching the cooldown length the rewards current at this moment are
/// credited and the business returns to idle.
pub fn tick_cooldown(
    b: &mut Business,
    ledger: &mut Ledger,
    quantum_ms: u64,
) -> Result<TickOutcome, TransitionError> {
    if !b.is_cooling_down {
        return Err(invalid(b, "not cooling down"));
    }
    let total = b.cooldown_ms();
    let progress = b.cooldown_progress.saturating_add(quantum_ms).min(total);
    if progress < total {
        b.cooldown_progress = progress;
        return Ok(TickOutcome::Advanced {
            progress_ms: progress,
        });
    }
    let credited = b.rewards;
    ledger.credit(credited)?;
    b.is_cooling_down = false;
    b.cooldown_progress = 0;
    Ok(TickOutcome::Completed { credited })
}

/// Hire a manager, debiting its cost.
///
/// Only flips the flag; starting the first collection and arming the
/// recurring cycle belong to the scheduler.
pub fn hire_manager(b: &mut Business, ledger: &mut Ledger) -> Result<Decimal, TransitionError> {
    if b.is_managed {
        return Err(invalid(b, "manager already hired"));
    }
    if !b.is_unlocked() {
        return Err(invalid(b, "locked business cannot be managed"));
    }
    let capital = ledger.debit(b.manager_cost)?;
    b.is_managed = true;
    Ok(capital)
}

/// Rewards per second at the current level; zero for instant or locked businesses.
pub fn income_rate(b: &Business) -> Decimal {
    if !b.is_unlocked() || b.cooldown <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    b.rewards / b.cooldown
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lemonade() -> Business {
        Business::new(
            "Lemonade Stand",
            Decimal::ONE,
            Decimal::new(4, 0),
            Decimal::new(4, 0),
            Decimal::ONE,
            Decimal::new(500, 0),
        )
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn lemonade_scenario() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(1000, 0));
        unlock(&mut b, &mut l).unwrap();
        assert_eq!(l.capital(), Decimal::new(996, 0));
        assert_eq!(b.current_level, 1);
        assert_eq!(b.rewards, Decimal::ONE);
        assert_eq!(b.upgrading_price, Decimal::new(4, 0));

        upgrade(&mut b, &mut l, &cfg()).unwrap();
        assert_eq!(l.capital(), Decimal::new(992, 0));
        assert_eq!(b.current_level, 2);
        assert_eq!(b.rewards, Decimal::new(2, 0));
        assert_eq!(b.upgrading_price, Decimal::new(46, 1));

        begin_collect(&mut b).unwrap();
        let mut outcome = TickOutcome::Advanced { progress_ms: 0 };
        for _ in 0..100 {
            outcome = tick_cooldown(&mut b, &mut l, 10).unwrap();
        }
        assert_eq!(
            outcome,
            TickOutcome::Completed {
                credited: Decimal::new(2, 0)
            }
        );
        assert_eq!(l.capital(), Decimal::new(994, 0));
        assert!(!b.is_cooling_down);
        assert_eq!(b.cooldown_progress, 0);
    }

    #[test]
    fn unlock_without_funds_is_rejected_untouched() {
        let mut b = lemonade();
        b.unlocking_price = Decimal::new(500, 0);
        let mut l = Ledger::new(Decimal::new(100, 0));
        let before = b.clone();
        assert!(matches!(
            unlock(&mut b, &mut l),
            Err(TransitionError::InsufficientFunds { .. })
        ));
        assert_eq!(b, before);
        assert_eq!(l.capital(), Decimal::new(100, 0));
    }

    #[test]
    fn unlock_twice_changes_nothing() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(1000, 0));
        unlock(&mut b, &mut l).unwrap();
        let (snap_b, snap_l) = (b.clone(), l.clone());
        assert!(unlock(&mut b, &mut l).is_err());
        assert_eq!(b, snap_b);
        assert_eq!(l, snap_l);
    }

    #[test]
    fn locked_business_cannot_upgrade_collect_or_hire() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(1000, 0));
        assert!(upgrade(&mut b, &mut l, &cfg()).is_err());
        assert!(begin_collect(&mut b).is_err());
        assert!(hire_manager(&mut b, &mut l).is_err());
        assert_eq!(l.capital(), Decimal::new(1000, 0));
    }

    #[test]
    fn collect_reentry_rejected_while_cooling() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(10, 0));
        unlock(&mut b, &mut l).unwrap();
        begin_collect(&mut b).unwrap();
        tick_cooldown(&mut b, &mut l, 10).unwrap();
        assert!(begin_collect(&mut b).is_err());
        assert_eq!(b.cooldown_progress, 10);
    }

    #[test]
    fn completion_reads_rewards_at_completion_time() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(100, 0));
        unlock(&mut b, &mut l).unwrap();
        begin_collect(&mut b).unwrap();
        tick_cooldown(&mut b, &mut l, 500).unwrap();
        upgrade(&mut b, &mut l, &cfg()).unwrap();
        let before = l.capital();
        let out = tick_cooldown(&mut b, &mut l, 500).unwrap();
        assert_eq!(
            out,
            TickOutcome::Completed {
                credited: Decimal::new(2, 0)
            }
        );
        assert_eq!(l.capital(), before + Decimal::new(2, 0));
    }

    #[test]
    fn zero_cooldown_completes_on_first_tick() {
        let mut b = lemonade();
        b.cooldown = Decimal::ZERO;
        let mut l = Ledger::new(Decimal::new(4, 0));
        unlock(&mut b, &mut l).unwrap();
        begin_collect(&mut b).unwrap();
        assert!(matches!(
            tick_cooldown(&mut b, &mut l, 10).unwrap(),
            TickOutcome::Completed { .. }
        ));
        assert_eq!(l.capital(), Decimal::ONE);
    }

    #[test]
    fn completion_past_capital_range_keeps_cycle_pending() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(4, 0));
        unlock(&mut b, &mut l).unwrap();
        begin_collect(&mut b).unwrap();
        tick_cooldown(&mut b, &mut l, 990).unwrap();
        let mut full = Ledger::new(Decimal::MAX);
        assert_eq!(
            tick_cooldown(&mut b, &mut full, 10),
            Err(TransitionError::Overflow)
        );
        assert_eq!(full.capital(), Decimal::MAX);
        assert_eq!(
            phase(&b),
            CooldownPhase::CoolingDown { progress_ms: 990 }
        );
    }

    #[test]
    fn tick_on_idle_business_is_rejected() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(4, 0));
        unlock(&mut b, &mut l).unwrap();
        assert!(tick_cooldown(&mut b, &mut l, 10).is_err());
        assert_eq!(phase(&b), CooldownPhase::Idle);
    }

    #[test]
    fn hire_manager_once() {
        let mut b = lemonade();
        let mut l = Ledger::new(Decimal::new(1004, 0));
        unlock(&mut b, &mut l).unwrap();
        hire_manager(&mut b, &mut l).unwrap();
        assert!(b.is_managed);
        assert_eq!(l.capital(), Decimal::new(500, 0));
        assert!(hire_manager(&mut b, &mut l).is_err());
        assert_eq!(l.capital(), Decimal::new(500, 0));
    }

    #[test]
    fn normalize_overrides_stale_derived_fields() {
        let mut b = lemonade();
        b.current_level = 3;
        b.rewards = Decimal::new(999, 0);
        b.is_cooling_down = true;
        b.cooldown_progress = 400;
        normalize(&mut b, &cfg());
        assert_eq!(b.rewards, Decimal::new(3, 0));
        assert_eq!(b.upgrading_price, Decimal::new(52, 1));
        assert_eq!(phase(&b), CooldownPhase::Idle);

        let mut locked = lemonade();
        locked.rewards = Decimal::new(7, 0);
        normalize(&mut locked, &cfg());
        assert_eq!(locked.rewards, Decimal::ZERO);
    }

    #[test]
    fn income_rate_per_second() {
        let mut b = lemonade();
        b.current_level = 4;
        b.cooldown = Decimal::new(2, 0);
        normalize(&mut b, &cfg());
        assert_eq!(income_rate(&b), Decimal::new(2, 0));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Unlock,
        Upgrade,
        Collect,
        Tick(u64),
        Hire,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Unlock),
            Just(Op::Upgrade),
            Just(Op::Collect),
            (1u64..700).prop_map(Op::Tick),
            Just(Op::Hire),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_sequence(
            start in 0i64..5_000,
            ops in prop::collection::vec(op(), 0..60),
        ) {
            let cfg = cfg();
            let mut b = lemonade();
            let mut l = Ledger::new(Decimal::new(start, 0));
            for op in ops {
                let _ = match op {
                    Op::Unlock => unlock(&mut b, &mut l).map(|_| ()),
                    Op::Upgrade => upgrade(&mut b, &mut l, &cfg).map(|_| ()),
                    Op::Collect => begin_collect(&mut b),
                    Op::Tick(ms) => tick_cooldown(&mut b, &mut l, ms).map(|_| ()),
                    Op::Hire => hire_manager(&mut b, &mut l).map(|_| ()),
                };
                prop_assert!(l.capital() >= Decimal::ZERO);
                prop_assert_eq!(b.rewards, rewards_at(b.current_level, b.base_rewards));
                if b.is_unlocked() {
                    prop_assert_eq!(
                        b.upgrading_price,
                        upgrading_price_at(
                            b.current_level,
                            b.base_upgrading_price,
                            cfg.upgrade_growth
                        )
                    );
                }
                prop_assert!(b.cooldown_progress <= b.cooldown_ms());
            }
        }

        #[test]
        fn upgrade_price_monotonic(level in 1u32..10_000, cents in 1i64..1_000_000) {
            let base = Decimal::new(cents, 2);
            let growth = Decimal::new(15, 2);
            let next = upgrading_price_at(level + 1, base, growth);
            prop_assert!(next > upgrading_price_at(level, base, growth));
        }
    }
}
