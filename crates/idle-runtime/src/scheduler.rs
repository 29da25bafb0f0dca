//! Timer bookkeeping: one cooldown ticker per collecting business and one
//! automation trigger per managed business.
//!
//! Timers never touch game state. They only send [`EngineEvent`]s; the engine
//! applies them in order.

use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, trace};

/// Messages emitted by timers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// One cooldown quantum elapsed for `cycle` of `business`.
    CooldownTick { business: String, cycle: u64 },
    /// The automation period elapsed; time to start another collection.
    CycleDue { business: String },
}

struct Cooldown {
    cycle: u64,
    task: JoinHandle<()>,
}

/// Owns every running timer, keyed by business name.
pub struct Scheduler {
    tx: UnboundedSender<EngineEvent>,
    tick_ms: u64,
    next_cycle: u64,
    cooldowns: HashMap<String, Cooldown>,
    automations: HashMap<String, JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(tx: UnboundedSender<EngineEvent>, tick_ms: u64) -> Self {
        Self {
            tx,
            tick_ms: tick_ms.max(1),
            next_cycle: 0,
            cooldowns: HashMap::new(),
            automations: HashMap::new(),
        }
    }

    /// Sub-tick period in milliseconds, never zero.
    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Spawn the sub-tick for a new cooldown and return its cycle id.
    ///
    /// Any ticker left for the same business is cancelled first, so ticks of
    /// an older cycle can be told apart and dropped.
    pub fn start_cooldown(&mut self, business: &str) -> u64 {
        self.finish_cooldown(business);
        self.next_cycle += 1;
        let cycle = self.next_cycle;
        let tx = self.tx.clone();
        let tick = Duration::from_millis(self.tick_ms);
        let name = business.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick, tick);
            loop {
                ticker.tick().await;
                let event = EngineEvent::CooldownTick {
                    business: name.clone(),
                    cycle,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        self.cooldowns
            .insert(business.to_string(), Cooldown { cycle, task });
        trace!(business, cycle, "cooldown ticker started");
        cycle
    }

    /// Whether `cycle` is the live cooldown of `business`.
    pub fn is_current_cooldown(&self, business: &str, cycle: u64) -> bool {
        self.cooldowns
            .get(business)
            .map(|c| c.cycle == cycle)
            .unwrap_or(false)
    }

    /// Cancel the cooldown ticker of `business`. Returns false if none was running.
    pub fn finish_cooldown(&mut self, business: &str) -> bool {
        match self.cooldowns.remove(business) {
            Some(cooldown) => {
                cooldown.task.abort();
                true
            }
            None => false,
        }
    }

    /// Arm the recurring automation trigger for `business`.
    ///
    /// The first trigger fires one period from now. Returns false, and
    /// changes nothing, when the business is already armed.
    pub fn arm_automation(&mut self, business: &str, period_ms: u64) -> bool {
        if self.automations.contains_key(business) {
            return false;
        }
        let period = Duration::from_millis(period_ms.max(1));
        let tx = self.tx.clone();
        let name = business.to_string();
        let task = tokio::spawn(async move {
            let mut trigger = interval_at(Instant::now() + period, period);
            loop {
                trigger.tick().await;
                let event = EngineEvent::CycleDue {
                    business: name.clone(),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        self.automations.insert(business.to_string(), task);
        debug!(business, period_ms, "automation armed");
        true
    }

    pub fn is_automated(&self, business: &str) -> bool {
        self.automations.contains_key(business)
    }

    pub fn active_automations(&self) -> usize {
        self.automations.len()
    }

    pub fn active_cooldowns(&self) -> usize {
        self.cooldowns.len()
    }

    /// Cancel every timer.
    pub fn shutdown(&mut self) {
        for (_, cooldown) in self.cooldowns.drain() {
            cooldown.task.abort();
        }
        for (_, task) in self.automations.drain() {
            task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
