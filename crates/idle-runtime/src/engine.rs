//! The session engine: owns the player state, applies user actions through
//! the progression rules and consumes timer events.
//!
//! User actions are permissive: a rejected action returns `false` and leaves
//! state untouched, it never raises an error.

use crate::scheduler::{EngineEvent, Scheduler};
use idle_core::{Business, EngineConfig, Session, TransitionError};
use idle_econ::TickOutcome;
use persistence::SaveRequest;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace};

const CHANGE_CAPACITY: usize = 256;

/// State change notification for renderers.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Capital(Decimal),
    Business(String),
}

pub struct Engine {
    session: Session,
    config: EngineConfig,
    scheduler: Scheduler,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    changes: broadcast::Sender<Change>,
    automation_resumed: bool,
}

impl Engine {
    /// Wrap a loaded session. Derived fields of every business are recomputed.
    ///
    /// Timers are spawned on the current tokio runtime, so actions that start
    /// a collection must run inside one.
    pub fn new(mut session: Session, config: EngineConfig) -> Self {
        for b in &mut session.businesses {
            idle_econ::normalize(b, &config);
        }
        let (tx, events) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            scheduler: Scheduler::new(tx, config.tick_ms),
            session,
            config,
            events,
            changes,
            automation_resumed: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capital(&self) -> Decimal {
        self.session.capital()
    }

    pub fn business(&self, name: &str) -> Option<&Business> {
        self.session.business(name)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    fn notify(&self, change: Change) {
        // no subscribers is fine
        let _ = self.changes.send(change);
    }

    fn notify_both(&self, business: &str) {
        self.notify(Change::Capital(self.capital()));
        self.notify(Change::Business(business.to_string()));
    }

    fn ignored(action: &'static str, business: &str, err: TransitionError) -> bool {
        debug!(action, business, %err, "action ignored");
        false
    }

    fn with_business<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Business, &mut idle_core::Ledger) -> Result<T, TransitionError>,
    ) -> Result<T, TransitionError> {
        let (b, ledger) = self
            .session
            .business_and_ledger(name)
            .ok_or_else(|| TransitionError::UnknownBusiness(name.to_string()))?;
        f(b, ledger)
    }

    pub fn unlock(&mut self, name: &str) -> bool {
        match self.with_business(name, idle_econ::unlock) {
            Ok(_) => {
                self.notify_both(name);
                true
            }
            Err(e) => Self::ignored("unlock", name, e),
        }
    }

    pub fn upgrade(&mut self, name: &str) -> bool {
        let cfg = self.config.clone();
        match self.with_business(name, |b, l| idle_econ::upgrade(b, l, &cfg)) {
            Ok(_) => {
                self.notify_both(name);
                true
            }
            Err(e) => Self::ignored("upgrade", name, e),
        }
    }

    /// Manual collection. Managed businesses collect on their own.
    pub fn collect(&mut self, name: &str) -> bool {
        if self.business(name).map(|b| b.is_managed).unwrap_or(false) {
            let err = TransitionError::InvalidStateTransition {
                business: name.to_string(),
                reason: "manager owns collection",
            };
            return Self::ignored("collect", name, err);
        }
        match self.start_collect(name) {
            Ok(()) => true,
            Err(e) => Self::ignored("collect", name, e),
        }
    }

    pub fn hire_manager(&mut self, name: &str) -> bool {
        match self.with_business(name, idle_econ::hire_manager) {
            Ok(_) => {
                self.register_automation(name);
                self.notify_both(name);
                true
            }
            Err(e) => Self::ignored("hire_manager", name, e),
        }
    }

    /// Re-arm automation for every managed business. Runs once per session;
    /// later calls return 0.
    pub fn resume_automation(&mut self) -> usize {
        if self.automation_resumed {
            return 0;
        }
        self.automation_resumed = true;
        let managed: Vec<String> = self
            .session
            .businesses
            .iter()
            .filter(|b| b.is_managed && b.is_unlocked())
            .map(|b| b.name.clone())
            .collect();
        for name in &managed {
            self.register_automation(name);
        }
        info!(count = managed.len(), "automation resumed");
        managed.len()
    }

    /// Shared path for hiring and resuming: collect now, then arm the trigger.
    fn register_automation(&mut self, name: &str) {
        if let Err(e) = self.start_collect(name) {
            debug!(business = name, %e, "initial automated collect skipped");
        }
        let period = match self.business(name) {
            Some(b) => b.cycle_period_ms(self.config.cycle_buffer_ms),
            None => return,
        };
        self.scheduler.arm_automation(name, period);
    }

    fn start_collect(&mut self, name: &str) -> Result<(), TransitionError> {
        self.with_business(name, |b, _| idle_econ::begin_collect(b))?;
        self.scheduler.start_cooldown(name);
        self.notify(Change::Business(name.to_string()));
        Ok(())
    }

    /// Apply one timer event.
    pub fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::CooldownTick { business, cycle } => self.on_tick(&business, cycle),
            EngineEvent::CycleDue { business } => self.on_cycle_due(&business),
        }
    }

    fn on_tick(&mut self, name: &str, cycle: u64) {
        if !self.scheduler.is_current_cooldown(name, cycle) {
            trace!(business = name, cycle, "stale tick dropped");
            return;
        }
        let quantum = self.scheduler.tick_ms();
        match self.with_business(name, |b, l| idle_econ::tick_cooldown(b, l, quantum)) {
            Ok(TickOutcome::Advanced { .. }) => {
                self.notify(Change::Business(name.to_string()));
            }
            Ok(TickOutcome::Completed { credited }) => {
                self.scheduler.finish_cooldown(name);
                debug!(business = name, %credited, capital = %self.capital(), "cycle complete");
                self.notify_both(name);
            }
            Err(e) => {
                self.scheduler.finish_cooldown(name);
                debug!(business = name, %e, "cooldown ticker dropped");
            }
        }
    }

    fn on_cycle_due(&mut self, name: &str) {
        if !self.business(name).map(|b| b.is_managed).unwrap_or(false) {
            return;
        }
        if let Err(e) = self.start_collect(name) {
            debug!(business = name, %e, "automation cycle skipped");
        }
    }

    /// Apply timer events as they arrive until `duration` has passed.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            self.handle(event);
        }
    }

    /// Full-state snapshot for the save collaborator.
    pub fn snapshot(&self) -> SaveRequest {
        SaveRequest {
            user_id: self.session.user_id.clone(),
            capital: self.capital(),
            businesses: self.session.businesses.clone(),
        }
    }

    /// Cancel every timer. Pending events are discarded.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.events.close();
    }
}
