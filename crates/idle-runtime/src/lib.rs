#![deny(warnings)]

//! Runtime for the idle engine: timer scheduling, the event-driven session
//! engine and load/save sync.
//!
//! Everything runs on one logical thread. Timers are tokio tasks that only
//! send events; the [`Engine`] applies them between user actions.

pub mod engine;
pub mod scheduler;
pub mod sync;

pub use engine::{Change, Engine};
pub use scheduler::{EngineEvent, Scheduler};
pub use sync::{end_session, load_session};
