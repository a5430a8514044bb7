//! Parlor Engine — the pure transition function.
//!
//! Given the current session state and an inbound event, the engine
//! validates actor and phase, mutates a working copy, and returns the side
//! effects the coordinator must carry out (timer scheduling, action-log
//! writes). It performs no I/O and never fails partway: an `Err` guarantees
//! the session was not touched.

pub mod config;
pub mod effect;
mod engine;
mod penalty;

pub use config::GameConfig;
pub use effect::Effect;
pub use engine::Engine;
