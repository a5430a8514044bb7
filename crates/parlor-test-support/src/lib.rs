//! Shared test doubles for the Parlor workspace.

mod clock;
mod gateway;
mod rng;
mod store;

pub use clock::FixedClock;
pub use gateway::ScriptedGateway;
pub use rng::{MockRng, SequenceRng};
pub use store::{FailingStore, InMemoryStore};
