//! Test gateways — delivery doubles with recordable outcomes.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use parlor_core::delivery::{DeliveryGateway, DeliveryOutcome};
use parlor_core::error::GameError;
use parlor_core::id::SurfaceRef;
use parlor_core::model::Session;

/// A gateway that plays back a scripted sequence of outcomes, then
/// succeeds. Records every delivery attempt and surface recreation.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<DeliveryOutcome>>,
    delivered: Mutex<Vec<Session>>,
    recreations: Mutex<u32>,
}

impl ScriptedGateway {
    /// Creates a gateway that returns the given outcomes in order, then
    /// `Success` forever after.
    #[must_use]
    pub fn new(outcomes: Vec<DeliveryOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            delivered: Mutex::new(Vec::new()),
            recreations: Mutex::new(0),
        }
    }

    /// All delivery attempts so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn delivered(&self) -> Vec<Session> {
        self.delivered.lock().unwrap().clone()
    }

    /// Number of delivery attempts so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    /// Number of surface recreations so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn recreations(&self) -> u32 {
        *self.recreations.lock().unwrap()
    }
}

#[async_trait]
impl DeliveryGateway for ScriptedGateway {
    async fn deliver(&self, session: &Session) -> DeliveryOutcome {
        self.delivered.lock().unwrap().push(session.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DeliveryOutcome::Success)
    }

    async fn recreate_surface(&self, session: &Session) -> Result<SurfaceRef, GameError> {
        let mut recreations = self.recreations.lock().unwrap();
        *recreations += 1;
        Ok(SurfaceRef(format!("surface-{}-{}", session.id, recreations)))
    }
}
