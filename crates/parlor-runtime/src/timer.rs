//! The turn-timeout scheduler.
//!
//! One slot per session: arming always cancels the previously armed timer,
//! so at most one timer is ever pending. Each armed timer carries a
//! generation number; a firing whose generation is no longer current is
//! dropped before it reaches the engine, which keeps the residual race
//! between cancellation and firing harmless.

use std::time::Duration;

use parlor_core::id::UserId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::coordinator::Msg;

#[derive(Debug, Default)]
pub(crate) struct TurnTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl TurnTimer {
    /// Arms the timer for a participant, cancelling any pending one first.
    pub(crate) fn arm(
        &mut self,
        participant: UserId,
        duration: Duration,
        inbox: mpsc::Sender<Msg>,
    ) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = inbox
                .send(Msg::TimerFired {
                    participant,
                    generation,
                })
                .await;
        }));
    }

    /// Cancels the pending timer, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a firing with this generation came from the armed timer.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
