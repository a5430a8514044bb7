//! The per-session delivery worker.
//!
//! Mutation and delivery are decoupled: the coordinator publishes each
//! committed snapshot to a watch channel, and the worker renders whatever
//! is freshest when it gets around to it. A burst of rapid events
//! therefore collapses to one final render; intermediate states may never
//! be pushed, and that is by contract.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use parlor_core::delivery::{DeliveryGateway, DeliveryOutcome};
use parlor_core::id::SessionId;
use parlor_core::model::Session;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::coordinator::Msg;

/// Retry and pacing knobs for board delivery.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Attempts per snapshot before giving up on a transient failure.
    pub attempts: u32,
    /// Backoff after the first failed attempt; grows linearly per attempt.
    pub backoff_base: Duration,
    /// Upper bound on the backoff.
    pub backoff_cap: Duration,
    /// Fixed pause between board pushes, absorbing gateway rate limits.
    pub pacing: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(3),
            pacing: Duration::from_millis(150),
        }
    }
}

impl DeliveryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        cmp::min(self.backoff_base * attempt, self.backoff_cap)
    }
}

/// Spawns the delivery worker for one session. It pushes the initial
/// board, then one render per observed change, and stops when the
/// coordinator drops its publisher.
pub(crate) fn spawn_worker(
    mut updates: watch::Receiver<Session>,
    gateway: Arc<dyn DeliveryGateway>,
    policy: DeliveryPolicy,
    coordinator: mpsc::Sender<Msg>,
    session_id: SessionId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = updates.borrow_and_update().clone();
            deliver_with_retry(&snapshot, gateway.as_ref(), &policy, &coordinator).await;
            tokio::time::sleep(policy.pacing).await;
            if updates.changed().await.is_err() {
                break;
            }
        }
        tracing::debug!(session = %session_id, "delivery worker stopped");
    })
}

/// Delivers one snapshot under the retry policy.
///
/// Transient failures retry with capped linear backoff. A permanent
/// failure recreates the board surface, reports the replacement to the
/// coordinator, and re-delivers exactly once. Exhaustion is logged, never
/// fatal: the session keeps its state and the next event tries again.
async fn deliver_with_retry(
    snapshot: &Session,
    gateway: &dyn DeliveryGateway,
    policy: &DeliveryPolicy,
    coordinator: &mpsc::Sender<Msg>,
) {
    let mut snapshot = snapshot.clone();
    for attempt in 1..=policy.attempts {
        match gateway.deliver(&snapshot).await {
            DeliveryOutcome::Success => return,
            DeliveryOutcome::Retryable(reason) => {
                tracing::warn!(
                    session = %snapshot.id,
                    attempt,
                    reason,
                    "transient delivery failure"
                );
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
            DeliveryOutcome::Permanent(reason) => {
                tracing::warn!(
                    session = %snapshot.id,
                    reason,
                    "board surface lost, recreating"
                );
                match gateway.recreate_surface(&snapshot).await {
                    Ok(surface) => {
                        let _ = coordinator
                            .send(Msg::SurfaceReplaced {
                                surface: surface.clone(),
                            })
                            .await;
                        snapshot.surface = Some(surface);
                        if let DeliveryOutcome::Retryable(reason)
                        | DeliveryOutcome::Permanent(reason) =
                            gateway.deliver(&snapshot).await
                        {
                            tracing::error!(
                                session = %snapshot.id,
                                reason,
                                "delivery failed on the recreated surface"
                            );
                        }
                    }
                    Err(error) => {
                        tracing::error!(
                            session = %snapshot.id,
                            %error,
                            "surface recreation failed"
                        );
                    }
                }
                return;
            }
        }
    }
    tracing::warn!(
        session = %snapshot.id,
        attempts = policy.attempts,
        "delivery attempts exhausted; board stays stale until the next event"
    );
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use parlor_core::id::{SessionId, UserId};
    use parlor_core::model::SessionKind;
    use parlor_test_support::ScriptedGateway;

    use super::*;

    fn snapshot() -> Session {
        Session::new(
            SessionId::new(),
            SessionKind::Group,
            UserId(1),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failures_retry_until_success() {
        let gateway = ScriptedGateway::new(vec![
            DeliveryOutcome::Retryable("rate limited".to_owned()),
            DeliveryOutcome::Retryable("rate limited".to_owned()),
        ]);
        let (tx, _rx) = mpsc::channel(8);

        deliver_with_retry(&snapshot(), &gateway, &DeliveryPolicy::default(), &tx).await;

        assert_eq!(gateway.delivery_count(), 3);
        assert_eq!(gateway.recreations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_give_up_without_recreation() {
        let gateway = ScriptedGateway::new(vec![
            DeliveryOutcome::Retryable("down".to_owned()),
            DeliveryOutcome::Retryable("down".to_owned()),
            DeliveryOutcome::Retryable("down".to_owned()),
            DeliveryOutcome::Retryable("down".to_owned()),
        ]);
        let (tx, _rx) = mpsc::channel(8);

        deliver_with_retry(&snapshot(), &gateway, &DeliveryPolicy::default(), &tx).await;

        assert_eq!(gateway.delivery_count(), 4);
        assert_eq!(gateway.recreations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_recreates_surface_and_redelivers_once() {
        let gateway =
            ScriptedGateway::new(vec![DeliveryOutcome::Permanent("message deleted".to_owned())]);
        let (tx, mut rx) = mpsc::channel(8);

        deliver_with_retry(&snapshot(), &gateway, &DeliveryPolicy::default(), &tx).await;

        assert_eq!(gateway.delivery_count(), 2);
        assert_eq!(gateway.recreations(), 1);
        // The replacement surface was reported to the coordinator and used
        // for the re-delivery.
        match rx.try_recv().unwrap() {
            Msg::SurfaceReplaced { surface } => {
                assert_eq!(gateway.delivered()[1].surface.as_ref(), Some(&surface));
            }
            other => panic!("expected SurfaceReplaced, got {other:?}"),
        }
    }
}
