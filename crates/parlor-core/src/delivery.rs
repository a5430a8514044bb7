//! Delivery gateway seam.
//!
//! The gateway renders a session and pushes it to the chat surface. The
//! core only sees success or one of two failure classes; transport detail
//! stays behind the trait.

use async_trait::async_trait;

use crate::error::GameError;
use crate::id::SurfaceRef;
use crate::model::Session;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The board was rendered and pushed.
    Success,
    /// A transient failure (rate limit, network hiccup). Worth retrying.
    Retryable(String),
    /// The surface is gone for good (message deleted, widget expired). The
    /// board must be recreated before another push can succeed.
    Permanent(String),
}

/// Renders a session's current state and pushes it to its board surface.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Renders and pushes the given snapshot.
    async fn deliver(&self, session: &Session) -> DeliveryOutcome;

    /// Creates a replacement board surface for the session and returns its
    /// handle. Called after a `Permanent` delivery failure.
    async fn recreate_surface(&self, session: &Session) -> Result<SurfaceRef, GameError>;
}
