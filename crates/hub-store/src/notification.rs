//! Notification dispatch contract
//!
//! Delivery channels (mail, push, webhooks) live outside the hub core; the
//! store only hands a [`Notification`] to a router.

use serde::Serialize;

use crate::Destination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// The condition behind the destination started
    Trigger,
    /// The condition behind the destination ended
    Release,
}

/// One message for one destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub destination: Destination,
    pub body: String,
}

/// Fire-and-forget delivery of notifications
///
/// Implementations must not block; slow channels should hand the work to
/// their own task.
pub trait NotificationRouter: Send + Sync {
    fn dispatch(&self, notification: Notification);
}
