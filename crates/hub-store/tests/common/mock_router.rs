//! Notification router that keeps every dispatched notification

use hub_store::{Notification, NotificationRouter};
use parking_lot::Mutex;

#[derive(Default)]
pub struct RecordingRouter {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingRouter {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

impl NotificationRouter for RecordingRouter {
    fn dispatch(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
