//! The seam between the notification core and platform backends.
//!
//! A [`NotificationTransport`] performs the platform calls (D-Bus, WinRT,
//! script execution) and pushes asynchronous backend events into an
//! [`EventSink`]. The core never talks to a platform API directly.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::TransportError;
use crate::event::{DismissCause, EventSink};
use crate::notification::Notification;

/// An active backend event subscription.
///
/// Dropping the subscription tears it down.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { teardown: None }
    }

    /// A subscription that aborts a forwarding task when dropped.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::on_drop(move || task.abort())
    }

    /// A subscription that runs `teardown` when dropped.
    pub fn on_drop<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Tear the subscription down now.
    pub fn unsubscribe(mut self) {
        self.run_teardown();
    }

    /// Returns true if dropping this subscription has an effect.
    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A platform notification backend.
///
/// Implementations are selected at compile time; see
/// [`PlatformNotificationService`](crate::PlatformNotificationService).
#[async_trait]
pub trait NotificationTransport: Send + Sync + 'static {
    /// Identifier the backend assigns to a shown notification.
    type Handle: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Identifier the backend assigns to a natively scheduled notification.
    ///
    /// Backends without native scheduling use [`std::convert::Infallible`].
    type ScheduleHandle: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Connect to the notification subsystem and probe its capabilities.
    async fn initialize(&self) -> Result<Capabilities, TransportError>;

    /// Display a notification.
    ///
    /// # Arguments
    ///
    /// * `context` - The calling application's identity
    /// * `notification` - Content to display
    /// * `timeout` - How long until the notification expires; `None` never expires
    async fn show(
        &self,
        context: &ApplicationContext,
        notification: &Notification,
        timeout: Option<Duration>,
    ) -> Result<Self::Handle, TransportError>;

    /// Close a shown notification.
    ///
    /// Closing a notification that is already gone is not an error.
    async fn close(&self, handle: &Self::Handle) -> Result<(), TransportError>;

    /// Returns true if [`schedule`](Self::schedule) is implemented natively.
    fn supports_native_scheduling(&self) -> bool {
        false
    }

    /// Hand a notification to the OS for delivery at `delivery`.
    async fn schedule(
        &self,
        _context: &ApplicationContext,
        _notification: &Notification,
        _delivery: DateTime<Utc>,
        _expiration: Option<DateTime<Utc>>,
    ) -> Result<Self::ScheduleHandle, TransportError> {
        Err(TransportError::Unsupported("native scheduling"))
    }

    /// Withdraw a natively scheduled notification.
    async fn unschedule(&self, _handle: &Self::ScheduleHandle) -> Result<(), TransportError> {
        Ok(())
    }

    /// Forward "closed" events into `sink` until the subscription is dropped.
    async fn watch_closed(
        &self,
        _sink: EventSink<Self::Handle>,
    ) -> Result<Subscription, TransportError> {
        Ok(Subscription::noop())
    }

    /// Forward "action invoked" events into `sink` until the subscription is dropped.
    async fn watch_action_invoked(
        &self,
        _sink: EventSink<Self::Handle>,
    ) -> Result<Subscription, TransportError> {
        Ok(Subscription::noop())
    }

    /// Map a raw close reason reported by this backend.
    fn dismiss_cause(&self, raw_reason: u32) -> DismissCause {
        DismissCause::from_freedesktop(raw_reason)
    }

    /// Returns false if shown notifications cannot be tracked.
    ///
    /// Untracked backends hand out no usable handles and raise no events, so
    /// nothing is registered for them.
    fn tracks_delivery(&self) -> bool {
        true
    }

    /// The action id that launched or foregrounded the process, if any.
    ///
    /// May wait for the platform; the service bounds the wait.
    async fn launch_action(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_teardown_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let subscription = Subscription::on_drop(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(subscription.is_active());
        drop(subscription);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let subscription = Subscription::on_drop(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_subscription() {
        let subscription = Subscription::noop();
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn test_task_subscription_aborts() {
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        drop(Subscription::from_task(task));
        tokio::task::yield_now().await;
        assert!(abort.is_finished());
    }
}
