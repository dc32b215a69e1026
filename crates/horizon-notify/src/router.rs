//! Routing of backend events to caller-visible signals.
//!
//! The router is the single consumer of the backend event channel. For each
//! [`BackendEvent`] it resolves the handle through the
//! [`NotificationRegistry`] and raises the matching domain event. Events for
//! handles that are not (or no longer) registered are dropped.
//!
//! A backend may report a close before `show` has returned the handle. Such
//! closes are held in a small buffer and consumed by
//! [`register_shown`](EventRouter::register_shown).

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use horizon_notify_core::Signal;
use horizon_notify_core::logging::targets;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::event::{
    BackendEvent, DismissCause, NotificationActivated, NotificationDismissed, normalize_action_id,
};
use crate::error::RegistryError;
use crate::notification::Notification;
use crate::registry::NotificationRegistry;

/// Number of unmatched close events kept for late registration.
pub const EARLY_CLOSE_CAPACITY: usize = 64;

type DismissMapper = Box<dyn Fn(u32) -> DismissCause + Send + Sync>;

/// Turns handle-keyed backend events into [`NotificationActivated`] and
/// [`NotificationDismissed`] signals.
pub struct EventRouter<H, S> {
    registry: Arc<NotificationRegistry<H, S>>,
    activated: Signal<NotificationActivated>,
    dismissed: Signal<NotificationDismissed>,
    dismiss_cause: DismissMapper,
    early_closes: Mutex<VecDeque<(H, u32)>>,
}

impl<H, S> EventRouter<H, S>
where
    H: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    S: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a router using the backend's close reason table.
    pub fn new<F>(registry: Arc<NotificationRegistry<H, S>>, dismiss_cause: F) -> Self
    where
        F: Fn(u32) -> DismissCause + Send + Sync + 'static,
    {
        Self {
            registry,
            activated: Signal::new(),
            dismissed: Signal::new(),
            dismiss_cause: Box::new(dismiss_cause),
            early_closes: Mutex::new(VecDeque::new()),
        }
    }

    /// Signal raised when a notification or one of its buttons is activated.
    pub fn activated(&self) -> &Signal<NotificationActivated> {
        &self.activated
    }

    /// Signal raised when a shown notification is closed.
    pub fn dismissed(&self) -> &Signal<NotificationDismissed> {
        &self.dismissed
    }

    /// The registry this router resolves handles against.
    pub fn registry(&self) -> &Arc<NotificationRegistry<H, S>> {
        &self.registry
    }

    /// Route a single event.
    ///
    /// Returns true if a domain event was raised.
    #[tracing::instrument(skip(self), target = "horizon_notify::router", level = "debug")]
    pub fn handle(&self, event: BackendEvent<H>) -> bool {
        match event {
            BackendEvent::Closed { handle, reason } => {
                let removed = {
                    let mut early = self.early_closes.lock();
                    let removed = self.registry.remove(&handle);
                    if removed.is_none() {
                        if early.len() == EARLY_CLOSE_CAPACITY {
                            early.pop_front();
                        }
                        early.push_back((handle.clone(), reason));
                    }
                    removed
                };
                // The registry lock is released before emitting.
                let Some(notification) = removed else {
                    tracing::trace!(target: targets::ROUTER, ?handle, "close for unknown handle held back");
                    return false;
                };
                self.raise_dismissed(&handle, notification, reason);
                true
            }
            BackendEvent::ActionInvoked { handle, action_key } => {
                let Some(notification) = self.registry.resolve(&handle) else {
                    tracing::trace!(target: targets::ROUTER, ?handle, "action for unknown handle dropped");
                    return false;
                };
                let action_id = normalize_action_id(&action_key);
                tracing::debug!(target: targets::ROUTER, ?handle, %action_id, "notification activated");
                let event = NotificationActivated {
                    notification,
                    action_id,
                };
                if let Err(e) = self.activated.try_emit(event) {
                    tracing::warn!(target: targets::ROUTER, ?handle, error = %e, "activation subscriber failed");
                }
                true
            }
        }
    }

    /// Record a freshly shown notification.
    ///
    /// If the backend already reported the handle as closed, nothing is
    /// registered and the dismissal is raised now.
    pub fn register_shown(
        &self,
        handle: H,
        notification: Arc<Notification>,
    ) -> Result<(), RegistryError> {
        let early_reason = {
            let mut early = self.early_closes.lock();
            match early.iter().position(|(closed, _)| *closed == handle) {
                Some(index) => early.remove(index).map(|(_, reason)| reason),
                None => {
                    self.registry.register(handle.clone(), Arc::clone(&notification))?;
                    None
                }
            }
        };
        if let Some(reason) = early_reason {
            tracing::debug!(target: targets::ROUTER, ?handle, "notification closed before registration");
            self.raise_dismissed(&handle, notification, reason);
        }
        Ok(())
    }

    /// Forget buffered close events.
    pub fn clear(&self) {
        self.early_closes.lock().clear();
    }

    fn raise_dismissed(&self, handle: &H, notification: Arc<Notification>, reason: u32) {
        let cause = (self.dismiss_cause)(reason);
        tracing::debug!(target: targets::ROUTER, ?handle, reason, %cause, "notification dismissed");
        let event = NotificationDismissed {
            notification,
            cause,
        };
        if let Err(e) = self.dismissed.try_emit(event) {
            tracing::warn!(target: targets::ROUTER, ?handle, error = %e, "dismissal subscriber failed");
        }
    }

    /// Consume events until every sender is gone.
    pub async fn run(&self, mut events: UnboundedReceiver<BackendEvent<H>>) {
        tracing::debug!(target: targets::ROUTER, "event router started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!(target: targets::ROUTER, "event router stopped");
    }
}

impl<H, S> Debug for EventRouter<H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("registry", &self.registry)
            .field("activated", &self.activated)
            .field("dismissed", &self.dismissed)
            .field("early_closes", &self.early_closes.lock().len())
            .finish_non_exhaustive()
    }
}
