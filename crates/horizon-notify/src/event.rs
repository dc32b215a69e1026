//! Domain events and the backend event taxonomy.
//!
//! Backends report two kinds of asynchronous events, each keyed by the
//! backend's own handle: a notification was closed (with a backend specific
//! reason code) and an action was invoked (with a backend specific action
//! key). Backends push them into an [`EventSink`]; the
//! [`EventRouter`](crate::router::EventRouter) turns them into the domain
//! events [`NotificationDismissed`] and [`NotificationActivated`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::notification::Notification;

/// Action id reported for a plain click on the notification body.
pub const DEFAULT_ACTION_ID: &str = "default";

/// Normalize a raw backend action key into an action id.
///
/// An empty key denotes the platform default activation.
pub fn normalize_action_id(action_key: &str) -> String {
    if action_key.is_empty() {
        DEFAULT_ACTION_ID.to_string()
    } else {
        action_key.to_string()
    }
}

/// Why a notification left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DismissCause {
    /// The user closed the notification.
    User,
    /// The notification expired.
    Expired,
    /// The notification was explicitly removed by application code.
    Application,
    /// The backend reported a reason this library does not recognize.
    Unknown,
}

impl DismissCause {
    /// Map a freedesktop `NotificationClosed` reason code.
    pub fn from_freedesktop(reason: u32) -> Self {
        match reason {
            1 => DismissCause::Expired,
            2 => DismissCause::User,
            3 => DismissCause::Application,
            _ => DismissCause::Unknown,
        }
    }

    /// Map a Windows `ToastDismissalReason` value.
    pub fn from_toast(reason: u32) -> Self {
        match reason {
            0 => DismissCause::User,
            1 => DismissCause::Application,
            2 => DismissCause::Expired,
            _ => DismissCause::Unknown,
        }
    }
}

impl fmt::Display for DismissCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DismissCause::User => "user",
            DismissCause::Expired => "expired",
            DismissCause::Application => "application",
            DismissCause::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Raised when the user activates a notification or one of its buttons.
#[derive(Debug, Clone)]
pub struct NotificationActivated {
    /// The notification that was activated (the caller's own `Arc`).
    pub notification: Arc<Notification>,
    /// The button's action id, or [`DEFAULT_ACTION_ID`] for a plain click.
    pub action_id: String,
}

/// Raised exactly once when a shown notification is closed.
#[derive(Debug, Clone)]
pub struct NotificationDismissed {
    /// The notification that was dismissed (the caller's own `Arc`).
    pub notification: Arc<Notification>,
    /// Normalized dismissal cause.
    pub cause: DismissCause,
}

/// A raw, handle-keyed event produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent<H> {
    /// The backend closed the notification.
    Closed {
        /// Backend handle of the closed notification.
        handle: H,
        /// Backend specific reason code.
        reason: u32,
    },
    /// The user invoked an action.
    ActionInvoked {
        /// Backend handle of the activated notification.
        handle: H,
        /// Backend specific action key, verbatim.
        action_key: String,
    },
}

/// The sending half of the event router's inbound channel.
///
/// Cheap to clone and usable from any thread, including backend callback
/// threads that are not part of a Tokio runtime.
#[derive(Debug)]
pub struct EventSink<H> {
    sender: mpsc::UnboundedSender<BackendEvent<H>>,
}

impl<H> Clone for EventSink<H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<H> EventSink<H> {
    /// Create a sink and the receiver the router consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BackendEvent<H>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Report that a notification was closed.
    ///
    /// Returns `false` if the router has shut down.
    pub fn closed(&self, handle: H, reason: u32) -> bool {
        self.send(BackendEvent::Closed { handle, reason })
    }

    /// Report that an action was invoked.
    ///
    /// Returns `false` if the router has shut down.
    pub fn action_invoked(&self, handle: H, action_key: impl Into<String>) -> bool {
        self.send(BackendEvent::ActionInvoked {
            handle,
            action_key: action_key.into(),
        })
    }

    /// Push a raw event.
    pub fn send(&self, event: BackendEvent<H>) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Returns true once the router has stopped consuming events.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freedesktop_reason_table() {
        assert_eq!(DismissCause::from_freedesktop(1), DismissCause::Expired);
        assert_eq!(DismissCause::from_freedesktop(2), DismissCause::User);
        assert_eq!(DismissCause::from_freedesktop(3), DismissCause::Application);
        assert_eq!(DismissCause::from_freedesktop(0), DismissCause::Unknown);
        assert_eq!(DismissCause::from_freedesktop(4), DismissCause::Unknown);
        assert_eq!(DismissCause::from_freedesktop(u32::MAX), DismissCause::Unknown);
    }

    #[test]
    fn test_toast_reason_table() {
        assert_eq!(DismissCause::from_toast(0), DismissCause::User);
        assert_eq!(DismissCause::from_toast(1), DismissCause::Application);
        assert_eq!(DismissCause::from_toast(2), DismissCause::Expired);
        assert_eq!(DismissCause::from_toast(9), DismissCause::Unknown);
    }

    #[test]
    fn test_normalize_action_id() {
        assert_eq!(normalize_action_id(""), "default");
        assert_eq!(normalize_action_id("default"), "default");
        assert_eq!(normalize_action_id("reply"), "reply");
        assert_eq!(normalize_action_id(" "), " ");
    }

    #[test]
    fn test_sink_delivers_in_order() {
        let (sink, mut receiver) = EventSink::<u32>::channel();
        assert!(sink.closed(7, 2));
        assert!(sink.action_invoked(7, "reply"));

        assert_eq!(
            receiver.try_recv().unwrap(),
            BackendEvent::Closed { handle: 7, reason: 2 }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            BackendEvent::ActionInvoked {
                handle: 7,
                action_key: "reply".to_string()
            }
        );
    }

    #[test]
    fn test_sink_reports_closed_router() {
        let (sink, receiver) = EventSink::<u32>::channel();
        drop(receiver);
        assert!(sink.is_closed());
        assert!(!sink.closed(1, 1));
    }

    #[test]
    fn test_dismiss_cause_display() {
        assert_eq!(DismissCause::User.to_string(), "user");
        assert_eq!(DismissCause::Unknown.to_string(), "unknown");
    }
}
