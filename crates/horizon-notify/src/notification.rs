//! The caller-owned notification value object.
//!
//! A [`Notification`] carries content only. It has no identity of its own:
//! identity is established when it is shown, and it is the identity of the
//! `Arc<Notification>` allocation handed to the service. Two notifications
//! with identical content shown separately are tracked separately.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_notify::Notification;
//!
//! let notification = Notification::new()
//!     .title("Download Complete")
//!     .body("Your file has been downloaded successfully.")
//!     .button("Open", "open")
//!     .button("Show in folder", "reveal")
//!     .into_shared();
//!
//! assert_eq!(notification.buttons.len(), 2);
//! ```
//!
//! # Mutation after showing
//!
//! The service keeps a clone of the `Arc`, never a copy of the content.
//! Changing content after showing (for example via `Arc::make_mut`, which
//! allocates a new identity) does not update what is already on screen, and
//! the changed value is no longer the tracked notification.

use std::path::PathBuf;
use std::sync::Arc;

/// Default alternative text for a body image.
pub const DEFAULT_IMAGE_ALT_TEXT: &str = "Image";

/// Notification urgency level.
///
/// Determines how prominently the notification is displayed.
/// On platforms that don't support urgency, this is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    /// Low urgency - may be displayed less prominently.
    Low,
    /// Normal urgency - standard display.
    #[default]
    Normal,
    /// Critical urgency - displayed prominently, may require user acknowledgment.
    Critical,
}

impl Urgency {
    /// The freedesktop `urgency` hint byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Urgency::Low => 0,
            Urgency::Normal => 1,
            Urgency::Critical => 2,
        }
    }
}

/// A labeled button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationButton {
    /// Display label for the button.
    pub label: String,
    /// Identifier reported in [`NotificationActivated`](crate::NotificationActivated)
    /// when the button is clicked.
    pub action_id: String,
}

impl NotificationButton {
    /// Create a new button.
    pub fn new(label: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action_id: action_id.into(),
        }
    }
}

/// Content of a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Heading of the notification.
    pub title: String,
    /// Detailed message content.
    pub body: String,
    /// Optional image shown inside the body.
    pub body_image_path: Option<PathBuf>,
    /// Alternative text for the body image.
    pub body_image_alt_text: String,
    /// Buttons, in display order.
    pub buttons: Vec<NotificationButton>,
    /// Urgency hint. Only the freedesktop backend uses it.
    pub urgency: Urgency,
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

impl Notification {
    /// Create an empty notification.
    pub fn new() -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            body_image_path: None,
            body_image_alt_text: DEFAULT_IMAGE_ALT_TEXT.to_string(),
            buttons: Vec::new(),
            urgency: Urgency::Normal,
        }
    }

    /// Set the notification title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the notification body text.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach an image to the body.
    ///
    /// Shown only where the backend reports
    /// [`Capabilities::BODY_IMAGES`](crate::Capabilities::BODY_IMAGES).
    pub fn body_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.body_image_path = Some(path.into());
        self
    }

    /// Set the alternative text for the body image.
    pub fn body_image_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.body_image_alt_text = alt_text.into();
        self
    }

    /// Append a button.
    ///
    /// # Arguments
    ///
    /// * `label` - The display text for the button
    /// * `action_id` - The identifier reported when the button is clicked
    pub fn button(mut self, label: impl Into<String>, action_id: impl Into<String>) -> Self {
        self.buttons.push(NotificationButton::new(label, action_id));
        self
    }

    /// Set the urgency level.
    pub fn urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Wrap the notification for sharing with a service.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let notification = Notification::new();
        assert!(notification.title.is_empty());
        assert!(notification.body.is_empty());
        assert!(notification.body_image_path.is_none());
        assert_eq!(notification.body_image_alt_text, "Image");
        assert!(notification.buttons.is_empty());
        assert_eq!(notification.urgency, Urgency::Normal);
    }

    #[test]
    fn test_notification_builder_chain() {
        let notification = Notification::new()
            .title("Reminder")
            .body("Meeting in 5 minutes")
            .body_image("/tmp/calendar.png")
            .body_image_alt_text("Calendar")
            .button("Snooze", "snooze")
            .button("Join", "join")
            .urgency(Urgency::Critical);

        assert_eq!(notification.title, "Reminder");
        assert_eq!(notification.body, "Meeting in 5 minutes");
        assert_eq!(
            notification.body_image_path,
            Some(PathBuf::from("/tmp/calendar.png"))
        );
        assert_eq!(notification.body_image_alt_text, "Calendar");
        assert_eq!(
            notification.buttons,
            vec![
                NotificationButton::new("Snooze", "snooze"),
                NotificationButton::new("Join", "join"),
            ]
        );
        assert_eq!(notification.urgency, Urgency::Critical);
    }

    #[test]
    fn test_shared_notifications_have_distinct_identity() {
        let a = Notification::new().title("Same").into_shared();
        let b = Notification::new().title("Same").into_shared();
        assert_eq!(*a, *b);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_urgency_bytes() {
        assert_eq!(Urgency::Low.as_byte(), 0);
        assert_eq!(Urgency::Normal.as_byte(), 1);
        assert_eq!(Urgency::Critical.as_byte(), 2);
    }
}
