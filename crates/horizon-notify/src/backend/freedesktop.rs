//! Encoding of `org.freedesktop.Notifications` requests.
//!
//! Platform independent so the encoding is testable everywhere; only the
//! D-Bus transport in [`linux`](super) is Linux specific.

use std::time::Duration;

use quick_xml::escape::escape;

use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::notification::Notification;

/// Hint key carrying the urgency byte.
pub const URGENCY_HINT: &str = "urgency";

/// Arguments of a `Notify` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRequest {
    /// Application name.
    pub app_name: String,
    /// Id of a notification to replace; always 0.
    pub replaces_id: u32,
    /// Application icon path, or empty.
    pub app_icon: String,
    /// Title.
    pub summary: String,
    /// Body, possibly with image markup.
    pub body: String,
    /// Flattened `[action_id, label, ...]` pairs.
    pub actions: Vec<String>,
    /// Value of the `urgency` hint.
    pub urgency: u8,
    /// Milliseconds until expiry; 0 never expires.
    pub expire_timeout: i32,
}

impl NotifyRequest {
    /// Encode a notification for the daemon.
    pub fn new(
        context: &ApplicationContext,
        notification: &Notification,
        capabilities: Capabilities,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            app_name: context.name().to_string(),
            replaces_id: 0,
            app_icon: context
                .icon()
                .map(|icon| icon.display().to_string())
                .unwrap_or_default(),
            summary: notification.title.clone(),
            body: body(notification, capabilities),
            actions: actions(notification),
            urgency: notification.urgency.as_byte(),
            expire_timeout: expire_timeout(timeout),
        }
    }
}

/// The body text, with an `<img>` element appended when the daemon renders
/// body images and the notification has one.
pub fn body(notification: &Notification, capabilities: Capabilities) -> String {
    match &notification.body_image_path {
        Some(path) if capabilities.contains(Capabilities::BODY_IMAGES) => {
            let src = path.display().to_string();
            format!(
                "{}\n<img src=\"{}\" alt=\"{}\"/>",
                notification.body,
                escape(src.as_str()),
                escape(notification.body_image_alt_text.as_str())
            )
        }
        _ => notification.body.clone(),
    }
}

/// Buttons flattened into the daemon's `[id, label, id, label, ...]` list.
pub fn actions(notification: &Notification) -> Vec<String> {
    notification
        .buttons
        .iter()
        .flat_map(|button| [button.action_id.clone(), button.label.clone()])
        .collect()
}

/// The `expire_timeout` argument.
///
/// `None` maps to 0 (never expires). A present timeout is at least 1 ms so
/// that an already due expiry is not mistaken for "never".
pub fn expire_timeout(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => 0,
        Some(timeout) => i32::try_from(timeout.as_millis())
            .unwrap_or(i32::MAX)
            .max(1),
    }
}

/// Returns true if a `CloseNotification` error means the id is already gone.
///
/// The protocol answers an unknown id with an empty error; daemons in the
/// wild use `InvalidArgs` or a vendor `InvalidId` name instead.
pub fn is_unknown_id_error(error_name: &str) -> bool {
    error_name.is_empty()
        || error_name == "org.freedesktop.DBus.Error.InvalidArgs"
        || error_name.ends_with(".InvalidId")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Urgency;

    #[test]
    fn test_actions_are_flattened_pairs() {
        let notification = Notification::new()
            .button("Reply", "reply")
            .button("Mark read", "mark-read");
        assert_eq!(
            actions(&notification),
            vec!["reply", "Reply", "mark-read", "Mark read"]
        );
        assert!(actions(&Notification::new()).is_empty());
    }

    #[test]
    fn test_body_image_requires_capability() {
        let notification = Notification::new()
            .body("Photo received")
            .body_image("/tmp/cat.png")
            .body_image_alt_text("A cat");

        assert_eq!(body(&notification, Capabilities::BODY_TEXT), "Photo received");
        assert_eq!(
            body(&notification, Capabilities::BODY_IMAGES),
            "Photo received\n<img src=\"/tmp/cat.png\" alt=\"A cat\"/>"
        );
    }

    #[test]
    fn test_body_image_attributes_escaped() {
        let notification = Notification::new()
            .body_image("/tmp/a&b.png")
            .body_image_alt_text("\"quoted\" <alt>");
        let encoded = body(&notification, Capabilities::BODY_IMAGES);
        assert!(encoded.contains("src=\"/tmp/a&amp;b.png\""));
        assert!(encoded.contains("alt=\"&quot;quoted&quot; &lt;alt&gt;\""));
    }

    #[test]
    fn test_expire_timeout() {
        assert_eq!(expire_timeout(None), 0);
        assert_eq!(expire_timeout(Some(Duration::from_millis(1500))), 1500);
        assert_eq!(expire_timeout(Some(Duration::ZERO)), 1);
        assert_eq!(expire_timeout(Some(Duration::from_secs(u64::MAX / 4))), i32::MAX);
    }

    #[test]
    fn test_notify_request() {
        let context = ApplicationContext::new("Mailer").with_icon("/usr/share/icons/mail.png");
        let notification = Notification::new()
            .title("New mail")
            .body("3 unread messages")
            .button("Open", "open")
            .urgency(Urgency::Critical);

        let request = NotifyRequest::new(
            &context,
            &notification,
            Capabilities::BODY_TEXT,
            Some(Duration::from_secs(10)),
        );

        assert_eq!(request.app_name, "Mailer");
        assert_eq!(request.replaces_id, 0);
        assert_eq!(request.app_icon, "/usr/share/icons/mail.png");
        assert_eq!(request.summary, "New mail");
        assert_eq!(request.body, "3 unread messages");
        assert_eq!(request.actions, vec!["open", "Open"]);
        assert_eq!(request.urgency, 2);
        assert_eq!(request.expire_timeout, 10_000);
    }

    #[test]
    fn test_notify_request_without_icon() {
        let request = NotifyRequest::new(
            &ApplicationContext::new("app"),
            &Notification::new(),
            Capabilities::empty(),
            None,
        );
        assert!(request.app_icon.is_empty());
        assert_eq!(request.urgency, 1);
        assert_eq!(request.expire_timeout, 0);
    }

    #[test]
    fn test_unknown_id_errors() {
        assert!(is_unknown_id_error(""));
        assert!(is_unknown_id_error("org.freedesktop.DBus.Error.InvalidArgs"));
        assert!(is_unknown_id_error("org.freedesktop.Notifications.InvalidId"));
        assert!(!is_unknown_id_error("org.freedesktop.DBus.Error.AccessDenied"));
        assert!(!is_unknown_id_error("org.freedesktop.DBus.Error.ServiceUnknown"));
    }
}
