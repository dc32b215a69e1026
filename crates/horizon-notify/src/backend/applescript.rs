//! AppleScript generation for the macOS script backend.

use crate::notification::Notification;

/// Escape a value for use inside an AppleScript string literal.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// The `display notification` statement for a notification.
pub fn display_notification_script(notification: &Notification) -> String {
    format!(
        "display notification \"{}\" with title \"{}\"",
        escape(&notification.body),
        escape(&notification.title)
    )
}
