//! Toast XML generation for Windows notifications.
//!
//! Produces the `ToastGeneric` payload understood by
//! `Windows.UI.Notifications`:
//!
//! ```xml
//! <toast>
//!   <visual>
//!     <binding template="ToastGeneric">
//!       <text>Title</text>
//!       <text>Body</text>
//!       <image placement="inline" src="file:///C:/img.png" alt="Image"/>
//!     </binding>
//!   </visual>
//!   <actions>
//!     <action content="Open" arguments="open" activationType="foreground"/>
//!   </actions>
//! </toast>
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::event::normalize_action_id;
use crate::notification::Notification;

/// Command-line flag Windows passes to a process launched from a toast.
pub const TOAST_ACTIVATED_FLAG: &str = "-ToastActivated";

/// Build the toast XML for a notification. Text and attributes are escaped.
pub fn toast_xml(notification: &Notification) -> String {
    let mut writer = Writer::new(Vec::new());

    let _ = writer.write_event(Event::Start(BytesStart::new("toast")));
    let _ = writer.write_event(Event::Start(BytesStart::new("visual")));
    let _ = writer.write_event(Event::Start(
        BytesStart::new("binding").with_attributes([("template", "ToastGeneric")]),
    ));

    write_text(&mut writer, &notification.title);
    write_text(&mut writer, &notification.body);

    if let Some(path) = &notification.body_image_path {
        let src = image_uri(path);
        let _ = writer.write_event(Event::Empty(BytesStart::new("image").with_attributes([
            ("placement", "inline"),
            ("src", src.as_str()),
            ("alt", notification.body_image_alt_text.as_str()),
        ])));
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("binding")));
    let _ = writer.write_event(Event::End(BytesEnd::new("visual")));

    if !notification.buttons.is_empty() {
        let _ = writer.write_event(Event::Start(BytesStart::new("actions")));
        for button in &notification.buttons {
            let _ = writer.write_event(Event::Empty(BytesStart::new("action").with_attributes([
                ("content", button.label.as_str()),
                ("arguments", button.action_id.as_str()),
                ("activationType", "foreground"),
            ])));
        }
        let _ = writer.write_event(Event::End(BytesEnd::new("actions")));
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("toast")));
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new("text")));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new("text")));
}

/// `file:///` URI for a local image path.
pub fn image_uri(path: &Path) -> String {
    let path = path.display().to_string().replace('\\', "/");
    format!("file:///{}", path.trim_start_matches('/'))
}

/// Seconds between 1601-01-01 (the WinRT epoch) and 1970-01-01.
const WINRT_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// WinRT `DateTime::UniversalTime`: 100 ns ticks since 1601-01-01 UTC.
pub fn universal_time(at: DateTime<Utc>) -> i64 {
    (at.timestamp() + WINRT_EPOCH_OFFSET_SECS) * 10_000_000
        + i64::from(at.timestamp_subsec_nanos() / 100)
}

/// Action id carried by a toast-activated launch, if the process was started
/// that way.
///
/// The argument following [`TOAST_ACTIVATED_FLAG`] is the activation
/// argument; a missing or empty argument is the default action.
pub fn launch_action_from_args<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    args.by_ref()
        .find(|arg| arg.as_ref() == TOAST_ACTIVATED_FLAG)?;
    let argument = args.next();
    let key = argument.as_ref().map_or("", |arg| arg.as_ref());
    Some(normalize_action_id(key))
}
