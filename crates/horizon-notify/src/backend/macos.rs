//! macOS notifications through `osascript`.
//!
//! Script notifications cannot be tracked: there is no handle, no close and
//! no event. The service therefore registers nothing for this backend.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use horizon_notify_core::logging::targets;
use tokio::process::Command;

use super::applescript::display_notification_script;
use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::TransportError;
use crate::notification::Notification;
use crate::transport::NotificationTransport;

/// Transport running `display notification` through `osascript`.
#[derive(Debug, Default)]
pub struct AppleScriptTransport;

impl AppleScriptTransport {
    /// Create a transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationTransport for AppleScriptTransport {
    type Handle = ();
    type ScheduleHandle = std::convert::Infallible;

    fn name(&self) -> &'static str {
        "applescript"
    }

    async fn initialize(&self) -> Result<Capabilities, TransportError> {
        Ok(Capabilities::empty())
    }

    async fn show(
        &self,
        _context: &ApplicationContext,
        notification: &Notification,
        _timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        let script = display_notification_script(notification);
        let status = Command::new("osascript")
            .args(["-e", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            tracing::warn!(target: targets::BACKEND, %status, "osascript failed");
            return Err(TransportError::call(
                "osascript",
                format!("exited with status: {status}"),
            ));
        }
        Ok(())
    }

    async fn close(&self, _handle: &()) -> Result<(), TransportError> {
        Ok(())
    }

    fn tracks_delivery(&self) -> bool {
        false
    }
}
