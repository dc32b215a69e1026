//! Fallback transport for platforms without a notification backend.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;

use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::TransportError;
use crate::notification::Notification;
use crate::transport::NotificationTransport;

/// Transport that initializes with no capabilities and refuses to show.
#[derive(Debug, Default)]
pub struct UnsupportedTransport;

impl UnsupportedTransport {
    /// Create a transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationTransport for UnsupportedTransport {
    type Handle = Infallible;
    type ScheduleHandle = Infallible;

    fn name(&self) -> &'static str {
        "unsupported"
    }

    async fn initialize(&self) -> Result<Capabilities, TransportError> {
        Ok(Capabilities::empty())
    }

    async fn show(
        &self,
        _context: &ApplicationContext,
        _notification: &Notification,
        _timeout: Option<Duration>,
    ) -> Result<Infallible, TransportError> {
        Err(TransportError::Unsupported("notifications on this platform"))
    }

    async fn close(&self, handle: &Infallible) -> Result<(), TransportError> {
        match *handle {}
    }
}
