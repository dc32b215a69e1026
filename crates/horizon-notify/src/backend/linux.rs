//! Freedesktop notifications over the D-Bus session bus.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use horizon_notify_core::AsyncSpawner;
use horizon_notify_core::logging::targets;
use tokio::sync::OnceCell;
use zbus::Connection;
use zbus::zvariant::Value;

use super::freedesktop::{self, NotifyRequest};
use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::TransportError;
use crate::event::EventSink;
use crate::notification::Notification;
use crate::transport::{NotificationTransport, Subscription};

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;

    fn get_capabilities(&self) -> zbus::Result<Vec<String>>;

    fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;

    #[zbus(signal)]
    fn notification_closed(&self, id: u32, reason: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn action_invoked(&self, id: u32, action_key: String) -> zbus::Result<()>;
}

/// Transport for `org.freedesktop.Notifications`.
///
/// Handles are the daemon's `u32` notification ids. The daemon has no
/// scheduling support, so scheduling is emulated by the service.
#[derive(Default)]
pub struct FreedesktopTransport {
    proxy: OnceCell<NotificationsProxy<'static>>,
    capabilities: OnceLock<Capabilities>,
    spawner: OnceLock<AsyncSpawner>,
}

impl FreedesktopTransport {
    /// Create a transport. The session bus is connected in `initialize`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run signal forwarding on `spawner` instead of the ambient runtime.
    pub fn with_spawner(self, spawner: AsyncSpawner) -> Self {
        let _ = self.spawner.set(spawner);
        self
    }

    fn spawner(&self) -> &AsyncSpawner {
        self.spawner.get_or_init(AsyncSpawner::current_or_global)
    }

    async fn proxy(&self) -> Result<&NotificationsProxy<'static>, TransportError> {
        self.proxy
            .get_or_try_init(|| async {
                let connection = Connection::session().await?;
                let proxy = NotificationsProxy::new(&connection).await?;
                Ok::<_, TransportError>(proxy)
            })
            .await
    }
}

#[async_trait]
impl NotificationTransport for FreedesktopTransport {
    type Handle = u32;
    type ScheduleHandle = Infallible;

    fn name(&self) -> &'static str {
        "freedesktop"
    }

    async fn initialize(&self) -> Result<Capabilities, TransportError> {
        let proxy = self.proxy().await?;

        match proxy.get_server_information().await {
            Ok((name, vendor, version, spec_version)) => tracing::debug!(
                target: targets::BACKEND,
                %name, %vendor, %version, %spec_version,
                "connected to notification daemon"
            ),
            Err(e) => tracing::debug!(target: targets::BACKEND, error = %e, "no server information"),
        }

        let names = proxy
            .get_capabilities()
            .await
            .map_err(|e| TransportError::call("GetCapabilities", e))?;
        let capabilities = Capabilities::from_server_capabilities(&names);
        let _ = self.capabilities.set(capabilities);
        Ok(capabilities)
    }

    async fn show(
        &self,
        context: &ApplicationContext,
        notification: &Notification,
        timeout: Option<Duration>,
    ) -> Result<u32, TransportError> {
        let capabilities = self.capabilities.get().copied().unwrap_or_default();
        let request = NotifyRequest::new(context, notification, capabilities, timeout);
        let actions: Vec<&str> = request.actions.iter().map(String::as_str).collect();
        let hints = HashMap::from([(freedesktop::URGENCY_HINT, Value::U8(request.urgency))]);

        self.proxy()
            .await?
            .notify(
                &request.app_name,
                request.replaces_id,
                &request.app_icon,
                &request.summary,
                &request.body,
                &actions,
                hints,
                request.expire_timeout,
            )
            .await
            .map_err(|e| TransportError::call("Notify", e))
    }

    async fn close(&self, handle: &u32) -> Result<(), TransportError> {
        match self.proxy().await?.close_notification(*handle).await {
            Ok(()) => Ok(()),
            Err(zbus::Error::MethodError(name, ..))
                if freedesktop::is_unknown_id_error(name.as_str()) =>
            {
                tracing::trace!(target: targets::BACKEND, id = *handle, error = %name, "close of vanished notification");
                Ok(())
            }
            Err(e) => Err(TransportError::call("CloseNotification", e)),
        }
    }

    async fn watch_closed(&self, sink: EventSink<u32>) -> Result<Subscription, TransportError> {
        let mut stream = self.proxy().await?.receive_notification_closed().await?;
        let task = self.spawner().spawn(async move {
            while let Some(signal) = stream.next().await {
                match signal.args() {
                    Ok(args) => {
                        if !sink.closed(args.id, args.reason) {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(
                        target: targets::BACKEND,
                        error = %e,
                        "malformed NotificationClosed signal"
                    ),
                }
            }
        });
        Ok(Subscription::from_task(task.into_join_handle()))
    }

    async fn watch_action_invoked(
        &self,
        sink: EventSink<u32>,
    ) -> Result<Subscription, TransportError> {
        let mut stream = self.proxy().await?.receive_action_invoked().await?;
        let task = self.spawner().spawn(async move {
            while let Some(signal) = stream.next().await {
                match signal.args() {
                    Ok(args) => {
                        if !sink.action_invoked(args.id, args.action_key) {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(
                        target: targets::BACKEND,
                        error = %e,
                        "malformed ActionInvoked signal"
                    ),
                }
            }
        });
        Ok(Subscription::from_task(task.into_join_handle()))
    }
}

impl std::fmt::Debug for FreedesktopTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreedesktopTransport")
            .field("connected", &self.proxy.initialized())
            .field("capabilities", &self.capabilities.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_notify_core::{AsyncRuntime, AsyncRuntimeConfig};

    #[test]
    fn test_transport_properties() {
        let transport = FreedesktopTransport::new();
        assert_eq!(transport.name(), "freedesktop");
        assert!(transport.tracks_delivery());
        assert!(!transport.supports_native_scheduling());
        assert_eq!(
            transport.dismiss_cause(2),
            crate::event::DismissCause::User
        );
        assert!(format!("{transport:?}").contains("connected: false"));
    }

    #[test]
    fn test_with_spawner_pins_forwarding_runtime() {
        let runtime = AsyncRuntime::new(AsyncRuntimeConfig::new().with_thread_name("forwarder-test"))
            .unwrap();
        let transport = FreedesktopTransport::new().with_spawner(runtime.spawner());

        let task = transport
            .spawner()
            .spawn(async { std::thread::current().name().map(str::to_owned) });
        let thread = runtime.handle().block_on(task.into_join_handle()).unwrap();
        assert_eq!(thread.as_deref(), Some("forwarder-test"));
    }
}
