//! Windows toast notifications through WinRT.
//!
//! Toast objects have no stable numeric identity, so the transport hands out
//! synthetic [`ToastHandle`]s and keeps the toast objects in its own map.
//! Event handlers are attached per toast and forward into the sinks
//! installed by `watch_closed` / `watch_action_invoked`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use horizon_notify_core::logging::targets;
use parking_lot::Mutex;
use windows::Data::Xml::Dom::XmlDocument;
use windows::Foundation::{DateTime as WinDateTime, IReference, PropertyValue, TypedEventHandler};
use windows::UI::Notifications::{
    ScheduledToastNotification, ToastActivatedEventArgs, ToastDismissedEventArgs,
    ToastFailedEventArgs, ToastNotification, ToastNotificationManager, ToastNotifier,
};
use windows::core::{HSTRING, IInspectable, Interface};

use super::toast_xml::{launch_action_from_args, toast_xml, universal_time};
use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::TransportError;
use crate::event::{DismissCause, EventSink};
use crate::notification::Notification;
use crate::transport::{NotificationTransport, Subscription};

/// Close reason reported when the toast could not be displayed.
const FAILED_REASON: u32 = u32::MAX;

/// Handle of a toast shown by [`ToastTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastHandle(u64);

/// Handle of a toast scheduled by [`ToastTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduledToastHandle(u64);

struct PendingToast {
    toast: ScheduledToastNotification,
    delivery: DateTime<Utc>,
}

/// Forget scheduled toasts the OS has already delivered.
fn prune_delivered<K, V>(
    scheduled: &mut HashMap<K, V>,
    now: DateTime<Utc>,
    delivery: impl Fn(&V) -> DateTime<Utc>,
) -> usize {
    let before = scheduled.len();
    scheduled.retain(|_, pending| delivery(pending) > now);
    before - scheduled.len()
}

#[derive(Default)]
struct Sinks {
    closed: Option<EventSink<ToastHandle>>,
    activated: Option<EventSink<ToastHandle>>,
}

/// Transport for Windows toast notifications.
pub struct ToastTransport {
    app_user_model_id: String,
    notifier: OnceLock<ToastNotifier>,
    toasts: Arc<Mutex<HashMap<ToastHandle, ToastNotification>>>,
    scheduled: Mutex<HashMap<ScheduledToastHandle, PendingToast>>,
    sinks: Arc<Mutex<Sinks>>,
    next_id: AtomicU64,
}

impl ToastTransport {
    /// Create a transport posting toasts under `app_user_model_id`.
    pub fn new(app_user_model_id: impl Into<String>) -> Self {
        Self {
            app_user_model_id: app_user_model_id.into(),
            notifier: OnceLock::new(),
            toasts: Arc::new(Mutex::new(HashMap::new())),
            scheduled: Mutex::new(HashMap::new()),
            sinks: Arc::new(Mutex::new(Sinks::default())),
            next_id: AtomicU64::new(1),
        }
    }

    fn notifier(&self) -> Result<&ToastNotifier, TransportError> {
        self.notifier
            .get()
            .ok_or_else(|| TransportError::Connection("toast notifier not created".to_string()))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn attach_handlers(
        &self,
        toast: &ToastNotification,
        handle: ToastHandle,
    ) -> Result<(), TransportError> {
        let sinks = Arc::clone(&self.sinks);
        toast.Activated(&TypedEventHandler::<ToastNotification, IInspectable>::new(
            move |_, args| {
                let action_key = args
                    .as_ref()
                    .and_then(|args| args.cast::<ToastActivatedEventArgs>().ok())
                    .and_then(|args| args.Arguments().ok())
                    .map(|arguments| arguments.to_string_lossy())
                    .unwrap_or_default();
                if let Some(sink) = &sinks.lock().activated {
                    sink.action_invoked(handle, action_key);
                }
                Ok(())
            },
        ))?;

        let sinks = Arc::clone(&self.sinks);
        let toasts = Arc::clone(&self.toasts);
        toast.Dismissed(&TypedEventHandler::<ToastNotification, ToastDismissedEventArgs>::new(
            move |_, args| {
                let reason = args
                    .as_ref()
                    .and_then(|args| args.Reason().ok())
                    .map_or(FAILED_REASON, |reason| {
                        u32::try_from(reason.0).unwrap_or(FAILED_REASON)
                    });
                toasts.lock().remove(&handle);
                if let Some(sink) = &sinks.lock().closed {
                    sink.closed(handle, reason);
                }
                Ok(())
            },
        ))?;

        let sinks = Arc::clone(&self.sinks);
        let toasts = Arc::clone(&self.toasts);
        toast.Failed(&TypedEventHandler::<ToastNotification, ToastFailedEventArgs>::new(
            move |_, args| {
                let code = args.as_ref().and_then(|args| args.ErrorCode().ok());
                tracing::warn!(target: targets::BACKEND, ?handle, ?code, "toast failed to display");
                toasts.lock().remove(&handle);
                if let Some(sink) = &sinks.lock().closed {
                    sink.closed(handle, FAILED_REASON);
                }
                Ok(())
            },
        ))?;
        Ok(())
    }
}

fn xml_document(notification: &Notification) -> Result<XmlDocument, TransportError> {
    let document = XmlDocument::new()?;
    document.LoadXml(&HSTRING::from(toast_xml(notification)))?;
    Ok(document)
}

fn win_date_time(at: DateTime<Utc>) -> WinDateTime {
    WinDateTime {
        UniversalTime: universal_time(at),
    }
}

fn date_reference(at: DateTime<Utc>) -> Result<IReference<WinDateTime>, TransportError> {
    Ok(PropertyValue::CreateDateTime(win_date_time(at))?.cast::<IReference<WinDateTime>>()?)
}

fn expiration_after(timeout: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|timeout| Utc::now().checked_add_signed(timeout))
}

#[async_trait]
impl NotificationTransport for ToastTransport {
    type Handle = ToastHandle;
    type ScheduleHandle = ScheduledToastHandle;

    fn name(&self) -> &'static str {
        "toast"
    }

    async fn initialize(&self) -> Result<Capabilities, TransportError> {
        if self.notifier.get().is_none() {
            let notifier = ToastNotificationManager::CreateToastNotifierWithId(&HSTRING::from(
                self.app_user_model_id.as_str(),
            ))
            .map_err(|e| TransportError::Connection(e.message().to_string()))?;
            let _ = self.notifier.set(notifier);
        }
        tracing::debug!(target: targets::BACKEND, aumid = %self.app_user_model_id, "toast notifier created");
        Ok(Capabilities::toast())
    }

    async fn show(
        &self,
        _context: &ApplicationContext,
        notification: &Notification,
        timeout: Option<Duration>,
    ) -> Result<ToastHandle, TransportError> {
        let notifier = self.notifier()?;
        let toast = ToastNotification::CreateToastNotification(&xml_document(notification)?)?;
        if let Some(expiration) = timeout.and_then(expiration_after) {
            toast.SetExpirationTime(&date_reference(expiration)?)?;
        }

        let handle = ToastHandle(self.next_id());
        self.attach_handlers(&toast, handle)?;
        self.toasts.lock().insert(handle, toast.clone());

        if let Err(e) = notifier.Show(&toast) {
            self.toasts.lock().remove(&handle);
            return Err(TransportError::call("Show", e.message()));
        }
        Ok(handle)
    }

    async fn close(&self, handle: &ToastHandle) -> Result<(), TransportError> {
        let toast = self.toasts.lock().get(handle).cloned();
        if let Some(toast) = toast {
            self.notifier()?
                .Hide(&toast)
                .map_err(|e| TransportError::call("Hide", e.message()))?;
        }
        Ok(())
    }

    fn supports_native_scheduling(&self) -> bool {
        true
    }

    async fn schedule(
        &self,
        _context: &ApplicationContext,
        notification: &Notification,
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<ScheduledToastHandle, TransportError> {
        let notifier = self.notifier()?;
        let scheduled = ScheduledToastNotification::CreateScheduledToastNotification(
            &xml_document(notification)?,
            win_date_time(delivery),
        )?;
        if let Some(expiration) = expiration {
            scheduled.SetExpirationTime(&date_reference(expiration)?)?;
        }
        notifier
            .AddToSchedule(&scheduled)
            .map_err(|e| TransportError::call("AddToSchedule", e.message()))?;

        let handle = ScheduledToastHandle(self.next_id());
        {
            let mut pending = self.scheduled.lock();
            prune_delivered(&mut pending, Utc::now(), |toast| toast.delivery);
            pending.insert(
                handle,
                PendingToast {
                    toast: scheduled,
                    delivery,
                },
            );
        }
        Ok(handle)
    }

    async fn unschedule(&self, handle: &ScheduledToastHandle) -> Result<(), TransportError> {
        let pending = self.scheduled.lock().remove(handle);
        if let Some(pending) = pending {
            if pending.delivery <= Utc::now() {
                tracing::trace!(target: targets::BACKEND, ?handle, "scheduled toast already delivered");
                return Ok(());
            }
            self.notifier()?
                .RemoveFromSchedule(&pending.toast)
                .map_err(|e| TransportError::call("RemoveFromSchedule", e.message()))?;
        }
        Ok(())
    }

    async fn watch_closed(
        &self,
        sink: EventSink<ToastHandle>,
    ) -> Result<Subscription, TransportError> {
        self.sinks.lock().closed = Some(sink);
        let sinks = Arc::clone(&self.sinks);
        Ok(Subscription::on_drop(move || sinks.lock().closed = None))
    }

    async fn watch_action_invoked(
        &self,
        sink: EventSink<ToastHandle>,
    ) -> Result<Subscription, TransportError> {
        self.sinks.lock().activated = Some(sink);
        let sinks = Arc::clone(&self.sinks);
        Ok(Subscription::on_drop(move || sinks.lock().activated = None))
    }

    fn dismiss_cause(&self, raw_reason: u32) -> DismissCause {
        DismissCause::from_toast(raw_reason)
    }

    async fn launch_action(&self) -> Option<String> {
        launch_action_from_args(std::env::args())
    }
}

impl std::fmt::Debug for ToastTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastTransport")
            .field("app_user_model_id", &self.app_user_model_id)
            .field("toasts", &self.toasts.lock().len())
            .field("scheduled", &self.scheduled.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_before_initialize_fail() {
        let transport = ToastTransport::new("Horizon.Test");
        assert!(matches!(
            transport.notifier(),
            Err(TransportError::Connection(_))
        ));
        assert!(transport.supports_native_scheduling());
        assert_eq!(transport.dismiss_cause(2), DismissCause::Expired);
        assert_eq!(transport.dismiss_cause(FAILED_REASON), DismissCause::Unknown);
    }

    #[test]
    fn test_prune_delivered() {
        let now = Utc::now();
        let mut scheduled = HashMap::from([
            (1, now - chrono::Duration::seconds(1)),
            (2, now),
            (3, now + chrono::Duration::seconds(1)),
        ]);
        assert_eq!(prune_delivered(&mut scheduled, now, |delivery| *delivery), 2);
        assert_eq!(scheduled.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_expiration_after() {
        let before = Utc::now();
        let expiration = expiration_after(Duration::from_secs(60)).unwrap();
        assert!(expiration >= before + chrono::Duration::seconds(60));
        assert!(expiration_after(Duration::MAX).is_none());
    }
}
