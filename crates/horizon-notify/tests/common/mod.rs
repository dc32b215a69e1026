//! In-memory transport and helpers shared by the service tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use horizon_notify::{
    ApplicationContext, Capabilities, EventSink, Notification, NotificationService,
    NotificationServiceConfig, NotificationTransport, Subscription, TransportError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// First handle the fake daemon hands out.
pub const FIRST_HANDLE: u32 = 7;

/// freedesktop "closed by a call to CloseNotification".
pub const REASON_APPLICATION: u32 = 3;

/// A `show` call seen by the fake.
#[derive(Debug, Clone)]
pub struct ShowCall {
    pub handle: u32,
    pub title: String,
    pub timeout: Option<Duration>,
}

/// A `schedule` call seen by the fake.
#[derive(Debug, Clone)]
pub struct ScheduleCall {
    pub handle: u32,
    pub title: String,
    pub delivery: DateTime<Utc>,
    pub expiration: Option<DateTime<Utc>>,
}

/// Observable state of a [`FakeTransport`].
#[derive(Default)]
pub struct FakeState {
    next_handle: AtomicU32,
    pub shows: Mutex<Vec<ShowCall>>,
    pub closes: Mutex<Vec<u32>>,
    pub schedules: Mutex<Vec<ScheduleCall>>,
    pub unschedules: Mutex<Vec<u32>>,
    pub fail_show: AtomicBool,
    closed_sink: Mutex<Option<EventSink<u32>>>,
    action_sink: Mutex<Option<EventSink<u32>>>,
}

impl FakeState {
    /// Simulate the daemon closing a notification.
    pub fn emit_closed(&self, handle: u32, reason: u32) {
        if let Some(sink) = &*self.closed_sink.lock() {
            sink.closed(handle, reason);
        }
    }

    /// Simulate the user invoking an action.
    pub fn emit_action(&self, handle: u32, action_key: &str) {
        if let Some(sink) = &*self.action_sink.lock() {
            sink.action_invoked(handle, action_key);
        }
    }

    pub fn show_count(&self) -> usize {
        self.shows.lock().len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.closed_sink.lock().is_some() && self.action_sink.lock().is_some()
    }
}

/// A transport that records calls and emits events on demand.
pub struct FakeTransport {
    state: Arc<FakeState>,
    native_scheduling: bool,
    launch_action: Option<String>,
    close_during_show: Option<u32>,
}

impl FakeTransport {
    pub fn new() -> (Self, Arc<FakeState>) {
        let state = Arc::new(FakeState {
            next_handle: AtomicU32::new(FIRST_HANDLE),
            ..FakeState::default()
        });
        let transport = Self {
            state: Arc::clone(&state),
            native_scheduling: false,
            launch_action: None,
            close_during_show: None,
        };
        (transport, state)
    }

    pub fn with_native_scheduling(mut self) -> Self {
        self.native_scheduling = true;
        self
    }

    pub fn with_launch_action(mut self, action_id: &str) -> Self {
        self.launch_action = Some(action_id.to_string());
        self
    }

    /// Report every shown notification as closed before `show` returns.
    pub fn with_close_during_show(mut self, reason: u32) -> Self {
        self.close_during_show = Some(reason);
        self
    }

    fn next_handle(&self) -> u32 {
        self.state.next_handle.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationTransport for FakeTransport {
    type Handle = u32;
    type ScheduleHandle = u32;

    fn name(&self) -> &'static str {
        "fake"
    }

    async fn initialize(&self) -> Result<Capabilities, TransportError> {
        Ok(Capabilities::from_server_capabilities(["body", "body-images", "actions"]))
    }

    async fn show(
        &self,
        _context: &ApplicationContext,
        notification: &Notification,
        timeout: Option<Duration>,
    ) -> Result<u32, TransportError> {
        if self.state.fail_show.load(Ordering::SeqCst) {
            return Err(TransportError::call("Notify", "daemon unavailable"));
        }
        let handle = self.next_handle();
        self.state.shows.lock().push(ShowCall {
            handle,
            title: notification.title.clone(),
            timeout,
        });
        if let Some(reason) = self.close_during_show {
            self.state.emit_closed(handle, reason);
            tokio::task::yield_now().await;
        }
        Ok(handle)
    }

    async fn close(&self, handle: &u32) -> Result<(), TransportError> {
        self.state.closes.lock().push(*handle);
        // Like a real daemon, closing produces a close signal.
        self.state.emit_closed(*handle, REASON_APPLICATION);
        Ok(())
    }

    fn supports_native_scheduling(&self) -> bool {
        self.native_scheduling
    }

    async fn schedule(
        &self,
        _context: &ApplicationContext,
        notification: &Notification,
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<u32, TransportError> {
        let handle = self.next_handle();
        self.state.schedules.lock().push(ScheduleCall {
            handle,
            title: notification.title.clone(),
            delivery,
            expiration,
        });
        Ok(handle)
    }

    async fn unschedule(&self, handle: &u32) -> Result<(), TransportError> {
        self.state.unschedules.lock().push(*handle);
        Ok(())
    }

    async fn watch_closed(&self, sink: EventSink<u32>) -> Result<Subscription, TransportError> {
        *self.state.closed_sink.lock() = Some(sink);
        let state = Arc::clone(&self.state);
        Ok(Subscription::on_drop(move || {
            state.closed_sink.lock().take();
        }))
    }

    async fn watch_action_invoked(
        &self,
        sink: EventSink<u32>,
    ) -> Result<Subscription, TransportError> {
        *self.state.action_sink.lock() = Some(sink);
        let state = Arc::clone(&self.state);
        Ok(Subscription::on_drop(move || {
            state.action_sink.lock().take();
        }))
    }

    async fn launch_action(&self) -> Option<String> {
        self.launch_action.clone()
    }
}

/// Install a test log subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build and initialize a service over `transport`.
pub async fn initialized_service(transport: FakeTransport) -> NotificationService<FakeTransport> {
    init_tracing();
    let service = NotificationService::with_config(
        transport,
        ApplicationContext::new("horizon-notify-tests"),
        NotificationServiceConfig::new().with_launch_action_wait(Duration::from_millis(100)),
    );
    service
        .initialize()
        .await
        .expect("fake transport initializes");
    service
}

/// Forward every emission of a signal into a channel.
pub fn record<E>(signal: &horizon_notify::Signal<E>) -> mpsc::UnboundedReceiver<E>
where
    E: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    signal.connect(move |event: &E| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Wait for the next recorded event.
pub async fn next_event<E>(events: &mut mpsc::UnboundedReceiver<E>) -> E {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("signal recorder dropped")
}

/// Shared notification helper.
pub fn notification(title: &str) -> Arc<Notification> {
    Notification::new().title(title).body("body").into_shared()
}
