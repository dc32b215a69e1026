//! The notification service.
//!
//! [`NotificationService`] wires a [`NotificationTransport`] to the
//! [`NotificationRegistry`], the [`EventRouter`] and the
//! [`SchedulingPolicy`]. It is the only type most applications use.
//!
//! # Example
//!
//! ```no_run
//! use horizon_notify::{Notification, PlatformNotificationService};
//!
//! # async fn run() -> horizon_notify::Result<()> {
//! let service = PlatformNotificationService::for_current_platform()?;
//! service.initialize().await?;
//!
//! service.notification_activated().connect(|event| {
//!     println!("{} -> {}", event.notification.title, event.action_id);
//! });
//!
//! let notification = Notification::new()
//!     .title("Build finished")
//!     .body("All 42 tests passed")
//!     .button("Open log", "open-log")
//!     .into_shared();
//! service.show_notification(&notification, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! Every operation except [`initialize`](NotificationService::initialize)
//! fails with [`NotificationError::NotInitialized`] until `initialize` has
//! succeeded. [`dispose`](NotificationService::dispose) (also run on drop)
//! tears down backend subscriptions, stops event routing and cancels pending
//! emulated deliveries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use horizon_notify_core::logging::targets;
use horizon_notify_core::{AsyncSpawner, AsyncTaskHandle, PerfSpan, Signal};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use crate::backend::{PlatformTransport, platform_transport};
use crate::capabilities::Capabilities;
use crate::context::ApplicationContext;
use crate::error::{NotificationError, Result};
use crate::event::{EventSink, NotificationActivated, NotificationDismissed};
use crate::notification::Notification;
use crate::registry::{NotificationRegistry, ScheduleKey, ScheduledEntry};
use crate::router::EventRouter;
use crate::scheduling::SchedulingPolicy;
use crate::transport::{NotificationTransport, Subscription};

/// Default bound on waiting for the launch action id.
pub const DEFAULT_LAUNCH_ACTION_WAIT: Duration = Duration::from_millis(5000);

/// Configuration for a [`NotificationService`].
#[derive(Debug, Clone)]
pub struct NotificationServiceConfig {
    /// How long [`initialize`](NotificationService::initialize) waits for the
    /// backend to report the launch action.
    pub launch_action_wait: Duration,
    /// Runtime for event routing and emulated scheduling. `None` uses the
    /// runtime the service is created on, or the global
    /// [`AsyncRuntime`](horizon_notify_core::AsyncRuntime).
    pub runtime: Option<Handle>,
}

impl Default for NotificationServiceConfig {
    fn default() -> Self {
        Self {
            launch_action_wait: DEFAULT_LAUNCH_ACTION_WAIT,
            runtime: None,
        }
    }
}

impl NotificationServiceConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the launch action wait.
    pub fn with_launch_action_wait(mut self, wait: Duration) -> Self {
        self.launch_action_wait = wait;
        self
    }

    /// Run background work on a specific runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Spawner for background work under this configuration.
    pub fn spawner(&self) -> AsyncSpawner {
        self.runtime
            .clone()
            .map_or_else(AsyncSpawner::current_or_global, AsyncSpawner::new)
    }
}

type Registry<T> = NotificationRegistry<
    <T as NotificationTransport>::Handle,
    <T as NotificationTransport>::ScheduleHandle,
>;
type Router<T> = EventRouter<
    <T as NotificationTransport>::Handle,
    <T as NotificationTransport>::ScheduleHandle,
>;

struct ServiceInner<T: NotificationTransport> {
    transport: Arc<T>,
    context: ApplicationContext,
    config: NotificationServiceConfig,
    spawner: AsyncSpawner,
    registry: Arc<Registry<T>>,
    router: Arc<Router<T>>,
    capabilities: OnceCell<Capabilities>,
    launch_action_id: OnceLock<Option<String>>,
    subscriptions: Mutex<Vec<Subscription>>,
    router_task: Mutex<Option<AsyncTaskHandle<()>>>,
    next_emulated_id: AtomicU64,
    disposed: AtomicBool,
}

/// Shows, schedules and hides notifications through a platform backend and
/// raises activation and dismissal signals.
pub struct NotificationService<T: NotificationTransport> {
    inner: Arc<ServiceInner<T>>,
}

impl<T: NotificationTransport> NotificationService<T> {
    /// Create a service with the default configuration.
    pub fn new(transport: T, context: ApplicationContext) -> Self {
        Self::with_config(transport, context, NotificationServiceConfig::default())
    }

    /// Create a service with a custom configuration.
    pub fn with_config(
        transport: T,
        context: ApplicationContext,
        config: NotificationServiceConfig,
    ) -> Self {
        let transport = Arc::new(transport);
        let registry = Arc::new(NotificationRegistry::new());
        let mapper = Arc::clone(&transport);
        let router = Arc::new(EventRouter::new(Arc::clone(&registry), move |raw| {
            mapper.dismiss_cause(raw)
        }));
        let spawner = config.spawner();

        Self {
            inner: Arc::new(ServiceInner {
                transport,
                context,
                config,
                spawner,
                registry,
                router,
                capabilities: OnceCell::new(),
                launch_action_id: OnceLock::new(),
                subscriptions: Mutex::new(Vec::new()),
                router_task: Mutex::new(None),
                next_emulated_id: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Connect to the backend, subscribe to its events and probe capabilities.
    ///
    /// Calling this again after success returns the cached capabilities.
    #[tracing::instrument(skip_all, target = "horizon_notify::service", level = "debug", fields(backend = self.inner.transport.name()))]
    pub async fn initialize(&self) -> Result<Capabilities> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(NotificationError::NotInitialized);
        }
        let inner = &self.inner;
        let capabilities = inner
            .capabilities
            .get_or_try_init(|| inner.connect())
            .await?;
        Ok(*capabilities)
    }

    /// Returns true once [`initialize`](Self::initialize) has succeeded and
    /// the service has not been disposed.
    pub fn is_initialized(&self) -> bool {
        self.inner.capabilities.initialized() && !self.inner.disposed.load(Ordering::Acquire)
    }

    /// Display a notification now.
    ///
    /// # Arguments
    ///
    /// * `notification` - The notification to show; its `Arc` identity is tracked
    /// * `expiration` - When the notification should expire; `None` never expires
    ///
    /// # Errors
    ///
    /// [`NotificationError::InvalidTiming`] if `expiration` is in the past.
    #[tracing::instrument(skip_all, target = "horizon_notify::service", level = "debug")]
    pub async fn show_notification(
        &self,
        notification: &Arc<Notification>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_initialized()?;
        SchedulingPolicy::validate_show(expiration)?;
        self.inner
            .show_now(Arc::clone(notification), expiration)
            .await
    }

    /// Display a notification at `delivery`.
    ///
    /// Backends with native scheduling hand the notification to the OS.
    /// Otherwise delivery is emulated in-process and only happens while the
    /// service is alive.
    ///
    /// # Errors
    ///
    /// [`NotificationError::InvalidTiming`] if `delivery` is in the past or
    /// later than `expiration`.
    #[tracing::instrument(skip_all, target = "horizon_notify::service", level = "debug", fields(%delivery))]
    pub async fn schedule_notification(
        &self,
        notification: &Arc<Notification>,
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.ensure_initialized()?;
        SchedulingPolicy::validate_schedule(delivery, expiration)?;

        let inner = &self.inner;
        if inner.transport.supports_native_scheduling() {
            let handle = inner
                .transport
                .schedule(&inner.context, notification, delivery, expiration)
                .await?;
            inner.registry.register_scheduled(
                ScheduleKey::Native(handle),
                ScheduledEntry::new(Arc::clone(notification), delivery, expiration),
            )?;
            return Ok(());
        }

        ServiceInner::schedule_emulated(inner, Arc::clone(notification), delivery, expiration)
    }

    /// Cancel any pending delivery of a notification and close its newest
    /// display.
    ///
    /// Does nothing if the notification is not tracked.
    #[tracing::instrument(skip_all, target = "horizon_notify::service", level = "debug")]
    pub async fn hide_notification(&self, notification: &Arc<Notification>) -> Result<()> {
        self.ensure_initialized()?;
        let inner = &self.inner;

        let scheduled = inner.registry.take_scheduled_for(notification);
        let shown = inner.registry.find_handle(notification);
        if scheduled.is_none() && shown.is_none() {
            tracing::trace!(target: targets::SERVICE, "hide for untracked notification ignored");
            return Ok(());
        }

        match scheduled {
            Some((ScheduleKey::Emulated(id), entry)) => {
                if let Some(token) = &entry.cancellation {
                    token.cancel();
                }
                tracing::debug!(target: targets::SCHEDULING, id, "emulated delivery cancelled");
            }
            Some((ScheduleKey::Native(handle), _)) => {
                inner.transport.unschedule(&handle).await?;
                tracing::debug!(target: targets::SCHEDULING, ?handle, "native delivery cancelled");
            }
            None => {}
        }

        if let Some(handle) = shown {
            // The backend reports the close, which dismisses the entry.
            inner.transport.close(&handle).await?;
        }
        Ok(())
    }

    /// Signal raised when a notification or one of its buttons is activated.
    pub fn notification_activated(&self) -> &Signal<NotificationActivated> {
        self.inner.router.activated()
    }

    /// Signal raised exactly once when a shown notification is closed.
    pub fn notification_dismissed(&self) -> &Signal<NotificationDismissed> {
        self.inner.router.dismissed()
    }

    /// Capabilities probed during initialization; empty before that.
    pub fn capabilities(&self) -> Capabilities {
        self.inner
            .capabilities
            .get()
            .copied()
            .unwrap_or_default()
    }

    /// The action id that launched the process, if the backend reported one.
    pub fn launch_action_id(&self) -> Option<&str> {
        self.inner
            .launch_action_id
            .get()
            .and_then(|id| id.as_deref())
    }

    /// The application identity this service presents.
    pub fn context(&self) -> &ApplicationContext {
        &self.inner.context
    }

    /// The backend transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// The handle registry.
    pub fn registry(&self) -> &Registry<T> {
        &self.inner.registry
    }

    /// Tear down subscriptions, stop routing and cancel pending deliveries.
    ///
    /// Idempotent; also runs on drop.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _perf = PerfSpan::new("notification_service_dispose");

        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        drop(subscriptions);
        if let Some(task) = self.inner.router_task.lock().take() {
            task.abort();
        }
        self.inner.registry.clear();
        self.inner.router.clear();
        tracing::debug!(target: targets::SERVICE, "notification service disposed");
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(NotificationError::NotInitialized)
        }
    }
}

/// The notification service for the platform this crate is compiled for.
pub type PlatformNotificationService = NotificationService<PlatformTransport>;

impl NotificationService<PlatformTransport> {
    /// Create the platform service for the running executable.
    ///
    /// # Errors
    ///
    /// [`NotificationError::Context`] if the application name cannot be
    /// derived from the executable.
    pub fn for_current_platform() -> Result<Self> {
        let context = ApplicationContext::from_current_process()?;
        Ok(Self::for_context(context))
    }

    /// Create the platform service for an explicit application identity.
    pub fn for_context(context: ApplicationContext) -> Self {
        Self::for_context_with_config(context, NotificationServiceConfig::default())
    }

    /// Create the platform service with a custom configuration.
    ///
    /// The backend forwards its events on the configured runtime.
    pub fn for_context_with_config(
        context: ApplicationContext,
        config: NotificationServiceConfig,
    ) -> Self {
        let transport = platform_transport(&context, config.spawner());
        Self::with_config(transport, context, config)
    }
}

impl<T: NotificationTransport> Drop for NotificationService<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: NotificationTransport> std::fmt::Debug for NotificationService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("backend", &self.inner.transport.name())
            .field("context", &self.inner.context)
            .field("capabilities", &self.capabilities())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl<T: NotificationTransport> ServiceInner<T> {
    async fn connect(&self) -> Result<Capabilities> {
        let capabilities = self.transport.initialize().await?;

        let (sink, events) = EventSink::channel();
        let closed = self.transport.watch_closed(sink.clone()).await?;
        let actions = self.transport.watch_action_invoked(sink).await?;

        let router = Arc::clone(&self.router);
        let task = self.spawner.spawn(async move { router.run(events).await });
        *self.router_task.lock() = Some(task);
        self.subscriptions.lock().extend([closed, actions]);

        let launch_action =
            tokio::time::timeout(self.config.launch_action_wait, self.transport.launch_action())
                .await
                .unwrap_or_else(|_| {
                    tracing::debug!(target: targets::SERVICE, "timed out waiting for launch action");
                    None
                });
        let _ = self.launch_action_id.set(launch_action);

        tracing::info!(
            target: targets::SERVICE,
            backend = self.transport.name(),
            ?capabilities,
            "notification service initialized"
        );
        Ok(capabilities)
    }

    async fn show_now(
        &self,
        notification: Arc<Notification>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let timeout = SchedulingPolicy::remaining_duration(expiration);
        let handle = self
            .transport
            .show(&self.context, &notification, timeout)
            .await
            .inspect_err(|e| {
                tracing::warn!(target: targets::SERVICE, error = %e, "failed to show notification");
            })?;

        if !self.transport.tracks_delivery() {
            return Ok(());
        }
        tracing::debug!(target: targets::SERVICE, ?handle, "notification shown");
        self.router.register_shown(handle, notification)?;
        Ok(())
    }

    fn schedule_emulated(
        this: &Arc<Self>,
        notification: Arc<Notification>,
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let id = this.next_emulated_id.fetch_add(1, Ordering::Relaxed);
        let key = ScheduleKey::Emulated(id);
        let delay = SchedulingPolicy::delay_until(delivery);

        let mut registered = Ok(());
        let inner = Arc::clone(this);
        let (task, token) = this.spawner.spawn_cancellable(|token| {
            // Registered before the task runs so a hide during the wait finds it.
            registered = this.registry.register_scheduled(
                key.clone(),
                ScheduledEntry::new(notification, delivery, expiration)
                    .with_cancellation(token.clone()),
            );
            async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::trace!(target: targets::SCHEDULING, id, "emulated delivery task cancelled");
                    }
                    _ = tokio::time::sleep(delay) => {
                        inner.deliver_emulated(key).await;
                    }
                }
            }
        });
        if registered.is_err() {
            token.cancel();
        }
        registered?;

        tracing::debug!(target: targets::SCHEDULING, id, task_id = task.id(), ?delay, "emulated delivery scheduled");
        Ok(())
    }

    async fn deliver_emulated(&self, key: ScheduleKey<T::ScheduleHandle>) {
        let Some(entry) = self.registry.take_scheduled(&key) else {
            tracing::trace!(target: targets::SCHEDULING, ?key, "scheduled entry already claimed");
            return;
        };
        if entry.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
            return;
        }
        if let Err(e) = SchedulingPolicy::validate_show(entry.expiration) {
            tracing::debug!(target: targets::SCHEDULING, ?key, error = %e, "expired before delivery");
            return;
        }
        if let Err(e) = self.show_now(entry.notification, entry.expiration).await {
            tracing::warn!(target: targets::SCHEDULING, ?key, error = %e, "emulated delivery failed");
        }
    }
}
