//! Cross-platform desktop notifications for Horizon applications.
//!
//! This crate shows, schedules and hides OS notifications and reports what
//! the user did with them:
//!
//! - **Linux**: the freedesktop notification daemon over D-Bus
//! - **Windows**: toast notifications through WinRT
//! - **macOS**: `display notification` through `osascript`
//!
//! Each backend identifies notifications its own way (a daemon id, a toast
//! object, nothing at all). The service keeps a bidirectional map between
//! those handles and your own `Arc<Notification>` values, so every event is
//! reported against the notification you showed.
//!
//! # Quick Start
//!
//! ```no_run
//! use horizon_notify::{DismissCause, Notification, PlatformNotificationService};
//!
//! # async fn run() -> horizon_notify::Result<()> {
//! let service = PlatformNotificationService::for_current_platform()?;
//! let capabilities = service.initialize().await?;
//!
//! service.notification_dismissed().connect(|event| {
//!     if event.cause == DismissCause::User {
//!         println!("user closed {:?}", event.notification.title);
//!     }
//! });
//!
//! let reminder = Notification::new()
//!     .title("Stand-up")
//!     .body("Starts in 5 minutes")
//!     .button("Join", "join")
//!     .into_shared();
//!
//! let in_a_minute = chrono::Utc::now() + chrono::Duration::minutes(1);
//! service.schedule_notification(&reminder, in_a_minute, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! - [`NotificationActivated`]: a notification or one of its buttons was
//!   clicked. A plain click reports the action id `"default"`.
//! - [`NotificationDismissed`]: a shown notification closed, with a
//!   normalized [`DismissCause`]. Raised exactly once per display.
//!
//! Slots run on the event routing task. A panicking slot is logged and does
//! not affect other slots or later events.
//!
//! # Scheduling
//!
//! Windows schedules natively. Elsewhere delivery is emulated by a timer on
//! the Tokio runtime and only happens while the service is alive. Hiding a
//! scheduled notification before its delivery time guarantees it is never
//! shown.

pub mod backend;
mod capabilities;
mod context;
mod error;
mod event;
mod notification;
pub mod registry;
pub mod router;
mod scheduling;
mod service;
mod transport;

pub use backend::PlatformTransport;
pub use capabilities::Capabilities;
pub use context::ApplicationContext;
pub use error::{NotificationError, RegistryError, Result, TransportError};
pub use event::{
    BackendEvent, DEFAULT_ACTION_ID, DismissCause, EventSink, NotificationActivated,
    NotificationDismissed, normalize_action_id,
};
pub use notification::{DEFAULT_IMAGE_ALT_TEXT, Notification, NotificationButton, Urgency};
pub use registry::NotificationRegistry;
pub use router::EventRouter;
pub use scheduling::SchedulingPolicy;
pub use service::{
    DEFAULT_LAUNCH_ACTION_WAIT, NotificationService, NotificationServiceConfig,
    PlatformNotificationService,
};
pub use transport::{NotificationTransport, Subscription};

pub use horizon_notify_core::{ConnectionGuard, ConnectionId, Signal};
