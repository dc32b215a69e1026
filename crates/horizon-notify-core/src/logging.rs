//! Logging facilities for Horizon Notify.
//!
//! Horizon Notify uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     // Initialize tracing (you can customize this)
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Filter by subsystem with the constants in [`targets`], for example
//! `RUST_LOG=horizon_notify::router=trace`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_notify_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_notify_core::signal";
    /// Async runtime target.
    pub const ASYNC_RUNTIME: &str = "horizon_notify_core::async_runtime";
    /// Notification service target.
    pub const SERVICE: &str = "horizon_notify::service";
    /// Handle registry target.
    pub const REGISTRY: &str = "horizon_notify::registry";
    /// Backend event routing target.
    pub const ROUTER: &str = "horizon_notify::router";
    /// Delivery scheduling target.
    pub const SCHEDULING: &str = "horizon_notify::scheduling";
    /// Platform backend target.
    pub const BACKEND: &str = "horizon_notify::backend";
    /// Performance spans target.
    pub const PERF: &str = "horizon_notify::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations such as a backend
/// round trip.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_notify::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Macros for common tracing patterns.
///
/// These are thin wrappers around the `tracing` macros with a consistent
/// target.
#[macro_export]
macro_rules! notify_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_notify_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! notify_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_notify_core", $($arg)*)
    };
}
