//! Core systems for Horizon Notify.
//!
//! This crate provides the shared infrastructure the notification crate is
//! built on:
//!
//! - **Signal/Slot System**: Type-safe event delivery with per-slot fault isolation
//! - **Async Runtime**: Tokio runtime management and cooperative cancellation
//! - **Logging**: Tracing targets and performance spans
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_notify_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

pub mod async_runtime;
mod error;
pub mod logging;
pub mod signal;

pub use async_runtime::{
    AsyncCancellationToken, AsyncRuntime, AsyncRuntimeConfig, AsyncSpawner, AsyncTaskHandle,
};
pub use error::{AsyncRuntimeError, SignalError};
pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
