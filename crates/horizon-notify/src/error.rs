//! Error types for notification operations.

use chrono::{DateTime, Utc};

/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Errors surfaced by [`NotificationService`](crate::NotificationService).
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Caller-supplied timestamps violate ordering. Never retried.
    #[error("invalid timing for {field}: {reason}")]
    InvalidTiming {
        /// The offending parameter (`expiration_time` or `delivery_time`).
        field: &'static str,
        /// Human readable description of the violated constraint.
        reason: String,
    },

    /// Backend communication failure. Not retried internally.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend handed out a handle that is already live.
    #[error("backend reused live handle {0}")]
    DuplicateHandle(String),

    /// An operation was attempted before [`initialize`](crate::NotificationService::initialize).
    #[error("notification service is not initialized; call initialize() first")]
    NotInitialized,

    /// The application identity could not be determined.
    #[error("application context error: {0}")]
    Context(String),
}

impl NotificationError {
    /// Create an expiration timing error.
    pub(crate) fn expiration_in_past(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::InvalidTiming {
            field: "expiration_time",
            reason: format!("{expiration} is earlier than the current time {now}"),
        }
    }

    /// Create a delivery timing error for a delivery time in the past.
    pub(crate) fn delivery_in_past(delivery: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::InvalidTiming {
            field: "delivery_time",
            reason: format!("{delivery} is earlier than the current time {now}"),
        }
    }

    /// Create a delivery timing error for a delivery after expiration.
    pub(crate) fn delivery_after_expiration(
        delivery: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self::InvalidTiming {
            field: "delivery_time",
            reason: format!("{delivery} is later than the expiration time {expiration}"),
        }
    }

    /// Returns true if this error was caused by invalid caller timestamps.
    pub fn is_invalid_timing(&self) -> bool {
        matches!(self, Self::InvalidTiming { .. })
    }
}

/// Backend transport failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Could not reach the notification subsystem.
    #[error("connection error: {0}")]
    Connection(String),
    /// A call into the notification subsystem failed.
    #[error("backend call `{method}` failed: {message}")]
    Call {
        /// The backend operation that failed.
        method: &'static str,
        /// Error reported by the backend.
        message: String,
    },
    /// The backend does not support the requested operation.
    #[error("unsupported by this backend: {0}")]
    Unsupported(&'static str),
    /// I/O error (e.g. spawning a helper process).
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Create a call error.
    pub fn call(method: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Call {
            method,
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<zbus::Error> for TransportError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::Address(msg) => Self::Connection(msg),
            zbus::Error::InputOutput(io) => Self::Connection(io.to_string()),
            other => Self::Call {
                method: "dbus",
                message: other.to_string(),
            },
        }
    }
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for TransportError {
    fn from(err: windows::core::Error) -> Self {
        Self::Call {
            method: "winrt",
            message: err.message().to_string(),
        }
    }
}

/// Internal registry failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The handle is already registered to a live entry.
    #[error("handle {0} is already registered")]
    DuplicateHandle(String),
}

impl From<RegistryError> for NotificationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateHandle(handle) => Self::DuplicateHandle(handle),
        }
    }
}
