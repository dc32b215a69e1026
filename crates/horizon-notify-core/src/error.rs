//! Error types for Horizon Notify core systems.

/// Signal-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// One or more connected slots panicked during emission.
    #[error("{count} slot(s) panicked during emission")]
    SlotPanicked {
        /// Number of slots that panicked.
        count: usize,
    },
}

/// Errors that can occur when managing the async runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncRuntimeError {
    /// The global runtime has already been initialized.
    #[error("Global async runtime has already been initialized")]
    AlreadyInitialized,
    /// Failed to create the runtime.
    #[error("Failed to create async runtime: {0}")]
    CreationFailed(String),
}
