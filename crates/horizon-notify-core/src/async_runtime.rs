//! Tokio runtime used for backend event forwarding and delayed delivery.
//!
//! Notification backends report events asynchronously and emulated
//! scheduling needs a timer that never blocks the caller. Both run on a Tokio
//! runtime: the caller's own runtime when there is one, otherwise a lazily
//! created global runtime owned by this module.
//!
//! # Example: Cancelling a Delayed Task
//!
//! ```no_run
//! use std::time::Duration;
//! use horizon_notify_core::async_runtime::AsyncRuntime;
//!
//! let runtime = AsyncRuntime::global();
//!
//! let (task, token) = runtime.spawner().spawn_cancellable(|token| async move {
//!     tokio::select! {
//!         _ = token.cancelled() => false,
//!         _ = tokio::time::sleep(Duration::from_secs(10)) => true,
//!     }
//! });
//!
//! token.cancel();
//! let delivered = runtime.handle().block_on(task.into_join_handle());
//! assert_eq!(delivered.ok(), Some(false));
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::AsyncRuntimeError;
use crate::{notify_debug, notify_trace};

static GLOBAL_RUNTIME: OnceLock<AsyncRuntime> = OnceLock::new();

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Configuration for a notification runtime.
#[derive(Debug, Clone)]
pub struct AsyncRuntimeConfig {
    /// Worker thread count. `None` lets Tokio pick one per core.
    pub worker_threads: Option<usize>,
    /// Name given to runtime threads.
    pub thread_name: String,
}

impl Default for AsyncRuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: Some(1),
            thread_name: "horizon-notify".to_string(),
        }
    }
}

impl AsyncRuntimeConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Let Tokio choose the worker thread count.
    pub fn with_default_worker_threads(mut self) -> Self {
        self.worker_threads = None;
        self
    }

    /// Set the thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// A spawned task.
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct AsyncTaskHandle<T> {
    id: u64,
    join: JoinHandle<T>,
}

impl<T> AsyncTaskHandle<T> {
    /// Unique task id, used in log output.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the task at its next await point.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Detach from the task, returning the underlying Tokio handle.
    pub fn into_join_handle(self) -> JoinHandle<T> {
        self.join
    }
}

/// A cancellation token for async tasks.
///
/// Supports both polling via [`is_cancelled`](Self::is_cancelled) and async
/// waiting via [`cancelled`](Self::cancelled). Clones share state.
#[derive(Debug, Clone)]
pub struct AsyncCancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: tokio::sync::Notify,
}

impl AsyncCancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                notify: tokio::sync::Notify::new(),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake every waiter.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // cancel cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for AsyncCancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns tasks onto a Tokio runtime.
///
/// Cheap to clone; every clone targets the same runtime.
#[derive(Debug, Clone)]
pub struct AsyncSpawner {
    handle: Handle,
}

impl AsyncSpawner {
    /// Spawn onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawn onto the caller's runtime, or the global one outside of a runtime.
    pub fn current_or_global() -> Self {
        Self::new(AsyncRuntime::current_or_global())
    }

    /// The runtime tasks are spawned onto.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn a task.
    pub fn spawn<F, T>(&self, future: F) -> AsyncTaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        notify_trace!(task_id = id, "spawning task");
        AsyncTaskHandle {
            id,
            join: self.handle.spawn(future),
        }
    }

    /// Spawn a task that receives a cancellation token.
    ///
    /// The task should await `token.cancelled()` alongside its work.
    pub fn spawn_cancellable<F, Fut, T>(&self, f: F) -> (AsyncTaskHandle<T>, AsyncCancellationToken)
    where
        F: FnOnce(AsyncCancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = AsyncCancellationToken::new();
        let task = self.spawn(f(token.clone()));
        (task, token)
    }
}

/// An owned multi-threaded Tokio runtime.
pub struct AsyncRuntime {
    runtime: Runtime,
}

impl AsyncRuntime {
    /// The global runtime, created with [`AsyncRuntimeConfig::default`] on
    /// first use.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to create runtime threads.
    pub fn global() -> &'static AsyncRuntime {
        GLOBAL_RUNTIME.get_or_init(|| {
            AsyncRuntime::new(AsyncRuntimeConfig::default())
                .unwrap_or_else(|e| panic!("cannot start notification runtime: {e}"))
        })
    }

    /// Install a custom global runtime.
    ///
    /// Must run before anything calls [`global`](Self::global).
    pub fn init_global(
        config: AsyncRuntimeConfig,
    ) -> Result<&'static AsyncRuntime, AsyncRuntimeError> {
        let runtime = AsyncRuntime::new(config)?;
        GLOBAL_RUNTIME
            .set(runtime)
            .map_err(|_| AsyncRuntimeError::AlreadyInitialized)?;
        Ok(Self::global())
    }

    /// Handle to the Tokio runtime the caller is running on, falling back to
    /// the global runtime when called outside of one.
    pub fn current_or_global() -> Handle {
        match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                notify_debug!("no ambient tokio runtime, using the global runtime");
                Self::global().handle().clone()
            }
        }
    }

    /// Create a runtime.
    pub fn new(config: AsyncRuntimeConfig) -> Result<Self, AsyncRuntimeError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(&config.thread_name).enable_all();
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }

        let runtime = builder
            .build()
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?;
        Ok(Self { runtime })
    }

    /// Handle to the underlying Tokio runtime.
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// A spawner targeting this runtime.
    pub fn spawner(&self) -> AsyncSpawner {
        AsyncSpawner::new(self.handle().clone())
    }
}

impl std::fmt::Debug for AsyncRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRuntime")
            .field("flavor", &self.handle().runtime_flavor())
            .finish_non_exhaustive()
    }
}
