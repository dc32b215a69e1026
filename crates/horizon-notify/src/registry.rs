//! Bidirectional bookkeeping between backend handles and caller notifications.
//!
//! The registry tracks two sets:
//!
//! - **active**: shown, not yet dismissed notifications, keyed by the backend
//!   handle;
//! - **scheduled**: notifications waiting for delivery, keyed by a
//!   [`ScheduleKey`].
//!
//! Each set has a forward map (key to notification) and a reverse map
//! (notification identity to keys). Both are updated together under one lock,
//! so lookups in either direction never scan.
//!
//! Notification identity is the identity of the `Arc<Notification>`
//! allocation. The registry holds a clone of every tracked `Arc`, so an
//! identity stays unique for as long as it is present in a reverse map.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use horizon_notify_core::AsyncCancellationToken;
use horizon_notify_core::logging::targets;
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::notification::Notification;

/// Reference identity of a shared notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Identity(usize);

impl Identity {
    fn of(notification: &Arc<Notification>) -> Self {
        Identity(Arc::as_ptr(notification) as usize)
    }
}

/// Key of a scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleKey<S> {
    /// Handle returned by a backend's native scheduler.
    Native(S),
    /// Internal id of an emulated (delay-then-show) delivery.
    Emulated(u64),
}

/// A notification waiting for delivery.
#[derive(Debug, Clone)]
pub struct ScheduledEntry {
    /// The caller's notification.
    pub notification: Arc<Notification>,
    /// When the notification should be shown.
    pub delivery: DateTime<Utc>,
    /// When the notification should expire, if ever.
    pub expiration: Option<DateTime<Utc>>,
    /// Cancels the pending delivery task of an emulated entry.
    pub cancellation: Option<AsyncCancellationToken>,
}

impl ScheduledEntry {
    /// Create an entry without an emulation task.
    pub fn new(
        notification: Arc<Notification>,
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            notification,
            delivery,
            expiration,
            cancellation: None,
        }
    }

    /// Attach the cancellation token of an emulated delivery.
    pub fn with_cancellation(mut self, token: AsyncCancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns true if the delivery is emulated in-process.
    pub fn is_emulated(&self) -> bool {
        self.cancellation.is_some()
    }
}

/// Forward and reverse maps for one kind of key.
///
/// The reverse map keeps every live key for an identity in registration
/// order; lookups return the newest.
struct BiMap<K, V> {
    forward: HashMap<K, V>,
    reverse: HashMap<Identity, Vec<K>>,
}

impl<K, V> BiMap<K, V>
where
    K: Clone + Eq + Hash,
{
    fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    fn insert(&mut self, key: K, identity: Identity, value: V) {
        self.reverse.entry(identity).or_default().push(key.clone());
        self.forward.insert(key, value);
    }

    fn remove(&mut self, key: &K, identity_of: impl FnOnce(&V) -> Identity) -> Option<V> {
        let value = self.forward.remove(key)?;
        let identity = identity_of(&value);
        if let Some(keys) = self.reverse.get_mut(&identity) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.reverse.remove(&identity);
            }
        }
        Some(value)
    }

    fn newest_key(&self, identity: Identity) -> Option<K> {
        self.reverse
            .get(&identity)
            .and_then(|keys| keys.last())
            .cloned()
    }

    fn len(&self) -> usize {
        self.forward.len()
    }

    fn remove_where(
        &mut self,
        mut pred: impl FnMut(&K, &V) -> bool,
        identity_of: impl Fn(&V) -> Identity,
    ) -> usize {
        let keys: Vec<K> = self
            .forward
            .iter()
            .filter(|(key, value)| pred(key, value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key, &identity_of);
        }
        keys.len()
    }

    fn clear(&mut self) -> Vec<V> {
        self.reverse.clear();
        self.forward.drain().map(|(_, value)| value).collect()
    }
}

struct RegistryState<H, S> {
    active: BiMap<H, Arc<Notification>>,
    scheduled: BiMap<ScheduleKey<S>, ScheduledEntry>,
}

impl<H, S> RegistryState<H, S>
where
    S: Clone + Eq + Hash,
{
    /// Drop native entries the OS has already delivered.
    ///
    /// Emulated entries are left to their delivery task.
    fn prune_delivered(&mut self, now: DateTime<Utc>) -> usize {
        self.scheduled.remove_where(
            |key, entry| matches!(key, ScheduleKey::Native(_)) && entry.delivery <= now,
            |entry| Identity::of(&entry.notification),
        )
    }
}

/// Thread-safe handle/notification registry.
///
/// Generic over the backend's display handle `H` and native schedule
/// handle `S`. No I/O happens while the internal lock is held.
pub struct NotificationRegistry<H, S> {
    state: Mutex<RegistryState<H, S>>,
}

impl<H, S> Default for NotificationRegistry<H, S>
where
    H: Clone + Eq + Hash + Debug,
    S: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H, S> NotificationRegistry<H, S>
where
    H: Clone + Eq + Hash + Debug,
    S: Clone + Eq + Hash + Debug,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                active: BiMap::new(),
                scheduled: BiMap::new(),
            }),
        }
    }

    /// Record a shown notification.
    ///
    /// Fails if `handle` is already live; an existing entry is never
    /// overwritten.
    pub fn register(
        &self,
        handle: H,
        notification: Arc<Notification>,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if state.active.contains(&handle) {
            return Err(RegistryError::DuplicateHandle(format!("{handle:?}")));
        }
        tracing::trace!(target: targets::REGISTRY, ?handle, "registering notification");
        let identity = Identity::of(&notification);
        state.active.insert(handle, identity, notification);
        Ok(())
    }

    /// Look up the notification shown under `handle`.
    pub fn resolve(&self, handle: &H) -> Option<Arc<Notification>> {
        self.state.lock().active.forward.get(handle).cloned()
    }

    /// Remove and return the notification shown under `handle`.
    ///
    /// Returns `None` if the handle is not live, so removing twice is a no-op.
    pub fn remove(&self, handle: &H) -> Option<Arc<Notification>> {
        let removed = self.state.lock().active.remove(handle, Identity::of);
        if removed.is_some() {
            tracing::trace!(target: targets::REGISTRY, ?handle, "removed notification");
        }
        removed
    }

    /// Find the handle a notification is currently shown under.
    ///
    /// If the same notification is shown more than once, the newest handle
    /// wins.
    pub fn find_handle(&self, notification: &Arc<Notification>) -> Option<H> {
        self.state
            .lock()
            .active
            .newest_key(Identity::of(notification))
    }

    /// Record a notification awaiting delivery.
    ///
    /// Natively scheduled entries whose delivery time has passed are
    /// discarded first.
    pub fn register_scheduled(
        &self,
        key: ScheduleKey<S>,
        entry: ScheduledEntry,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        state.prune_delivered(Utc::now());
        if state.scheduled.contains(&key) {
            return Err(RegistryError::DuplicateHandle(format!("{key:?}")));
        }
        tracing::trace!(
            target: targets::REGISTRY,
            ?key,
            delivery = %entry.delivery,
            "registering scheduled notification"
        );
        let identity = Identity::of(&entry.notification);
        state.scheduled.insert(key, identity, entry);
        Ok(())
    }

    /// Find the schedule key of a pending notification.
    pub fn find_scheduled(&self, notification: &Arc<Notification>) -> Option<ScheduleKey<S>> {
        self.state
            .lock()
            .scheduled
            .newest_key(Identity::of(notification))
    }

    /// Claim a scheduled entry.
    ///
    /// Delivery and cancellation both claim through this method; exactly one
    /// caller receives the entry.
    pub fn take_scheduled(&self, key: &ScheduleKey<S>) -> Option<ScheduledEntry> {
        self.state
            .lock()
            .scheduled
            .remove(key, |entry| Identity::of(&entry.notification))
    }

    /// Claim the newest scheduled entry for a notification.
    ///
    /// Natively scheduled entries that are already delivered are discarded
    /// rather than returned.
    pub fn take_scheduled_for(
        &self,
        notification: &Arc<Notification>,
    ) -> Option<(ScheduleKey<S>, ScheduledEntry)> {
        self.take_scheduled_for_at(notification, Utc::now())
    }

    /// [`take_scheduled_for`](Self::take_scheduled_for) against an explicit
    /// current time.
    pub fn take_scheduled_for_at(
        &self,
        notification: &Arc<Notification>,
        now: DateTime<Utc>,
    ) -> Option<(ScheduleKey<S>, ScheduledEntry)> {
        let mut state = self.state.lock();
        let pruned = state.prune_delivered(now);
        if pruned > 0 {
            tracing::trace!(target: targets::REGISTRY, pruned, "discarded delivered native entries");
        }
        let key = state.scheduled.newest_key(Identity::of(notification))?;
        let entry = state
            .scheduled
            .remove(&key, |entry| Identity::of(&entry.notification))?;
        Some((key, entry))
    }

    /// Number of shown notifications being tracked.
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Number of notifications awaiting delivery.
    pub fn scheduled_count(&self) -> usize {
        self.state.lock().scheduled.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.active.len() == 0 && state.scheduled.len() == 0
    }

    /// Forget everything and cancel pending emulated deliveries.
    pub fn clear(&self) {
        let (active, scheduled) = {
            let mut state = self.state.lock();
            (state.active.clear(), state.scheduled.clear())
        };
        for entry in &scheduled {
            if let Some(token) = &entry.cancellation {
                token.cancel();
            }
        }
        tracing::debug!(
            target: targets::REGISTRY,
            active = active.len(),
            scheduled = scheduled.len(),
            "registry cleared"
        );
    }
}

impl<H, S> std::fmt::Debug for NotificationRegistry<H, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NotificationRegistry")
            .field("active", &state.active.forward.len())
            .field("scheduled", &state.scheduled.forward.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::thread;

    type TestRegistry = NotificationRegistry<u32, Infallible>;

    fn notification(title: &str) -> Arc<Notification> {
        Notification::new().title(title).into_shared()
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = TestRegistry::new();
        let n1 = notification("N1");

        registry.register(7, n1.clone()).unwrap();

        let resolved = registry.resolve(&7).unwrap();
        assert!(Arc::ptr_eq(&resolved, &n1));
        assert_eq!(registry.find_handle(&n1), Some(7));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let registry = TestRegistry::new();
        let n1 = notification("N1");
        let n2 = notification("N2");

        registry.register(7, n1.clone()).unwrap();
        let err = registry.register(7, n2).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateHandle("7".to_string()));

        // The original entry survives.
        assert!(Arc::ptr_eq(&registry.resolve(&7).unwrap(), &n1));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = TestRegistry::new();
        let n1 = notification("N1");
        registry.register(7, n1.clone()).unwrap();

        assert!(registry.remove(&7).is_some());
        assert!(registry.remove(&7).is_none());
        assert!(registry.resolve(&7).is_none());
        assert!(registry.find_handle(&n1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_identical_content_distinct_handles() {
        let registry = TestRegistry::new();
        let a = notification("Same");
        let b = notification("Same");

        registry.register(1, a.clone()).unwrap();
        registry.register(2, b.clone()).unwrap();

        assert_eq!(registry.find_handle(&a), Some(1));
        assert_eq!(registry.find_handle(&b), Some(2));

        registry.remove(&1);
        assert!(registry.find_handle(&a).is_none());
        assert_eq!(registry.find_handle(&b), Some(2));
    }

    #[test]
    fn test_reshow_tracks_newest_handle() {
        let registry = TestRegistry::new();
        let n1 = notification("N1");

        registry.register(1, n1.clone()).unwrap();
        registry.register(2, n1.clone()).unwrap();
        assert_eq!(registry.find_handle(&n1), Some(2));

        // Removing the older display leaves the newer one reachable.
        registry.remove(&1);
        assert_eq!(registry.find_handle(&n1), Some(2));

        registry.register(3, n1.clone()).unwrap();
        registry.remove(&3);
        assert_eq!(registry.find_handle(&n1), Some(2));
    }

    #[test]
    fn test_scheduled_claim_once() {
        let registry = NotificationRegistry::<u32, String>::new();
        let n2 = notification("N2");
        let now = Utc::now();
        let key = ScheduleKey::Native("toast-1".to_string());

        registry
            .register_scheduled(key.clone(), ScheduledEntry::new(n2.clone(), now, None))
            .unwrap();
        assert_eq!(registry.find_scheduled(&n2), Some(key.clone()));

        let entry = registry.take_scheduled(&key).unwrap();
        assert!(Arc::ptr_eq(&entry.notification, &n2));
        assert!(!entry.is_emulated());
        assert!(registry.take_scheduled(&key).is_none());
        assert!(registry.find_scheduled(&n2).is_none());
    }

    #[test]
    fn test_duplicate_schedule_key_rejected() {
        let registry = TestRegistry::new();
        let now = Utc::now();
        registry
            .register_scheduled(
                ScheduleKey::Emulated(1),
                ScheduledEntry::new(notification("a"), now, None),
            )
            .unwrap();
        assert!(
            registry
                .register_scheduled(
                    ScheduleKey::Emulated(1),
                    ScheduledEntry::new(notification("b"), now, None),
                )
                .is_err()
        );
        assert_eq!(registry.scheduled_count(), 1);
    }

    #[test]
    fn test_take_scheduled_for_notification() {
        let registry = TestRegistry::new();
        let n2 = notification("N2");
        let other = notification("other");
        let now = Utc::now();

        registry
            .register_scheduled(
                ScheduleKey::Emulated(4),
                ScheduledEntry::new(n2.clone(), now, Some(now)),
            )
            .unwrap();

        assert!(registry.take_scheduled_for(&other).is_none());
        let (key, entry) = registry.take_scheduled_for(&n2).unwrap();
        assert_eq!(key, ScheduleKey::Emulated(4));
        assert_eq!(entry.expiration, Some(now));
        assert_eq!(registry.scheduled_count(), 0);
    }

    #[test]
    fn test_delivered_native_entries_are_discarded() {
        let registry = NotificationRegistry::<u32, u32>::new();
        let now = Utc::now();
        let delivered = notification("delivered");
        let emulated = notification("emulated");

        registry
            .register_scheduled(
                ScheduleKey::Native(1),
                ScheduledEntry::new(delivered.clone(), now + chrono::Duration::seconds(30), None),
            )
            .unwrap();
        registry
            .register_scheduled(
                ScheduleKey::Emulated(2),
                ScheduledEntry::new(emulated.clone(), now + chrono::Duration::seconds(30), None)
                    .with_cancellation(AsyncCancellationToken::new()),
            )
            .unwrap();

        let later = now + chrono::Duration::minutes(1);
        assert!(registry.take_scheduled_for_at(&delivered, later).is_none());
        assert_eq!(registry.scheduled_count(), 1);
        assert!(registry.find_scheduled(&delivered).is_none());

        // Emulated entries stay until their task claims them.
        let (key, _) = registry.take_scheduled_for_at(&emulated, later).unwrap();
        assert_eq!(key, ScheduleKey::Emulated(2));
    }

    #[test]
    fn test_clear_cancels_emulated_deliveries() {
        let registry = TestRegistry::new();
        let token = AsyncCancellationToken::new();
        registry.register(1, notification("shown")).unwrap();
        registry
            .register_scheduled(
                ScheduleKey::Emulated(1),
                ScheduledEntry::new(notification("pending"), Utc::now(), None)
                    .with_cancellation(token.clone()),
            )
            .unwrap();

        registry.clear();

        assert!(token.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_claim_has_single_winner() {
        let registry = Arc::new(TestRegistry::new());
        registry
            .register_scheduled(
                ScheduleKey::Emulated(9),
                ScheduledEntry::new(notification("race"), Utc::now(), None),
            )
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.take_scheduled(&ScheduleKey::Emulated(9)).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
