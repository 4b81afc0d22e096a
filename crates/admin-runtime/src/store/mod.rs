//! # Reactive Store
//!
//! The single source of truth for state that more than one UI region reads: current
//! product, its category selection, bulk-assignment selections, active page.
//!
//! Every mutation goes through [`ReactiveStore::set`], which:
//!
//! 1. applies the change in memory as one transition,
//! 2. writes the persisted snapshot to [`Storage`] (unless autosave is paused or nothing changed),
//! 3. calls every subscriber, in registration order, with the full new state.
//!
//! A failing or panicking subscriber is logged and skipped; the rest are still called.
//!
//! ## Autosave
//!
//! Bulk operations (select all visible products, say) pause autosave so each toggle does not
//! hit storage. [`pause_autosave`](ReactiveStore::pause_autosave) returns a guard; when the
//! last guard is dropped the store writes once, capturing the final state. Pausing batches
//! writes, not notifications.

pub mod selection;
pub mod state;
pub mod storage;

pub use selection::*;
pub use state::*;
pub use storage::*;

use crate::error::{StoreError, SubscriberError};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Storage key used when none is configured.
pub const DEFAULT_STATE_KEY: &str = "category_admin.state";

type Subscriber = Arc<dyn Fn(&AppState) -> Result<(), SubscriberError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    key: String,
    storage: Arc<dyn Storage>,
    state: Mutex<AppState>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
    paused: Mutex<usize>,
    dirty: AtomicBool,
}

/// Persisted, observable application state. Clones share the same state.
#[derive(Clone)]
pub struct ReactiveStore {
    inner: Arc<Inner>,
}

impl ReactiveStore {
    /// Load the state saved under `key`, or start from defaults when it is missing or corrupt.
    pub fn load(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let state = match storage.read(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Snapshot>(&raw) {
                Ok(snapshot) => {
                    debug!(key, timestamp = snapshot.timestamp, "Restored state");
                    AppState::from(snapshot)
                }
                Err(e) => {
                    warn!(key, error = %e, "Stored state is corrupt, using defaults");
                    AppState::default()
                }
            },
            Ok(None) => AppState::default(),
            Err(e) => {
                warn!(key, error = %e, "Could not read stored state, using defaults");
                AppState::default()
            }
        };

        Self {
            inner: Arc::new(Inner {
                key,
                storage,
                state: Mutex::new(state),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                paused: Mutex::new(0),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AppState {
        lock(&self.inner.state).clone()
    }

    /// Read from the current state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&lock(&self.inner.state))
    }

    /// Apply one change, persist, and notify subscribers.
    ///
    /// Subscribers are called for every change. A change that leaves the state as it was is
    /// not written to storage.
    pub fn set(&self, change: StateChange) {
        let key = change.key();
        let persisted = change.is_persisted();
        let (changed, snapshot) = {
            let mut state = lock(&self.inner.state);
            let changed = state.apply(change);
            (changed, state.clone())
        };
        debug!(key, changed, "State set");

        if persisted && changed {
            self.inner.dirty.store(true, Ordering::SeqCst);
            if !self.autosave_paused() {
                if let Err(e) = self.flush() {
                    warn!(key, error = %e, "Failed to persist state");
                }
            }
        }
        self.notify(&snapshot);
    }

    /// Register a subscriber. It is called after every change with the full state.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&AppState) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.subscribers).push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Write the current state to storage now.
    pub fn flush(&self) -> Result<(), StoreError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let raw = serde_json::to_string(&self.read(|s| s.to_snapshot(timestamp)))?;
        self.inner.storage.write(&self.inner.key, &raw)?;
        self.inner.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Stop writing to storage on each change. Must be balanced by [`enable_autosave`].
    ///
    /// Prefer [`pause_autosave`](Self::pause_autosave), which cannot be left unbalanced.
    ///
    /// [`enable_autosave`]: Self::enable_autosave
    pub fn disable_autosave(&self) {
        *lock(&self.inner.paused) += 1;
    }

    /// Resume autosave. The outermost resume writes the final state exactly once.
    pub fn enable_autosave(&self) {
        let resumed = {
            let mut paused = lock(&self.inner.paused);
            if *paused == 0 {
                return;
            }
            *paused -= 1;
            *paused == 0
        };
        if resumed {
            if let Err(e) = self.flush() {
                warn!(key = %self.inner.key, error = %e, "Failed to persist state on resume");
            }
        }
    }

    pub fn pause_autosave(&self) -> AutosavePause {
        self.disable_autosave();
        AutosavePause {
            store: self.clone(),
        }
    }

    pub fn autosave_paused(&self) -> bool {
        *lock(&self.inner.paused) > 0
    }

    /// Whether a persisted change has not reached storage yet.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    // --- Convenience mutators ---

    pub fn set_current_product(&self, product_id: Option<String>) {
        self.set(StateChange::CurrentProduct(product_id));
    }

    pub fn set_page(&self, page: Page) {
        self.set(StateChange::CurrentPage(page));
    }

    pub fn set_hide_allocated(&self, hide: bool) {
        self.set(StateChange::HideAllocatedProducts(hide));
    }

    pub fn set_last_bulk_category(&self, category: Option<BulkCategorySelection>) {
        self.set(StateChange::LastSelectedBulkCategory(category));
    }

    pub fn set_statistics(&self, statistics: ProductStatistics) {
        self.set(StateChange::Statistics(Some(statistics)));
    }

    pub fn bump_category_revision(&self) {
        let next = self.read(|s| s.category_revision) + 1;
        self.set(StateChange::CategoryRevision(next));
    }

    /// Returns whether the product is selected afterwards.
    pub fn toggle_bulk_product(&self, product_id: &str) -> bool {
        let mut selected = self.read(|s| s.bulk_selected_products.clone());
        let now_selected = if selected.remove(product_id) {
            false
        } else {
            selected.insert(product_id.to_string());
            true
        };
        self.set(StateChange::BulkSelectedProducts(selected));
        now_selected
    }

    /// Select every product in `product_ids`, writing to storage once at the end.
    pub fn select_all_bulk<'a>(&self, product_ids: impl IntoIterator<Item = &'a str>) {
        let _pause = self.pause_autosave();
        for id in product_ids {
            if !self.read(|s| s.bulk_selected_products.contains(id)) {
                self.toggle_bulk_product(id);
            }
        }
    }

    pub fn clear_bulk_selection(&self) {
        self.set(StateChange::BulkSelectedProducts(BTreeSet::new()));
    }

    fn notify(&self, snapshot: &AppState) {
        let subscribers: Vec<_> = lock(&self.inner.subscribers).clone();
        for (id, subscriber) in subscribers {
            match std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(subscription = id.0, error = %e, "Subscriber failed"),
                Err(_) => warn!(subscription = id.0, "Subscriber panicked"),
            }
        }
    }
}

/// Resumes autosave (and writes once, if it was the outermost pause) when dropped.
pub struct AutosavePause {
    store: ReactiveStore,
}

impl Drop for AutosavePause {
    fn drop(&mut self) {
        self.store.enable_autosave();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    impl Storage for CountingStorage {
        fn read(&self, key: &str) -> std::io::Result<Option<String>> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> std::io::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> std::io::Result<()> {
            self.inner.remove(key)
        }
    }

    fn store() -> (ReactiveStore, Arc<CountingStorage>) {
        let storage = Arc::new(CountingStorage::default());
        (ReactiveStore::load(storage.clone(), DEFAULT_STATE_KEY), storage)
    }

    #[test]
    fn test_product_change_clears_selection_in_one_notification() {
        let (store, _) = store();
        store.set_current_product(Some("p1".into()));
        store.set(StateChange::SelectedCategories(
            ["a".to_string(), "b".to_string()].into_iter().collect(),
        ));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |state| {
            sink.lock().unwrap().push(state.clone());
            Ok(())
        });

        store.set_current_product(Some("p2".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].current_product_id.as_deref(), Some("p2"));
        assert!(seen[0].selected_categories.is_empty());
    }

    #[test]
    fn test_same_product_keeps_selection() {
        let (store, _) = store();
        store.set_current_product(Some("p1".into()));
        store.set(StateChange::SelectedCategories(["a".to_string()].into_iter().collect()));
        store.set_current_product(Some("p1".into()));
        assert_eq!(store.snapshot().selected_categories.len(), 1);
    }

    #[test]
    fn test_failing_subscribers_are_isolated() {
        let (store, _) = store();
        let calls = Arc::new(AtomicUsize::new(0));

        store.subscribe(|_| Err("first broke".into()));
        store.subscribe(|_| panic!("second broke"));
        let counter = calls.clone();
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        store.set_page(Page::BulkAssign);
        store.set_hide_allocated(true);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscribers_called_in_registration_order() {
        let (store, _) = store();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            store.subscribe(move |_| {
                order.lock().unwrap().push(n);
                Ok(())
            });
        }
        store.set_hide_allocated(true);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unchanged_set_notifies_without_writing() {
        let (store, storage) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        store.set_hide_allocated(true);
        store.set_hide_allocated(true);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let (store, _) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        store.set_hide_allocated(true);
        assert!(store.unsubscribe(id));
        store.set_hide_allocated(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_paused_autosave_writes_once() {
        let (store, storage) = store();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        store.select_all_bulk(["p1", "p2", "p3", "p4"]);

        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 4);
        assert!(!store.is_dirty());

        let reloaded = ReactiveStore::load(storage.clone(), DEFAULT_STATE_KEY);
        assert_eq!(reloaded.snapshot().bulk_selected_products.len(), 4);
    }

    #[test]
    fn test_nested_pauses_flush_at_outermost() {
        let (store, storage) = store();
        let outer = store.pause_autosave();
        {
            let _inner = store.pause_autosave();
            store.toggle_bulk_product("p1");
        }
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
        assert!(store.is_dirty());
        drop(outer);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_round_trip_through_storage() {
        let (store, storage) = store();
        store.set_current_product(Some("SKU-1".into()));
        store.set(StateChange::SelectedCategories(
            ["Shoes".to_string(), "Boots".to_string()].into_iter().collect(),
        ));
        store.set_hide_allocated(true);
        store.set_last_bulk_category(Some(BulkCategorySelection {
            id: "Boots".into(),
            name: "Boots".into(),
            level: 2,
        }));
        store.toggle_bulk_product("SKU-9");
        store.set_page(Page::BulkAssign);
        store.set_statistics(ProductStatistics::default());

        let reloaded = ReactiveStore::load(storage, DEFAULT_STATE_KEY).snapshot();
        let mut expected = store.snapshot();
        expected.statistics = None;
        assert_eq!(reloaded, expected);
    }

    #[test]
    fn test_corrupt_storage_falls_back_to_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(DEFAULT_STATE_KEY, "{not json").unwrap();
        let store = ReactiveStore::load(storage, DEFAULT_STATE_KEY);
        assert_eq!(store.snapshot(), AppState::default());
    }

    #[test]
    fn test_transient_fields_are_not_written() {
        let (store, storage) = store();
        store.bump_category_revision();
        store.set_statistics(ProductStatistics::default());
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
        assert_eq!(store.snapshot().category_revision, 1);
    }
}
