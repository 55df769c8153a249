//! Core sync engine - construction, commit pipeline and external apply
//!
//! **Responsibilities:**
//! - SyncEngine struct definition and builder
//! - `commit`: the single path every local mutation takes
//! - `apply_external`: the path for remote, cross-tab and storage states
//! - Owned reads and subscriptions
//!
//! The document cell is a `std::sync::Mutex` held only for synchronous
//! steps. Listener notification, remote pushes and broadcasts run after
//! every lock is released.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, Shared};
use menuboard_common::config::{RemoteSettings, DEFAULT_STORAGE_KEY};
use menuboard_common::{normalize, Menu, RestaurantCollection};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, TabChannel};
use crate::hub::{MenuSnapshot, Snapshot, Subscription, SubscriptionHub, Topic};
use crate::reconcile::{LastWriteWins, ReconcilePolicy};
use crate::remote::{RemoteStatus, RemoteSyncClient, RemoteTransport};
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::store::LocalStore;
use crate::views::{self, BoardList, BoardTarget, RestaurantList};

/// Local persistence state of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Not loaded yet
    Uninitialized,
    /// In memory and in the store agree
    Clean,
    /// Changed since the last successful store write
    Dirty,
}

/// What a commit mutator produced
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// The draft passed to the mutator was edited in place
    InPlace,
    /// A whole replacement document
    Replace(RestaurantCollection),
}

impl From<()> for Draft {
    fn from(_: ()) -> Self {
        Draft::InPlace
    }
}

impl From<RestaurantCollection> for Draft {
    fn from(doc: RestaurantCollection) -> Self {
        Draft::Replace(doc)
    }
}

/// Side effects of an external apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Write to the local store
    pub persist: bool,
    /// Publish to other tabs
    pub broadcast: bool,
    /// Apply and notify even when nothing changed
    pub force: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            persist: true,
            broadcast: true,
            force: false,
        }
    }
}

impl ApplyOptions {
    /// A remote round-trip answer, taken as-is even when identical
    pub fn remote_authoritative() -> Self {
        Self {
            persist: true,
            broadcast: true,
            force: true,
        }
    }

    /// A state received from another tab
    pub fn from_broadcast() -> Self {
        Self {
            persist: true,
            broadcast: false,
            force: false,
        }
    }

    /// A state another tab already wrote to the shared store
    pub fn from_storage() -> Self {
        Self {
            persist: false,
            broadcast: false,
            force: false,
        }
    }
}

pub(super) struct DocumentState {
    pub(super) doc: Arc<RestaurantCollection>,
    /// Serialization of `doc`, the no-op comparison baseline
    pub(super) serialized: String,
    pub(super) status: DocumentStatus,
}

pub(super) struct EngineInner {
    pub(super) store: LocalStore,
    pub(super) hub: SubscriptionHub,
    pub(super) broadcaster: Option<Broadcaster>,
    pub(super) remote: Option<RemoteSyncClient>,
    pub(super) policy: Box<dyn ReconcilePolicy>,

    /// Serializes commits and external applies
    pub(super) commit_lock: Mutex<()>,
    pub(super) state: Mutex<DocumentState>,

    pub(super) remote_status: Mutex<RemoteStatus>,
    pub(super) in_flight: Mutex<Option<Shared<BoxFuture<'static, Option<RestaurantCollection>>>>>,
    pub(super) pushes: Mutex<Vec<JoinHandle<()>>>,
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn serialize(doc: &RestaurantCollection) -> String {
    serde_json::to_string(doc).unwrap_or_else(|e| {
        warn!(error = %e, "Unable to serialize document");
        String::new()
    })
}

/// The menu-board state synchronization engine
///
/// Cheap to clone; clones share one document.
#[derive(Clone)]
pub struct SyncEngine {
    pub(super) inner: Arc<EngineInner>,
}

/// Builder for [`SyncEngine`]
pub struct SyncEngineBuilder {
    storage: Option<Arc<dyn KeyValueStorage>>,
    storage_key: String,
    channel: Option<TabChannel>,
    remote: Option<(RemoteSettings, Arc<dyn RemoteTransport>)>,
    policy: Box<dyn ReconcilePolicy>,
}

impl Default for SyncEngineBuilder {
    fn default() -> Self {
        Self {
            storage: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            channel: None,
            remote: None,
            policy: Box::new(LastWriteWins),
        }
    }
}

impl SyncEngineBuilder {
    /// Persistence backend (default: a private [`MemoryStorage`])
    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Join a cross-tab channel
    pub fn channel(mut self, channel: &TabChannel) -> Self {
        self.channel = Some(channel.clone());
        self
    }

    /// Enable remote sync
    pub fn remote(mut self, settings: RemoteSettings, transport: Arc<dyn RemoteTransport>) -> Self {
        self.remote = Some((settings, transport));
        self
    }

    pub fn policy(mut self, policy: impl ReconcilePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Load the stored document and build the engine
    pub fn build(self) -> SyncEngine {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn KeyValueStorage>);
        let store = LocalStore::new(storage, self.storage_key);

        let doc = store.load();
        let state = DocumentState {
            serialized: serialize(&doc),
            doc: Arc::new(doc),
            status: DocumentStatus::Clean,
        };

        let remote = self
            .remote
            .map(|(settings, transport)| RemoteSyncClient::new(settings, transport));
        let remote_status = RemoteStatus {
            enabled: remote.is_some(),
            ..RemoteStatus::default()
        };

        info!(
            key = %store.key(),
            restaurants = state.doc.restaurants.len(),
            remote = remote.is_some(),
            policy = self.policy.name(),
            "Sync engine initialized"
        );

        SyncEngine {
            inner: Arc::new(EngineInner {
                store,
                hub: SubscriptionHub::new(),
                broadcaster: self.channel.map(|channel| channel.endpoint()),
                remote,
                policy: self.policy,
                commit_lock: Mutex::new(()),
                state: Mutex::new(state),
                remote_status: Mutex::new(remote_status),
                in_flight: Mutex::new(None),
                pushes: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Outcome of the locked part of a commit or apply
struct Applied {
    doc: Arc<RestaurantCollection>,
    serialized: String,
}

impl SyncEngine {
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::default()
    }

    /// Engine over a private in-memory store, no remote, no tabs
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    pub(super) fn current(&self) -> Arc<RestaurantCollection> {
        Arc::clone(&lock(&self.inner.state).doc)
    }

    pub(super) fn last_serialized_matches(&self, serialized: &str) -> bool {
        lock(&self.inner.state).serialized == serialized
    }

    // ========================================
    // Commit pipeline
    // ========================================

    /// Apply a local mutation
    ///
    /// The mutator receives an owned copy of the current document and either
    /// edits it in place (returning `()`) or returns a replacement. The
    /// result is normalized; when its serialization equals the current one
    /// nothing is persisted, notified, pushed or broadcast.
    ///
    /// The mutator must not commit on this engine itself.
    pub fn commit<F, R>(&self, mutator: F) -> RestaurantCollection
    where
        F: FnOnce(&mut RestaurantCollection) -> R,
        R: Into<Draft>,
    {
        let applied = {
            let _guard = lock(&self.inner.commit_lock);
            let current = self.current();

            let mut draft = (*current).clone();
            let next = match mutator(&mut draft).into() {
                Draft::InPlace => draft,
                Draft::Replace(doc) => doc,
            }
            .normalized();

            let serialized = serialize(&next);
            if self.last_serialized_matches(&serialized) {
                debug!("Commit produced no change");
                return (*current).clone();
            }

            self.store_and_replace(next, serialized, true)
        };

        self.inner.hub.notify(&applied.doc);
        self.schedule_push(Arc::clone(&applied.doc), applied.serialized.clone());
        self.publish(&applied.serialized);
        (*applied.doc).clone()
    }

    /// Apply a document that originated outside this engine
    ///
    /// Runs the reconcile policy against the local document; external
    /// applies never push to the remote.
    pub fn apply_external(
        &self,
        incoming: RestaurantCollection,
        options: ApplyOptions,
    ) -> RestaurantCollection {
        match self.apply_external_if(incoming, options, None) {
            Some(doc) => doc,
            None => self.snapshot(),
        }
    }

    /// Apply a remote answer to a push of `pushed`
    ///
    /// Dropped (returning `None`) when the document has moved on since the
    /// push was sent, so a late answer cannot undo a newer commit.
    pub(super) fn apply_push_answer(
        &self,
        answer: RestaurantCollection,
        pushed: &str,
    ) -> Option<RestaurantCollection> {
        self.apply_external_if(answer, ApplyOptions::remote_authoritative(), Some(pushed))
    }

    fn apply_external_if(
        &self,
        incoming: RestaurantCollection,
        options: ApplyOptions,
        expected: Option<&str>,
    ) -> Option<RestaurantCollection> {
        let applied = {
            let _guard = lock(&self.inner.commit_lock);
            if let Some(expected) = expected {
                if !self.last_serialized_matches(expected) {
                    debug!("Document changed since the push was sent, answer dropped");
                    return None;
                }
            }
            let current = self.current();

            let merged = self
                .inner
                .policy
                .reconcile(&current, incoming.normalized())
                .normalized();
            let serialized = serialize(&merged);
            if !options.force && self.last_serialized_matches(&serialized) {
                debug!("External state matches the current document, ignoring");
                return Some((*current).clone());
            }

            self.store_and_replace(merged, serialized, options.persist)
        };

        self.inner.hub.notify(&applied.doc);
        if options.broadcast {
            self.publish(&applied.serialized);
        }
        Some((*applied.doc).clone())
    }

    /// Normalize an arbitrary JSON value and apply it as external state
    pub fn apply_external_value(&self, raw: &Value, options: ApplyOptions) -> RestaurantCollection {
        self.apply_external(normalize(raw), options)
    }

    /// Persist (optionally) and swap the cached document; caller holds the commit lock
    fn store_and_replace(
        &self,
        next: RestaurantCollection,
        serialized: String,
        persist: bool,
    ) -> Applied {
        let saved = persist && {
            lock(&self.inner.state).status = DocumentStatus::Dirty;
            self.inner.store.save_serialized(&serialized)
        };
        if persist && !saved {
            debug!("Document kept in memory only");
        }

        let doc = Arc::new(next);
        let mut state = lock(&self.inner.state);
        state.doc = Arc::clone(&doc);
        state.serialized = serialized.clone();
        if saved {
            state.status = DocumentStatus::Clean;
        }
        Applied { doc, serialized }
    }

    fn publish(&self, serialized: &str) {
        if let Some(broadcaster) = &self.inner.broadcaster {
            let receivers = broadcaster.publish(serialized);
            debug!(receivers = receivers, "State published to other tabs");
        }
    }

    // ========================================
    // Reads
    // ========================================

    /// Owned copy of the whole document
    pub fn snapshot(&self) -> RestaurantCollection {
        (*self.current()).clone()
    }

    /// Menu of the targeted board
    pub fn get_menu(&self, target: &BoardTarget) -> Menu {
        views::menu_view(&self.current(), target).unwrap_or_default()
    }

    /// Boards of a restaurant (`None` = active restaurant)
    pub fn get_boards(&self, restaurant_id: Option<&str>, with_menus: bool) -> Option<BoardList> {
        views::board_list(&self.current(), restaurant_id, with_menus)
    }

    pub fn get_restaurants(&self, with_boards: bool, with_menus: bool) -> RestaurantList {
        views::restaurant_list(&self.current(), with_boards, with_menus)
    }

    pub fn status(&self) -> DocumentStatus {
        lock(&self.inner.state).status
    }

    /// False once the store has fallen back to memory-only
    pub fn is_persistent(&self) -> bool {
        self.inner.store.is_persistent()
    }

    pub fn storage_key(&self) -> &str {
        self.inner.store.key()
    }

    // ========================================
    // Subscriptions
    // ========================================

    /// Register a listener and replay the current snapshot to it
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        let subscription = self.inner.hub.register(topic, Arc::new(callback));
        let doc = self.current();
        self.inner.hub.replay(&subscription, &doc);
        subscription
    }

    pub fn subscribe_menu<F>(&self, target: BoardTarget, callback: F) -> Subscription
    where
        F: Fn(MenuSnapshot) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Menu(target), move |snapshot| {
            if let Snapshot::Menu(menu) = snapshot {
                callback(menu);
            }
        })
    }

    pub fn subscribe_boards<F>(&self, restaurant_id: Option<String>, callback: F) -> Subscription
    where
        F: Fn(BoardList) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Boards { restaurant_id }, move |snapshot| {
            if let Snapshot::Boards(boards) = snapshot {
                callback(boards);
            }
        })
    }

    pub fn subscribe_restaurants<F>(&self, callback: F) -> Subscription
    where
        F: Fn(RestaurantList) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Restaurants, move |snapshot| {
            if let Snapshot::Restaurants(restaurants) = snapshot {
                callback(restaurants);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.hub.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_build_loads_clean_defaults() {
        let engine = SyncEngine::in_memory();
        assert_eq!(engine.status(), DocumentStatus::Clean);
        assert_eq!(engine.snapshot().restaurants.len(), 1);
        assert!(engine.is_persistent());
    }

    #[test]
    fn test_commit_in_place_and_replacement() {
        let engine = SyncEngine::in_memory();
        let doc = engine.commit(|doc| doc.restaurants[0].name = "Corner Bistro".to_string());
        assert_eq!(doc.restaurants[0].name, "Corner Bistro");

        let doc = engine.commit(|doc| {
            let mut replacement = doc.clone();
            replacement.restaurants[0].boards[0].name = "  Drinks  ".to_string();
            replacement
        });
        assert_eq!(
            doc.restaurants[0].boards[0].name, "Drinks",
            "replacement is normalized"
        );
        assert_eq!(engine.snapshot(), doc);
    }

    #[test]
    fn test_commit_repairs_broken_draft() {
        let engine = SyncEngine::in_memory();
        let doc = engine.commit(|doc| doc.restaurants.clear());
        assert_eq!(doc.restaurants.len(), 1);
        assert_eq!(doc.active_restaurant_id, doc.restaurants[0].id);
    }

    #[test]
    fn test_noop_commit_skips_notification() {
        let engine = SyncEngine::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _subscription = engine.subscribe_restaurants(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1, "replayed on subscribe");

        engine.commit(|_| ());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forced_apply_notifies_even_when_equal() {
        let engine = SyncEngine::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _subscription = engine.subscribe_menu(BoardTarget::active(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let same = engine.snapshot();
        engine.apply_external(same.clone(), ApplyOptions::from_storage());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        engine.apply_external(same, ApplyOptions::remote_authoritative());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_read_engine_during_notification() {
        let engine = SyncEngine::in_memory();
        let reader = engine.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = engine.subscribe_restaurants(move |list| {
            let names = reader.get_restaurants(false, false);
            assert_eq!(names, list);
            sink.lock().unwrap().push(list.restaurants[0].name.clone());
        });

        engine.commit(|doc| doc.restaurants[0].name = "Re-entrant".to_string());
        assert_eq!(
            seen.lock().unwrap().last().map(String::as_str),
            Some("Re-entrant")
        );
    }

    #[test]
    fn test_push_answer_dropped_once_document_moves_on() {
        let engine = SyncEngine::in_memory();
        let pushed = lock(&engine.inner.state).serialized.clone();
        let mut answer = engine.snapshot();
        answer.restaurants[0].name = "From Server".to_string();

        engine.commit(|doc| doc.restaurants[0].name = "Newer Local".to_string());
        assert!(engine.apply_push_answer(answer.clone(), &pushed).is_none());
        assert_eq!(engine.snapshot().restaurants[0].name, "Newer Local");

        let current = lock(&engine.inner.state).serialized.clone();
        let applied = engine.apply_push_answer(answer, &current).unwrap();
        assert_eq!(applied.restaurants[0].name, "From Server");
    }
}
