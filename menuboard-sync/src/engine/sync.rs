//! Remote sync, background polling and cross-context event handling

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use menuboard_common::RestaurantCollection;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::core::{lock, ApplyOptions, SyncEngine};
use crate::broadcaster::BroadcastMessage;
use crate::remote::RemoteStatus;
use crate::storage::StorageEvent;

/// A remote fetch shared by every caller that asked while it was running
pub type SyncFuture = Shared<BoxFuture<'static, Option<RestaurantCollection>>>;

/// Host environment events that trigger a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The window regained focus
    Focus,
    /// Network connectivity came back
    Online,
}

/// Background tasks started by [`SyncEngine::spawn_background`]
///
/// Dropping the handle stops every task.
pub struct SyncTasks {
    handles: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SyncTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl SyncEngine {
    pub fn is_remote_enabled(&self) -> bool {
        self.inner.remote.is_some()
    }

    pub fn remote_status(&self) -> RemoteStatus {
        lock(&self.inner.remote_status).clone()
    }

    // ========================================
    // Remote fetch
    // ========================================

    /// Manual sync: a forced fetch, joining any fetch already in flight
    ///
    /// Listeners are notified even when the remote document is unchanged.
    pub fn sync_now(&self) -> SyncFuture {
        self.sync_from_remote(true)
    }

    /// Fetch the remote document and apply it
    ///
    /// At most one fetch is outstanding: while one runs, every caller gets
    /// the same shared future (its `force` flag wins). When called inside a
    /// tokio runtime the fetch is driven to completion even if every caller
    /// drops its future.
    pub fn sync_from_remote(&self, force: bool) -> SyncFuture {
        if self.inner.remote.is_none() {
            return futures::future::ready(None).boxed().shared();
        }

        let mut slot = lock(&self.inner.in_flight);
        if let Some(existing) = slot.as_ref() {
            debug!("Remote fetch already in flight, joining it");
            return existing.clone();
        }

        let engine = self.clone();
        let fetch = async move {
            let result = engine.run_fetch(force).await;
            *lock(&engine.inner.in_flight) = None;
            result
        }
        .boxed()
        .shared();

        *slot = Some(fetch.clone());
        drop(slot);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(fetch.clone().map(|_| ()));
        }
        fetch
    }

    async fn run_fetch(&self, force: bool) -> Option<RestaurantCollection> {
        let remote = self.inner.remote.as_ref()?;
        lock(&self.inner.remote_status).in_flight = true;

        let fetched = remote.fetch_remote().await;

        {
            let mut status = lock(&self.inner.remote_status);
            status.in_flight = false;
            match fetched {
                Some(_) => status.record_success(),
                None => status.record_failure(),
            }
        }

        let doc = fetched?;
        info!(
            restaurants = doc.restaurants.len(),
            force = force,
            "Applying remote menu data"
        );
        Some(self.apply_external(
            doc,
            ApplyOptions {
                persist: true,
                broadcast: true,
                force,
            },
        ))
    }

    // ========================================
    // Remote push
    // ========================================

    /// Fire-and-forget push of a committed document
    ///
    /// A failed push leaves the local commit in place. The answer is applied
    /// only while `serialized` is still the current document.
    pub(super) fn schedule_push(&self, doc: Arc<RestaurantCollection>, serialized: String) {
        if self.inner.remote.is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, remote push skipped");
            return;
        };

        let engine = self.clone();
        let handle = runtime.spawn(async move {
            let Some(remote) = engine.inner.remote.as_ref() else {
                return;
            };
            let answer = remote.push_remote(&doc).await;
            {
                let mut status = lock(&engine.inner.remote_status);
                match answer {
                    Some(_) => status.record_success(),
                    None => status.record_failure(),
                }
            }
            if let Some(answer) = answer {
                if engine.apply_push_answer(answer, &serialized).is_some() {
                    debug!("Applied remote answer to push");
                }
            }
        });

        let mut pushes = lock(&self.inner.pushes);
        pushes.retain(|push| !push.is_finished());
        pushes.push(handle);
    }

    /// Wait for every push started so far
    pub async fn wait_for_pushes(&self) {
        let pending: Vec<JoinHandle<()>> = lock(&self.inner.pushes).drain(..).collect();
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Remote push task failed");
            }
        }
    }

    // ========================================
    // Cross-context events
    // ========================================

    /// Apply a state published by another tab
    pub fn handle_broadcast(&self, message: BroadcastMessage) {
        let BroadcastMessage::StateUpdate { payload } = message;
        if self.last_serialized_matches(&payload) {
            debug!("Broadcast state already applied");
            return;
        }
        match serde_json::from_str::<serde_json::Value>(&payload) {
            Ok(raw) => {
                info!("Applying menu data from another tab");
                self.apply_external_value(&raw, ApplyOptions::from_broadcast());
            }
            Err(e) => warn!(error = %e, "Unable to apply broadcast menu update"),
        }
    }

    /// Apply a write another tab made to the shared store
    pub fn handle_storage_event(&self, event: StorageEvent) {
        if event.key != self.storage_key() {
            return;
        }
        let Some(new_value) = event.new_value else {
            return;
        };
        match serde_json::from_str::<serde_json::Value>(&new_value) {
            Ok(raw) => {
                self.apply_external_value(&raw, ApplyOptions::from_storage());
            }
            Err(e) => warn!(error = %e, "Unable to process shared menu update"),
        }
    }

    /// Focus syncs; reconnecting forces a sync
    pub fn handle_host_event(&self, event: HostEvent) -> SyncFuture {
        debug!(event = ?event, "Host event");
        match event {
            HostEvent::Focus => self.sync_from_remote(false),
            HostEvent::Online => self.sync_from_remote(true),
        }
    }

    // ========================================
    // Background tasks
    // ========================================

    /// Start polling and cross-context listeners
    ///
    /// Polling (when a remote is configured) begins with a forced sync and
    /// then repeats at the configured interval. Must be called within a
    /// tokio runtime; keep the returned handle alive.
    pub fn spawn_background(&self) -> SyncTasks {
        let mut handles = Vec::new();

        if let Some(remote) = &self.inner.remote {
            let period = remote.settings().poll_interval;
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                engine.sync_from_remote(true).await;
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // first tick completes immediately
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    engine.sync_from_remote(false).await;
                }
            }));
            info!("Remote polling every {:?}", period);
        }

        if let Some(broadcaster) = &self.inner.broadcaster {
            let mut receiver = broadcaster.subscribe();
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                while let Some(message) = receiver.recv().await {
                    engine.handle_broadcast(message);
                }
            }));
            debug!(channel = %broadcaster.channel_name(), "Listening for other tabs");
        }

        if let Some(mut events) = self.inner.store.watch() {
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    engine.handle_storage_event(event);
                }
            }));
            debug!("Watching shared storage");
        }

        SyncTasks { handles }
    }
}
