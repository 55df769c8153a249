//! # Menu Board Sync
//!
//! State synchronization engine for menu boards:
//! - Local persistence with in-memory fallback (`store`, `storage`)
//! - Commit pipeline and external apply (`engine`)
//! - Remote fetch/push over HTTP (`remote`)
//! - Cross-tab propagation (`broadcaster`)
//! - Scoped listener notification (`hub`, `views`)
//! - Kiosk display addressing (`display`)

pub mod broadcaster;
pub mod display;
pub mod engine;
pub mod hub;
pub mod reconcile;
pub mod remote;
pub mod storage;
pub mod store;
pub mod views;

pub use broadcaster::{BroadcastMessage, Broadcaster, TabChannel};
pub use display::{display_key_matches, DisplayAddress, DisplayView};
pub use engine::{
    ApplyOptions, CreateBoard, CreateRestaurant, DocumentStatus, Draft, HostEvent, SyncEngine,
    SyncEngineBuilder, SyncFuture, SyncTasks,
};
pub use hub::{MenuSnapshot, Snapshot, Subscription, Topic};
pub use reconcile::{LastWriteWins, ReconcilePolicy};
pub use remote::{HttpTransport, RemoteError, RemoteStatus, RemoteSyncClient, RemoteTransport};
pub use storage::{
    FileStorage, KeyValueStorage, MemoryStorage, StorageError, StorageEvent, StorageEvents,
};
pub use store::LocalStore;
pub use views::{BoardList, BoardSummary, BoardTarget, RestaurantList, RestaurantSummary};
