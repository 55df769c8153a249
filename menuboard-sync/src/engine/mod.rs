//! Sync engine
//!
//! **Module Structure:**
//! - `core.rs`: engine construction, commit pipeline, external apply, reads
//!   and subscriptions
//! - `operations.rs`: restaurant/board/menu mutations, all through `commit`
//! - `sync.rs`: remote fetch/push, background polling, cross-tab and
//!   storage event handling

mod core;
mod operations;
mod sync;

pub use self::core::{ApplyOptions, DocumentStatus, Draft, SyncEngine, SyncEngineBuilder};
pub use self::operations::{CreateBoard, CreateRestaurant};
pub use self::sync::{HostEvent, SyncFuture, SyncTasks};
