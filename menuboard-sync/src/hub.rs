//! Subscription hub
//!
//! Listener registry for three granularities: the menu of one board, the
//! board list of one restaurant, and the restaurant list. Registrations
//! are keyed by id and removed through the [`Subscription`] handle.
//!
//! Callbacks always run outside the registry lock, so a listener may
//! subscribe, unsubscribe or commit from inside its own callback.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use menuboard_common::{Menu, RestaurantCollection};
use tracing::{debug, error};

use crate::views::{self, BoardList, BoardTarget, RestaurantList};

/// What a listener is interested in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// The menu of one board
    Menu(BoardTarget),
    /// The boards of one restaurant (`None` = the active restaurant)
    Boards { restaurant_id: Option<String> },
    /// Every restaurant
    Restaurants,
}

impl Topic {
    /// Notification order: menus, then boards, then restaurants
    fn tier(&self) -> u8 {
        match self {
            Topic::Menu(_) => 0,
            Topic::Boards { .. } => 1,
            Topic::Restaurants => 2,
        }
    }

    /// Compute this topic's scoped snapshot of `doc`
    pub fn snapshot(&self, doc: &RestaurantCollection) -> Option<Snapshot> {
        match self {
            Topic::Menu(target) => {
                let context = views::resolve_context(doc, target)?;
                let menu = views::menu_view(doc, target)?;
                Some(Snapshot::Menu(MenuSnapshot {
                    restaurant_id: context.restaurant_id,
                    board_id: context.board_id,
                    menu,
                }))
            }
            Topic::Boards { restaurant_id } => {
                views::board_list(doc, restaurant_id.as_deref(), false).map(Snapshot::Boards)
            }
            Topic::Restaurants => Some(Snapshot::Restaurants(views::restaurant_list(
                doc, false, false,
            ))),
        }
    }
}

/// Menu of a resolved board
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSnapshot {
    pub restaurant_id: String,
    pub board_id: String,
    pub menu: Menu,
}

/// Owned view delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Menu(MenuSnapshot),
    Boards(BoardList),
    Restaurants(RestaurantList),
}

pub type Listener = Arc<dyn Fn(Snapshot) + Send + Sync>;

struct Registration {
    topic: Topic,
    callback: Listener,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    registrations: Mutex<BTreeMap<u64, Registration>>,
}

impl HubInner {
    fn registrations(&self) -> MutexGuard<'_, BTreeMap<u64, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Disposal handle for one registration
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "a discarded subscription can never be unsubscribed"]
pub struct Subscription {
    id: u64,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove exactly this registration
    ///
    /// Returns `false` when it was already gone (or the hub was dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(hub) = self.hub.upgrade() else {
            return false;
        };
        let removed = hub.registrations().remove(&self.id).is_some();
        removed
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<HubInner>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener without invoking it
    pub fn register(&self, topic: Topic, callback: Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .registrations()
            .insert(id, Registration { topic, callback });
        debug!(subscription = id, "Listener registered");
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.registrations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the current snapshot to one registration
    pub fn replay(&self, subscription: &Subscription, doc: &RestaurantCollection) {
        let entry = self
            .inner
            .registrations()
            .get(&subscription.id)
            .map(|r| (r.topic.clone(), Arc::clone(&r.callback)));
        if let Some((topic, callback)) = entry {
            if let Some(snapshot) = topic.snapshot(doc) {
                deliver(subscription.id, &callback, snapshot);
            }
        }
    }

    /// Fan `doc` out to every listener, tier by tier
    pub fn notify(&self, doc: &RestaurantCollection) {
        let mut targets: Vec<(u64, Topic, Listener)> = self
            .inner
            .registrations()
            .iter()
            .map(|(id, r)| (*id, r.topic.clone(), Arc::clone(&r.callback)))
            .collect();
        targets.sort_by_key(|(id, topic, _)| (topic.tier(), *id));

        let mut restaurants: Option<Snapshot> = None;
        for (id, topic, callback) in targets {
            let snapshot = match topic {
                Topic::Restaurants => restaurants
                    .get_or_insert_with(|| {
                        Snapshot::Restaurants(views::restaurant_list(doc, false, false))
                    })
                    .clone(),
                ref scoped => match scoped.snapshot(doc) {
                    Some(snapshot) => snapshot,
                    None => continue,
                },
            };
            deliver(id, &callback, snapshot);
        }
    }
}

/// Invoke one listener, containing any panic
fn deliver(id: u64, callback: &Listener, snapshot: Snapshot) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(subscription = id, "Listener failed: {}", message);
    }
}
