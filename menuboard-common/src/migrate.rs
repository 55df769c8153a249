//! Schema migrations keyed on `schemaVersion`
//!
//! Migrations operate on raw JSON before coercion into the typed model.
//! Each step lifts a document one version; [`migrate`] runs every step
//! between the detected version and [`CURRENT_SCHEMA_VERSION`].
//!
//! | From | To | Change |
//! |------|----|--------|
//! | 0    | 1  | Wrap legacy single-menu / board-list documents in a restaurant |
//! | 1    | 2  | Add `backgrounds` / `pricingOverlays`; overlay `bg` → `background` |

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::defaults::{DEFAULT_BOARD_NAME, DEFAULT_RESTAURANT_NAME};
use crate::model::CURRENT_SCHEMA_VERSION;
use crate::normalize::RawDocument;

/// Version a raw document claims, adjusted for its actual shape
///
/// A document without a non-empty `restaurants` array is treated as
/// version 0 whatever it declares, since nothing newer can be read from it.
pub fn detect_version(raw: &Value) -> u32 {
    match RawDocument::classify(raw) {
        RawDocument::Collection(map) => map
            .get("schemaVersion")
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(1)
            .max(1),
        _ => 0,
    }
}

/// Lift a raw document to the current schema version
pub fn migrate(raw: Value) -> Value {
    let version = detect_version(&raw);
    if version > CURRENT_SCHEMA_VERSION {
        warn!(
            version,
            current = CURRENT_SCHEMA_VERSION,
            "Document written by a newer schema, reading best-effort"
        );
    }

    let mut doc = raw;
    if version < 1 {
        debug!("Migrating legacy document to schema version 1");
        doc = wrap_legacy(&doc);
    }
    if version < 2 {
        debug!("Migrating document to schema version 2");
        add_display_extensions(&mut doc);
    }

    if let Some(map) = doc.as_object_mut() {
        map.insert("schemaVersion".to_string(), json!(CURRENT_SCHEMA_VERSION));
    }
    doc
}

fn non_blank_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// 0 → 1: synthesize one restaurant around a legacy document
fn wrap_legacy(raw: &Value) -> Value {
    let empty = Map::new();
    let map = raw.as_object().unwrap_or(&empty);

    let (boards, active_board_id) = legacy_boards(raw);

    let name = non_blank_str(map, "restaurantName")
        .or_else(|| non_blank_str(map, "name"))
        .unwrap_or(DEFAULT_RESTAURANT_NAME);

    let mut restaurant = Map::new();
    if let Some(id) = non_blank_str(map, "restaurantId").or_else(|| non_blank_str(map, "id")) {
        restaurant.insert("id".to_string(), json!(id));
    }
    restaurant.insert("name".to_string(), json!(name));
    restaurant.insert("boards".to_string(), Value::Array(boards));
    if let Some(active) = active_board_id {
        restaurant.insert("activeBoardId".to_string(), active);
    }

    json!({ "restaurants": [Value::Object(restaurant)] })
}

/// Board list carried by a legacy (pre-restaurant) document
///
/// Shared with restaurant coercion, where a restaurant entry without a
/// `boards` array is itself a legacy board container.
pub(crate) fn legacy_boards(raw: &Value) -> (Vec<Value>, Option<Value>) {
    match RawDocument::classify(raw) {
        RawDocument::BoardList(map) => (
            map.get("boards")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            map.get("activeBoardId").cloned(),
        ),
        RawDocument::SingleMenu(map) => {
            let menu = match map.get("menu") {
                Some(menu @ Value::Object(_)) => menu.clone(),
                _ => Value::Object(map.clone()),
            };
            let name = non_blank_str(map, "name")
                .or_else(|| non_blank_str(map, "title"))
                .unwrap_or(DEFAULT_BOARD_NAME);
            (vec![json!({ "name": name, "menu": menu })], None)
        }
        // A collection reaching here has no usable board list of its own
        RawDocument::Collection(_) | RawDocument::Empty => (Vec::new(), None),
    }
}

/// 1 → 2: backgrounds and pricing overlays
fn add_display_extensions(doc: &mut Value) {
    let Some(restaurants) = doc.get_mut("restaurants").and_then(Value::as_array_mut) else {
        return;
    };
    for restaurant in restaurants {
        let Some(boards) = restaurant.get_mut("boards").and_then(Value::as_array_mut) else {
            continue;
        };
        for board in boards {
            let has_menu = board.get("menu").map(Value::is_object).unwrap_or(false);
            let menu = if has_menu {
                board.get_mut("menu")
            } else {
                Some(board)
            };
            if let Some(Value::Object(menu)) = menu {
                upgrade_menu(menu);
            }
        }
    }
}

fn upgrade_menu(menu: &mut Map<String, Value>) {
    menu.entry("backgrounds").or_insert_with(|| json!([]));
    let overlays = menu
        .entry("pricingOverlays")
        .or_insert_with(|| json!([]));
    if let Some(overlays) = overlays.as_array_mut() {
        for overlay in overlays.iter_mut().filter_map(Value::as_object_mut) {
            if !overlay.contains_key("background") {
                if let Some(bg) = overlay.remove("bg") {
                    overlay.insert("background".to_string(), bg);
                }
            }
        }
    }
}
