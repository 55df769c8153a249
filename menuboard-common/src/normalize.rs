//! Schema normalizer
//!
//! Maps any input shape onto the canonical [`RestaurantCollection`]. Never
//! fails: malformed input degrades to defaults field by field.
//!
//! Normalization runs in three stages:
//! 1. [`migrate`](crate::migrate::migrate) lifts legacy shapes to the current schema
//! 2. coercion turns raw JSON into typed values, dropping non-object entries
//!    and replacing wrong-typed fields with type defaults
//! 3. [`RestaurantCollection::normalized`] repairs the typed document
//!    (blank names, duplicate ids, dangling active ids, empty lists)
//!
//! Stage 3 is also what the commit pipeline runs on typed drafts, so both
//! entry points enforce identical rules.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::defaults::{
    default_board, default_menu, default_restaurant, DEFAULT_ITEM_NAME, DEFAULT_MENU_TITLE,
    DEFAULT_OVERLAY_BACKGROUND, DEFAULT_OVERLAY_COLOR, DEFAULT_OVERLAY_POSITION,
    DEFAULT_OVERLAY_SIZE, DEFAULT_OVERLAY_TEXT, DEFAULT_SECTION_NAME,
};
use crate::migrate::{legacy_boards, migrate};
use crate::model::{
    generate_background_id, generate_board_id, generate_restaurant_id, Background,
    BackgroundOrigin, Board, Item, Menu, PricingOverlay, Restaurant, RestaurantCollection,
    Section, CURRENT_SCHEMA_VERSION,
};

/// Shape of an untrusted input document, resolved once at the boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawDocument<'a> {
    /// Has a non-empty `restaurants` array
    Collection(&'a Map<String, Value>),
    /// Pre-restaurant document with a `boards` array
    BoardList(&'a Map<String, Value>),
    /// Pre-board document: a bare menu, or `{ menu: ... }`
    SingleMenu(&'a Map<String, Value>),
    /// Nothing recognizable (includes non-objects)
    Empty,
}

impl<'a> RawDocument<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        let Some(map) = raw.as_object() else {
            return RawDocument::Empty;
        };

        let has_restaurants = map
            .get("restaurants")
            .and_then(Value::as_array)
            .map(|r| !r.is_empty())
            .unwrap_or(false);

        if has_restaurants {
            RawDocument::Collection(map)
        } else if map.get("boards").map(Value::is_array).unwrap_or(false) {
            RawDocument::BoardList(map)
        } else if ["menu", "title", "sections"].iter().any(|k| map.contains_key(*k)) {
            RawDocument::SingleMenu(map)
        } else {
            RawDocument::Empty
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawDocument::Empty)
    }
}

/// Normalize any input into a canonical collection
pub fn normalize(raw: &Value) -> RestaurantCollection {
    let migrated = migrate(raw.clone());
    let collection = match migrated.as_object() {
        Some(map) => coerce_collection(map),
        None => RestaurantCollection {
            schema_version: CURRENT_SCHEMA_VERSION,
            restaurants: Vec::new(),
            active_restaurant_id: String::new(),
        },
    };
    collection.normalized()
}

/// Normalize a menu fragment supplied by an editing collaborator
///
/// Non-objects yield the default menu.
pub fn menu_from_value(raw: &Value) -> Menu {
    match raw.as_object() {
        Some(map) => {
            let mut menu = coerce_menu(map);
            repair_menu(&mut menu);
            menu
        }
        None => default_menu(),
    }
}

// ========================================
// Coercion: raw JSON → typed values
// ========================================

fn string_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Number, or a string holding one (legacy editors wrote `x: "12.5"`)
fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn objects(map: &Map<String, Value>, key: &str) -> Vec<Map<String, Value>> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn coerce_collection(map: &Map<String, Value>) -> RestaurantCollection {
    RestaurantCollection {
        schema_version: CURRENT_SCHEMA_VERSION,
        restaurants: objects(map, "restaurants")
            .iter()
            .map(coerce_restaurant)
            .collect(),
        active_restaurant_id: string_or(map, "activeRestaurantId", ""),
    }
}

fn coerce_restaurant(map: &Map<String, Value>) -> Restaurant {
    let (boards, active_board_id) = if map.get("boards").map(Value::is_array).unwrap_or(false) {
        (
            objects(map, "boards").iter().map(coerce_board).collect(),
            string_or(map, "activeBoardId", ""),
        )
    } else {
        // Restaurant entry that is itself a legacy menu container
        let (legacy, active) = legacy_boards(&Value::Object(map.clone()));
        (
            legacy
                .iter()
                .filter_map(Value::as_object)
                .map(coerce_board)
                .collect(),
            active
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )
    };

    Restaurant {
        id: string_or(map, "id", ""),
        name: string_or(map, "name", ""),
        boards,
        active_board_id,
    }
}

fn coerce_board(map: &Map<String, Value>) -> Board {
    let menu = match map.get("menu") {
        Some(Value::Object(menu)) => coerce_menu(menu),
        _ if map.contains_key("title") || map.contains_key("sections") => coerce_menu(map),
        _ => default_menu(),
    };

    Board {
        id: string_or(map, "id", ""),
        name: string_or(map, "name", ""),
        menu,
    }
}

fn coerce_menu(map: &Map<String, Value>) -> Menu {
    Menu {
        title: string_or(map, "title", ""),
        subtitle: string_or(map, "subtitle", ""),
        sections: objects(map, "sections").iter().map(coerce_section).collect(),
        backgrounds: objects(map, "backgrounds")
            .iter()
            .filter_map(coerce_background)
            .collect(),
        active_background_id: string_or(map, "activeBackgroundId", ""),
        pricing_overlays: objects(map, "pricingOverlays")
            .iter()
            .map(coerce_overlay)
            .collect(),
    }
}

fn coerce_section(map: &Map<String, Value>) -> Section {
    Section {
        name: string_or(map, "name", ""),
        description: string_or(map, "description", ""),
        items: objects(map, "items").iter().map(coerce_item).collect(),
    }
}

fn coerce_item(map: &Map<String, Value>) -> Item {
    let price = match map.get("price") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    Item {
        name: string_or(map, "name", DEFAULT_ITEM_NAME),
        description: string_or(map, "description", ""),
        price,
        image: map.get("image").and_then(Value::as_str).map(str::to_string),
    }
}

fn coerce_background(map: &Map<String, Value>) -> Option<Background> {
    let source = map.get("source").and_then(Value::as_str)?.trim();
    if source.is_empty() {
        return None;
    }

    Some(Background {
        id: string_or(map, "id", ""),
        name: string_or(map, "name", ""),
        source: source.to_string(),
        origin: match map.get("origin").and_then(Value::as_str) {
            Some("upload") => BackgroundOrigin::Upload,
            _ => BackgroundOrigin::Url,
        },
    })
}

fn coerce_overlay(map: &Map<String, Value>) -> PricingOverlay {
    let background = map
        .get("background")
        .or_else(|| map.get("bg"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    PricingOverlay {
        text: string_or(map, "text", DEFAULT_OVERLAY_TEXT),
        x: number_field(map, "x").unwrap_or(DEFAULT_OVERLAY_POSITION),
        y: number_field(map, "y").unwrap_or(DEFAULT_OVERLAY_POSITION),
        size: number_field(map, "size").unwrap_or(DEFAULT_OVERLAY_SIZE),
        color: string_or(map, "color", ""),
        background,
    }
}

// ========================================
// Repair: typed document → canonical document
// ========================================

impl RestaurantCollection {
    /// Re-derive every invariant of the canonical schema
    ///
    /// Idempotent: repairing an already canonical document returns it
    /// unchanged.
    pub fn normalized(mut self) -> Self {
        self.schema_version = CURRENT_SCHEMA_VERSION;

        let mut seen = HashSet::new();
        for (index, restaurant) in self.restaurants.iter_mut().enumerate() {
            repair_restaurant(restaurant, index, &mut seen);
        }
        if self.restaurants.is_empty() {
            self.restaurants.push(default_restaurant(None, None));
        }

        self.active_restaurant_id = resolve_active(
            self.active_restaurant_id.trim(),
            self.restaurants.iter().map(|r| r.id.as_str()),
        );
        self
    }
}

/// Keep `requested` when it names an entry, otherwise the first entry
fn resolve_active<'a>(requested: &str, mut ids: impl Iterator<Item = &'a str> + Clone) -> String {
    if ids.clone().any(|id| id == requested) {
        requested.to_string()
    } else {
        ids.next().unwrap_or_default().to_string()
    }
}

fn unique_id(
    candidate: &str,
    seen: &mut HashSet<String>,
    generate: impl Fn() -> String,
) -> String {
    let trimmed = candidate.trim();
    let mut id = if trimmed.is_empty() || seen.contains(trimmed) {
        generate()
    } else {
        trimmed.to_string()
    };
    while seen.contains(&id) {
        id = generate();
    }
    seen.insert(id.clone());
    id
}

fn name_or(name: &str, fallback: impl FnOnce() -> String) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn repair_restaurant(restaurant: &mut Restaurant, index: usize, seen: &mut HashSet<String>) {
    restaurant.id = unique_id(&restaurant.id, seen, generate_restaurant_id);
    restaurant.name = name_or(&restaurant.name, || format!("Restaurant {}", index + 1));

    let mut seen_boards = HashSet::new();
    for (board_index, board) in restaurant.boards.iter_mut().enumerate() {
        board.id = unique_id(&board.id, &mut seen_boards, generate_board_id);
        board.name = name_or(&board.name, || format!("Board {}", board_index + 1));
        repair_menu(&mut board.menu);
    }
    if restaurant.boards.is_empty() {
        restaurant.boards.push(default_board(None));
    }

    restaurant.active_board_id = resolve_active(
        restaurant.active_board_id.trim(),
        restaurant.boards.iter().map(|b| b.id.as_str()),
    );
}

fn repair_menu(menu: &mut Menu) {
    if menu.title.trim().is_empty() {
        menu.title = DEFAULT_MENU_TITLE.to_string();
    }

    for section in &mut menu.sections {
        if section.name.trim().is_empty() {
            section.name = DEFAULT_SECTION_NAME.to_string();
        }
        for item in &mut section.items {
            item.image = item
                .image
                .take()
                .map(|image| image.trim().to_string())
                .filter(|image| !image.is_empty());
        }
    }

    menu.backgrounds.retain(|b| !b.source.trim().is_empty());
    let mut seen = HashSet::new();
    for (index, background) in menu.backgrounds.iter_mut().enumerate() {
        background.source = background.source.trim().to_string();
        background.name = name_or(&background.name, || format!("Background {}", index + 1));
        let positional = format!("bg-{}", index + 1);
        let candidate = if background.id.trim().is_empty() {
            positional.as_str()
        } else {
            background.id.as_str()
        };
        background.id = unique_id(candidate, &mut seen, generate_background_id);
    }
    menu.active_background_id = resolve_active(
        menu.active_background_id.trim(),
        menu.backgrounds.iter().map(|b| b.id.as_str()),
    );

    for overlay in &mut menu.pricing_overlays {
        repair_overlay(overlay);
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        DEFAULT_OVERLAY_POSITION
    }
}

fn repair_overlay(overlay: &mut PricingOverlay) {
    overlay.x = clamp_percent(overlay.x);
    overlay.y = clamp_percent(overlay.y);
    if !(overlay.size.is_finite() && overlay.size > 0.0) {
        overlay.size = DEFAULT_OVERLAY_SIZE;
    }
    if overlay.color.trim().is_empty() {
        overlay.color = DEFAULT_OVERLAY_COLOR.to_string();
    }
    if overlay.background.trim().is_empty() {
        overlay.background = DEFAULT_OVERLAY_BACKGROUND.to_string();
    }
}
