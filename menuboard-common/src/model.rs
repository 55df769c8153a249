//! Canonical menu board document
//!
//! The document is rooted at a [`RestaurantCollection`]. Values of these
//! types are only trusted once they have passed through
//! [`crate::normalize`] or [`RestaurantCollection::normalized`], which
//! re-derive the referential invariants (non-empty lists, resolvable
//! active ids).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written by this build.
///
/// - 0 (or absent): legacy single-menu / single-board-list documents
/// - 1: restaurant hierarchy
/// - 2: backgrounds and pricing overlays
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Root of the document: every restaurant known to this deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantCollection {
    pub schema_version: u32,
    pub restaurants: Vec<Restaurant>,
    pub active_restaurant_id: String,
}

/// A named owner of one or more boards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub boards: Vec<Board>,
    pub active_board_id: String,
}

/// An independently addressable menu; the unit a kiosk renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    pub menu: Menu,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub title: String,
    pub subtitle: String,
    pub sections: Vec<Section>,
    pub backgrounds: Vec<Background>,
    /// Empty when `backgrounds` is empty
    pub active_background_id: String,
    pub pricing_overlays: Vec<PricingOverlay>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: String,
    pub description: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub name: String,
    pub description: String,
    /// Display string, currency-agnostic ("9", "12.95", "MP")
    pub price: String,
    /// Image URL or inline data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Image reference assignable as a board's backdrop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub id: String,
    pub name: String,
    /// URL or data URI
    pub source: String,
    pub origin: BackgroundOrigin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundOrigin {
    #[default]
    Url,
    Upload,
}

/// Free-floating price label positioned over a board's background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingOverlay {
    pub text: String,
    /// Horizontal position, percent of board width (0-100)
    pub x: f64,
    /// Vertical position, percent of board height (0-100)
    pub y: f64,
    /// Font size in pixels
    pub size: f64,
    pub color: String,
    pub background: String,
}

impl RestaurantCollection {
    /// Look up a restaurant by exact id
    pub fn restaurant(&self, id: &str) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| r.id == id)
    }

    pub fn restaurant_mut(&mut self, id: &str) -> Option<&mut Restaurant> {
        self.restaurants.iter_mut().find(|r| r.id == id)
    }

    /// Resolve a requested restaurant id, falling back to the active one
    ///
    /// Unknown or absent ids resolve to the active restaurant; a document
    /// that has not been normalized may still resolve to `None`.
    pub fn resolve_restaurant(&self, requested: Option<&str>) -> Option<&Restaurant> {
        requested
            .and_then(|id| self.restaurant(id))
            .or_else(|| self.restaurant(&self.active_restaurant_id))
            .or_else(|| self.restaurants.first())
    }

    /// The restaurant currently selected in the editor
    pub fn active_restaurant(&self) -> Option<&Restaurant> {
        self.resolve_restaurant(None)
    }
}

impl Restaurant {
    pub fn board(&self, id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn board_mut(&mut self, id: &str) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.id == id)
    }

    /// Resolve a requested board id, falling back to the active board
    pub fn resolve_board(&self, requested: Option<&str>) -> Option<&Board> {
        requested
            .and_then(|id| self.board(id))
            .or_else(|| self.board(&self.active_board_id))
            .or_else(|| self.boards.first())
    }
}

impl Menu {
    /// The background currently selected for display, if any
    pub fn active_background(&self) -> Option<&Background> {
        self.backgrounds
            .iter()
            .find(|b| b.id == self.active_background_id)
            .or_else(|| self.backgrounds.first())
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Fresh restaurant id (`restaurant-xxxxxxxxxxxx`)
pub fn generate_restaurant_id() -> String {
    format!("restaurant-{}", short_id())
}

/// Fresh board id (`board-xxxxxxxxxxxx`)
pub fn generate_board_id() -> String {
    format!("board-{}", short_id())
}

/// Fresh background id, used when a generated positional id collides
pub fn generate_background_id() -> String {
    format!("bg-{}", short_id())
}
