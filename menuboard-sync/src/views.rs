//! Scoped read views over the canonical document
//!
//! Every view is an owned copy; nothing returned here borrows from the
//! engine's document.

use menuboard_common::{Menu, RestaurantCollection};
use serde::Serialize;

/// Which board a caller means
///
/// Absent or unknown ids fall back to the active restaurant / board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoardTarget {
    pub restaurant_id: Option<String>,
    pub board_id: Option<String>,
}

impl BoardTarget {
    /// The active board of the active restaurant
    pub fn active() -> Self {
        Self::default()
    }

    pub fn new(restaurant_id: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: Some(restaurant_id.into()),
            board_id: Some(board_id.into()),
        }
    }

    /// A board of the active restaurant
    pub fn board(board_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: None,
            board_id: Some(board_id.into()),
        }
    }
}

/// Resolved restaurant/board pair for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardContext {
    pub restaurant_id: String,
    pub board_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu: Option<Menu>,
}

/// Boards of one restaurant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub active_board_id: String,
    pub boards: Vec<BoardSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantSummary {
    pub id: String,
    pub name: String,
    pub board_count: usize,
    pub active_board_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boards: Option<Vec<BoardSummary>>,
}

/// Every restaurant, for the restaurant picker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantList {
    pub active_restaurant_id: String,
    pub restaurants: Vec<RestaurantSummary>,
}

/// Resolve a target against a normalized document
pub fn resolve_context(doc: &RestaurantCollection, target: &BoardTarget) -> Option<BoardContext> {
    let restaurant = doc.resolve_restaurant(target.restaurant_id.as_deref())?;
    let board = restaurant.resolve_board(target.board_id.as_deref())?;
    Some(BoardContext {
        restaurant_id: restaurant.id.clone(),
        board_id: board.id.clone(),
    })
}

pub fn menu_view(doc: &RestaurantCollection, target: &BoardTarget) -> Option<Menu> {
    let restaurant = doc.resolve_restaurant(target.restaurant_id.as_deref())?;
    let board = restaurant.resolve_board(target.board_id.as_deref())?;
    Some(board.menu.clone())
}

pub fn board_list(
    doc: &RestaurantCollection,
    restaurant_id: Option<&str>,
    with_menus: bool,
) -> Option<BoardList> {
    let restaurant = doc.resolve_restaurant(restaurant_id)?;
    Some(BoardList {
        restaurant_id: restaurant.id.clone(),
        restaurant_name: restaurant.name.clone(),
        active_board_id: restaurant.active_board_id.clone(),
        boards: restaurant
            .boards
            .iter()
            .map(|board| BoardSummary {
                id: board.id.clone(),
                name: board.name.clone(),
                menu: with_menus.then(|| board.menu.clone()),
            })
            .collect(),
    })
}

pub fn restaurant_list(
    doc: &RestaurantCollection,
    with_boards: bool,
    with_menus: bool,
) -> RestaurantList {
    RestaurantList {
        active_restaurant_id: doc.active_restaurant_id.clone(),
        restaurants: doc
            .restaurants
            .iter()
            .map(|restaurant| RestaurantSummary {
                id: restaurant.id.clone(),
                name: restaurant.name.clone(),
                board_count: restaurant.boards.len(),
                active_board_id: restaurant.active_board_id.clone(),
                boards: with_boards.then(|| {
                    restaurant
                        .boards
                        .iter()
                        .map(|board| BoardSummary {
                            id: board.id.clone(),
                            name: board.name.clone(),
                            menu: with_menus.then(|| board.menu.clone()),
                        })
                        .collect()
                }),
            })
            .collect(),
    }
}
