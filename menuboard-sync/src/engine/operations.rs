//! Restaurant, board and menu operations
//!
//! Every mutation goes through [`SyncEngine::commit`]. Targets are resolved
//! inside the mutator so they see the same document the commit replaces.
//! Unknown board/restaurant ids leave the document untouched.

use menuboard_common::defaults::{default_board, default_collection, default_menu};
use menuboard_common::model::{generate_board_id, generate_restaurant_id};
use menuboard_common::{Board, Menu, Restaurant, RestaurantCollection};
use tracing::debug;

use super::core::SyncEngine;
use crate::views::{self, BoardContext, BoardTarget};

/// Options for [`SyncEngine::create_board`]
#[derive(Debug, Clone, Default)]
pub struct CreateBoard {
    /// Owning restaurant (`None` = active restaurant)
    pub restaurant_id: Option<String>,
    pub name: Option<String>,
    /// Duplicate this board's menu
    pub source_board_id: Option<String>,
}

/// Options for [`SyncEngine::create_restaurant`]
#[derive(Debug, Clone, Default)]
pub struct CreateRestaurant {
    pub name: Option<String>,
    /// Duplicate every board of this restaurant
    pub source_restaurant_id: Option<String>,
}

fn non_blank(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Id of the restaurant `requested` resolves to
fn restaurant_id_for(doc: &RestaurantCollection, requested: Option<&str>) -> Option<String> {
    doc.resolve_restaurant(requested).map(|r| r.id.clone())
}

fn board_mut<'a>(
    doc: &'a mut RestaurantCollection,
    context: &BoardContext,
) -> Option<&'a mut Board> {
    doc.restaurant_mut(&context.restaurant_id)?
        .board_mut(&context.board_id)
}

impl SyncEngine {
    // ========================================
    // Menus
    // ========================================

    /// Replace the menu of the targeted board, returning the stored menu
    pub fn save_menu(&self, target: &BoardTarget, menu: Menu) -> Menu {
        let mut saved_to = None;
        let committed = self.commit(|draft| {
            let Some(context) = views::resolve_context(draft, target) else {
                return;
            };
            if let Some(board) = board_mut(draft, &context) {
                board.menu = menu;
            }
            saved_to = Some(context);
        });

        saved_to
            .and_then(|context| {
                views::menu_view(
                    &committed,
                    &BoardTarget::new(context.restaurant_id, context.board_id),
                )
            })
            .unwrap_or_default()
    }

    /// Restore the built-in menu on the targeted board
    pub fn reset_menu(&self, target: &BoardTarget) -> Menu {
        self.save_menu(target, default_menu())
    }

    // ========================================
    // Boards
    // ========================================

    pub fn set_active_board(
        &self,
        restaurant_id: Option<&str>,
        board_id: &str,
    ) -> RestaurantCollection {
        self.commit(|draft| {
            let Some(id) = restaurant_id_for(draft, restaurant_id) else {
                return;
            };
            let Some(restaurant) = draft.restaurant_mut(&id) else {
                return;
            };
            if restaurant.board(board_id).is_some() {
                restaurant.active_board_id = board_id.to_string();
            } else {
                debug!(board_id = %board_id, "Unknown board, active board unchanged");
            }
        })
    }

    /// Add a board (optionally duplicating another) and make it active
    pub fn create_board(&self, request: CreateBoard) -> Option<Board> {
        let mut created = None;
        let committed = self.commit(|draft| {
            let Some(id) = restaurant_id_for(draft, request.restaurant_id.as_deref()) else {
                return;
            };
            let Some(restaurant) = draft.restaurant_mut(&id) else {
                return;
            };

            let source = request
                .source_board_id
                .as_deref()
                .and_then(|source_id| restaurant.board(source_id))
                .cloned();
            let name = non_blank(request.name.as_deref()).unwrap_or_else(|| match &source {
                Some(board) => format!("{} Copy", board.name),
                None => format!("Board {}", restaurant.boards.len() + 1),
            });
            let board = Board {
                id: generate_board_id(),
                name,
                menu: source.map(|board| board.menu).unwrap_or_else(default_menu),
            };

            restaurant.active_board_id = board.id.clone();
            created = Some(BoardContext {
                restaurant_id: id,
                board_id: board.id.clone(),
            });
            restaurant.boards.push(board);
        });

        let context = created?;
        committed
            .restaurant(&context.restaurant_id)?
            .board(&context.board_id)
            .cloned()
    }

    /// Rename a board; blank names are ignored
    pub fn rename_board(
        &self,
        restaurant_id: Option<&str>,
        board_id: &str,
        name: &str,
    ) -> RestaurantCollection {
        let Some(name) = non_blank(Some(name)) else {
            return self.snapshot();
        };
        self.commit(|draft| {
            let Some(id) = restaurant_id_for(draft, restaurant_id) else {
                return;
            };
            if let Some(board) = draft
                .restaurant_mut(&id)
                .and_then(|r| r.board_mut(board_id))
            {
                board.name = name;
            }
        })
    }

    /// Delete a board
    ///
    /// The last board of a restaurant is replaced by a default board that
    /// keeps its id, so display links stay valid.
    pub fn delete_board(
        &self,
        restaurant_id: Option<&str>,
        board_id: &str,
    ) -> RestaurantCollection {
        self.commit(|draft| {
            let Some(id) = restaurant_id_for(draft, restaurant_id) else {
                return;
            };
            let Some(restaurant) = draft.restaurant_mut(&id) else {
                return;
            };
            let Some(index) = restaurant.boards.iter().position(|b| b.id == board_id) else {
                debug!(board_id = %board_id, "Unknown board, nothing deleted");
                return;
            };

            if restaurant.boards.len() <= 1 {
                let fallback = default_board(Some(board_id.to_string()));
                restaurant.active_board_id = fallback.id.clone();
                restaurant.boards = vec![fallback];
                return;
            }

            restaurant.boards.remove(index);
            if restaurant.active_board_id == board_id {
                restaurant.active_board_id = restaurant
                    .boards
                    .first()
                    .map(|b| b.id.clone())
                    .unwrap_or_default();
            }
        })
    }

    // ========================================
    // Restaurants
    // ========================================

    pub fn set_active_restaurant(&self, restaurant_id: &str) -> RestaurantCollection {
        self.commit(|draft| {
            if draft.restaurant(restaurant_id).is_some() {
                draft.active_restaurant_id = restaurant_id.to_string();
            } else {
                debug!(restaurant_id = %restaurant_id, "Unknown restaurant, active restaurant unchanged");
            }
        })
    }

    /// Add a restaurant (optionally duplicating another) and make it active
    pub fn create_restaurant(&self, request: CreateRestaurant) -> Option<Restaurant> {
        let new_id = generate_restaurant_id();
        let committed = self.commit(|draft| {
            let source = request
                .source_restaurant_id
                .as_deref()
                .and_then(|source_id| draft.restaurant(source_id));

            let name = non_blank(request.name.as_deref()).unwrap_or_else(|| match source {
                Some(restaurant) => format!("{} Copy", restaurant.name),
                None => format!("Restaurant {}", draft.restaurants.len() + 1),
            });

            let mut boards: Vec<Board> = source
                .map(|restaurant| {
                    restaurant
                        .boards
                        .iter()
                        .map(|board| Board {
                            id: generate_board_id(),
                            name: board.name.clone(),
                            menu: board.menu.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            if boards.is_empty() {
                boards.push(default_board(None));
            }

            let restaurant = Restaurant {
                id: new_id.clone(),
                name,
                active_board_id: boards[0].id.clone(),
                boards,
            };
            draft.active_restaurant_id = restaurant.id.clone();
            draft.restaurants.push(restaurant);
        });

        committed.restaurant(&new_id).cloned()
    }

    /// Rename a restaurant; blank names are ignored
    pub fn rename_restaurant(&self, restaurant_id: &str, name: &str) -> RestaurantCollection {
        let Some(name) = non_blank(Some(name)) else {
            return self.snapshot();
        };
        self.commit(|draft| {
            if let Some(restaurant) = draft.restaurant_mut(restaurant_id) {
                restaurant.name = name;
            }
        })
    }

    /// Delete a restaurant
    ///
    /// The last restaurant keeps its id and name and gets a fresh default
    /// board.
    pub fn delete_restaurant(&self, restaurant_id: &str) -> RestaurantCollection {
        self.commit(|draft| {
            let Some(index) = draft.restaurants.iter().position(|r| r.id == restaurant_id) else {
                debug!(restaurant_id = %restaurant_id, "Unknown restaurant, nothing deleted");
                return;
            };

            if draft.restaurants.len() <= 1 {
                let board = default_board(None);
                let restaurant = &mut draft.restaurants[index];
                restaurant.active_board_id = board.id.clone();
                restaurant.boards = vec![board];
                return;
            }

            draft.restaurants.remove(index);
            if draft.active_restaurant_id == restaurant_id {
                draft.active_restaurant_id = draft
                    .restaurants
                    .first()
                    .map(|r| r.id.clone())
                    .unwrap_or_default();
            }
        })
    }

    /// Restore factory defaults
    pub fn reset(&self) -> RestaurantCollection {
        self.commit(|_| default_collection())
    }
}
