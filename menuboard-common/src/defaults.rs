//! Built-in factory defaults
//!
//! Used on first load, after `reset`, and wherever normalization has to
//! synthesize a missing board or restaurant.

use crate::model::{
    generate_board_id, generate_restaurant_id, Background, BackgroundOrigin, Board, Item, Menu,
    Restaurant, RestaurantCollection, Section, CURRENT_SCHEMA_VERSION,
};

pub const DEFAULT_RESTAURANT_NAME: &str = "Main Restaurant";
pub const DEFAULT_BOARD_NAME: &str = "Main Board";
pub const DEFAULT_MENU_TITLE: &str = "Menu";
pub const DEFAULT_SECTION_NAME: &str = "Untitled Section";
pub const DEFAULT_ITEM_NAME: &str = "Unnamed Item";
pub const DEFAULT_OVERLAY_TEXT: &str = "$0.00";
pub const DEFAULT_OVERLAY_POSITION: f64 = 50.0;
pub const DEFAULT_OVERLAY_SIZE: f64 = 48.0;
pub const DEFAULT_OVERLAY_COLOR: &str = "white";
pub const DEFAULT_OVERLAY_BACKGROUND: &str = "rgba(249, 115, 22, 0.95)";

fn item(name: &str, description: &str, price: &str) -> Item {
    Item {
        name: name.to_string(),
        description: description.to_string(),
        price: price.to_string(),
        image: None,
    }
}

fn section(name: &str, description: &str, items: Vec<Item>) -> Section {
    Section {
        name: name.to_string(),
        description: description.to_string(),
        items,
    }
}

/// The house menu shipped with a fresh install
pub fn default_menu() -> Menu {
    Menu {
        title: "Sunny Side Café".to_string(),
        subtitle: "Locally roasted coffee • Freshly baked pastries • Made with love".to_string(),
        sections: vec![
            section(
                "Breakfast Classics",
                "Served all day",
                vec![
                    item(
                        "Buttermilk Pancakes",
                        "Whipped butter, real maple syrup, seasonal berries",
                        "12.95",
                    ),
                    item(
                        "Avocado Toast",
                        "Sourdough, smashed avocado, poached eggs, chili oil",
                        "11.95",
                    ),
                    item(
                        "Morning Burrito",
                        "Scrambled eggs, chorizo, black beans, queso fresco",
                        "13.95",
                    ),
                ],
            ),
            section(
                "Lunch Favorites",
                "Available after 11 a.m.",
                vec![
                    item(
                        "Citrus Grilled Chicken Sandwich",
                        "Pickled onion, arugula, herb aioli, brioche bun",
                        "15.95",
                    ),
                    item(
                        "Quinoa Power Bowl",
                        "Charred broccoli, sweet potato, tahini dressing, ancient grains",
                        "14.95",
                    ),
                    item(
                        "Seared Salmon Salad",
                        "Mixed greens, grapefruit, fennel, champagne vinaigrette",
                        "18.95",
                    ),
                ],
            ),
            section(
                "Beverages",
                "House-made & locally sourced",
                vec![
                    item("Cold Brew", "", "5.50"),
                    item("Seasonal Latte", "Ask about today's rotating flavor", "6.50"),
                    item("Fresh Lemonade", "", "4.95"),
                ],
            ),
        ],
        backgrounds: vec![Background {
            id: "bg-default".to_string(),
            name: "Default Sunrise".to_string(),
            source: "https://images.unsplash.com/photo-1500530855697-b586d89ba3ee?auto=format&fit=crop&w=1920&q=80".to_string(),
            origin: BackgroundOrigin::Url,
        }],
        active_background_id: "bg-default".to_string(),
        pricing_overlays: Vec::new(),
    }
}

/// A board carrying the default menu
///
/// Reuses `id` when given (deleting the last board keeps its address).
pub fn default_board(id: Option<String>) -> Board {
    Board {
        id: id.unwrap_or_else(generate_board_id),
        name: DEFAULT_BOARD_NAME.to_string(),
        menu: default_menu(),
    }
}

pub fn default_restaurant(id: Option<String>, name: Option<String>) -> Restaurant {
    let board = default_board(None);
    Restaurant {
        id: id.unwrap_or_else(generate_restaurant_id),
        name: name.unwrap_or_else(|| DEFAULT_RESTAURANT_NAME.to_string()),
        active_board_id: board.id.clone(),
        boards: vec![board],
    }
}

/// Factory-fresh document: one restaurant, one board, the house menu
pub fn default_collection() -> RestaurantCollection {
    let restaurant = default_restaurant(None, None);
    RestaurantCollection {
        schema_version: CURRENT_SCHEMA_VERSION,
        active_restaurant_id: restaurant.id.clone(),
        restaurants: vec![restaurant],
    }
}
