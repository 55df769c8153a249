//! # Menu Board Common Library
//!
//! Shared code for the menu board sync engine and its tools:
//! - Canonical document model (restaurants, boards, menus)
//! - Schema normalization and version migration
//! - Built-in factory defaults
//! - Configuration loading

pub mod config;
pub mod defaults;
pub mod error;
pub mod migrate;
pub mod model;
pub mod normalize;

pub use error::{Error, Result};
pub use model::{
    Background, BackgroundOrigin, Board, Item, Menu, PricingOverlay, Restaurant,
    RestaurantCollection, Section, CURRENT_SCHEMA_VERSION,
};
pub use normalize::{menu_from_value, normalize, RawDocument};
