//! Display addressing
//!
//! A kiosk display link names a restaurant and board through the query
//! parameters `restaurant` and `board`, plus an optional shared display key
//! in `k`. The engine only resolves the ids; enforcing the key is up to the
//! display.

use menuboard_common::{Error, Menu, Result};
use reqwest::Url;
use serde::Serialize;

use crate::engine::SyncEngine;

const PARAM_RESTAURANT: &str = "restaurant";
const PARAM_BOARD: &str = "board";
const PARAM_KEY: &str = "k";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayAddress {
    pub restaurant_id: Option<String>,
    pub board_id: Option<String>,
    pub key: Option<String>,
}

impl DisplayAddress {
    pub fn for_board(restaurant_id: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: Some(restaurant_id.into()),
            board_id: Some(board_id.into()),
            key: None,
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key.filter(|k| !k.is_empty());
        self
    }

    /// Read the address from a display URL
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidInput(format!("display URL '{}': {}", url, e)))?;
        let mut address = Self::default();
        for (name, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match &*name {
                PARAM_RESTAURANT => address.restaurant_id = Some(value.to_string()),
                PARAM_BOARD => address.board_id = Some(value.to_string()),
                PARAM_KEY => address.key = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(address)
    }

    /// Render onto `base`, replacing any address parameters it already has
    pub fn to_url(&self, base: &str) -> Result<String> {
        let mut url = Url::parse(base)
            .map_err(|e| Error::InvalidInput(format!("base URL '{}': {}", base, e)))?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| ![PARAM_RESTAURANT, PARAM_BOARD, PARAM_KEY].contains(&&**name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(kept);
            if let Some(id) = &self.restaurant_id {
                query.append_pair(PARAM_RESTAURANT, id);
            }
            if let Some(id) = &self.board_id {
                query.append_pair(PARAM_BOARD, id);
            }
            if let Some(key) = &self.key {
                query.append_pair(PARAM_KEY, key);
            }
        }
        Ok(url.to_string())
    }
}

/// Whether a display may show content
///
/// No required key (or a blank one) lets every display through.
pub fn display_key_matches(required: Option<&str>, provided: Option<&str>) -> bool {
    match required.map(str::trim).filter(|k| !k.is_empty()) {
        None => true,
        Some(required) => provided == Some(required),
    }
}

/// What a display should render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayView {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub board_id: String,
    pub board_name: String,
    pub menu: Menu,
}

impl SyncEngine {
    /// Resolve a display address; unknown ids fall back to the active ones
    pub fn resolve_display(&self, address: &DisplayAddress) -> Option<DisplayView> {
        let doc = self.snapshot();
        let restaurant = doc.resolve_restaurant(address.restaurant_id.as_deref())?;
        let board = restaurant.resolve_board(address.board_id.as_deref())?;
        Some(DisplayView {
            restaurant_id: restaurant.id.clone(),
            restaurant_name: restaurant.name.clone(),
            board_id: board.id.clone(),
            board_name: board.name.clone(),
            menu: board.menu.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_url() {
        let address = DisplayAddress::from_url(
            "https://boards.example.com/index.html?restaurant=r1&board=b%202&k=secret&x=1",
        )
        .unwrap();
        assert_eq!(address.restaurant_id.as_deref(), Some("r1"));
        assert_eq!(address.board_id.as_deref(), Some("b 2"));
        assert_eq!(address.key.as_deref(), Some("secret"));

        let bare = DisplayAddress::from_url("https://boards.example.com/?board=").unwrap();
        assert_eq!(bare, DisplayAddress::default());
        assert!(DisplayAddress::from_url("index.html").is_err());
    }

    #[test]
    fn test_render_replaces_existing_params() {
        let url = DisplayAddress::for_board("r1", "b1")
            .with_key(Some("k-9".to_string()))
            .to_url("https://boards.example.com/index.html?theme=dark&board=old")
            .unwrap();
        assert_eq!(
            url,
            "https://boards.example.com/index.html?theme=dark&restaurant=r1&board=b1&k=k-9"
        );
    }

    #[test]
    fn test_display_key_matching() {
        assert!(display_key_matches(None, None));
        assert!(display_key_matches(Some(""), Some("anything")));
        assert!(display_key_matches(Some("abc"), Some("abc")));
        assert!(!display_key_matches(Some("abc"), None));
        assert!(!display_key_matches(Some("abc"), Some("abd")));
    }

    #[test]
    fn test_resolve_display_falls_back_to_active() {
        let engine = SyncEngine::in_memory();
        let doc = engine.snapshot();
        let view = engine
            .resolve_display(&DisplayAddress::for_board("missing", "missing"))
            .unwrap();
        assert_eq!(view.restaurant_id, doc.active_restaurant_id);
        assert_eq!(view.board_id, doc.restaurants[0].active_board_id);
        assert_eq!(view.menu, doc.restaurants[0].boards[0].menu);
    }
}
