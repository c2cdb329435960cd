use serde::{Deserialize, Serialize};

use super::subscription::Subscription;

/// Catalog metadata for one game. Refreshed wholesale on every successful
/// catalog fetch; never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Game {
    pub id: i64,
    pub title: String,
    pub short_title: String,
    pub category: String,
    pub color: String,
    pub image: String,
    pub card_image: String,
    pub description: String,
    pub price: String,
}

impl Game {
    /// Free/paid classification as the catalog encodes it.
    pub fn is_free(&self) -> bool {
        self.price.eq_ignore_ascii_case("free") || self.category.eq_ignore_ascii_case("free trial")
    }
}

/// One question/card in a game's deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
    pub id: i64,
    #[serde(alias = "question")]
    pub text: String,
    pub color: String,
}

/// Result of a catalog fetch: the game list, any subscription info the
/// backend piggybacks on the response, and whether this came from cache
/// rather than the network (stale-serve).
#[derive(Debug, Clone, PartialEq)]
pub struct GamesPage {
    pub games: Vec<Game>,
    pub subscription: Option<Subscription>,
    pub is_cached: bool,
}
