use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::api::{ApiClient, Connectivity, Endpoint};
use crate::cache::TtlCache;
use crate::error::AppError;
use crate::models::game::{Game, GamesPage, Question};
use crate::models::subscription::Subscription;
use crate::service::auth::AuthService;
use crate::store::KvStore;

const GAMES_KEY: &str = "games";
const GAMES_TIMESTAMP_KEY: &str = "games_timestamp";

#[derive(Debug, Default)]
struct CatalogState {
    games: Vec<Game>,
    last_fetch: Option<i64>,
}

/// Fetches and caches the game catalog and per-game question decks.
///
/// The catalog list is served from memory while younger than its TTL and
/// replaced wholesale on every successful fetch. Question decks are
/// network-first: content freshness matters more than for the catalog
/// list, so there is no TTL short-circuit on the primary path. Both fall
/// back to stale cache when the network fails.
pub struct GameService {
    api: Arc<ApiClient>,
    auth: Arc<AuthService>,
    cache: TtlCache,
    connectivity: Arc<dyn Connectivity>,
    games_ttl: Duration,
    questions_ttl: Duration,
    state: Mutex<CatalogState>,
}

impl GameService {
    pub fn new(
        api: Arc<ApiClient>,
        auth: Arc<AuthService>,
        store: Arc<dyn KvStore>,
        connectivity: Arc<dyn Connectivity>,
        games_ttl: Duration,
        questions_ttl: Duration,
    ) -> Self {
        let cache = TtlCache::new(store);
        let state = CatalogState {
            games: cache.get_item(GAMES_KEY).unwrap_or_default(),
            last_fetch: cache.get_item(GAMES_TIMESTAMP_KEY),
        };

        Self {
            api,
            auth,
            cache,
            connectivity,
            games_ttl,
            questions_ttl,
            state: Mutex::new(state),
        }
    }

    pub async fn get_all_games(&self, force_refresh: bool) -> Result<GamesPage, AppError> {
        let (cached_games, last_fetch) = {
            let state = self.state.lock().expect("catalog lock poisoned");
            (state.games.clone(), state.last_fetch)
        };

        let now = Utc::now().timestamp_millis();
        let fresh = last_fetch
            .map(|at| now.saturating_sub(at) < self.games_ttl.as_millis() as i64)
            .unwrap_or(false);

        if !force_refresh && !cached_games.is_empty() && fresh {
            debug!("serving catalog from fresh cache");
            return Ok(GamesPage {
                games: cached_games,
                subscription: None,
                is_cached: false,
            });
        }

        if !self.connectivity.is_online() && !cached_games.is_empty() {
            debug!("offline, serving cached catalog");
            return Ok(GamesPage {
                games: cached_games,
                subscription: None,
                is_cached: true,
            });
        }

        let mut payload = json!({});
        if let Some(token) = self.auth.access_token() {
            payload["accessToken"] = json!(token);
        }

        match self.api.call(Endpoint::GetGames, payload).await {
            Ok(result) => {
                let (games, subscription) = parse_catalog(&result);

                let now = Utc::now().timestamp_millis();
                {
                    let mut state = self.state.lock().expect("catalog lock poisoned");
                    state.games = games.clone();
                    state.last_fetch = Some(now);
                }
                self.cache.set_item(GAMES_KEY, &games, self.games_ttl);
                self.cache.set_item(GAMES_TIMESTAMP_KEY, &now, self.games_ttl);

                Ok(GamesPage {
                    games,
                    subscription,
                    is_cached: false,
                })
            }
            Err(err) => {
                if err.is_session_expired() {
                    // The wipe clears every cache namespace, so the stale
                    // fallback below finds nothing and the error surfaces.
                    self.auth.handle_auth_error(&err);
                    self.clear_cache();
                }

                let games = self.state.lock().expect("catalog lock poisoned").games.clone();
                if !games.is_empty() {
                    warn!(error = %err, "catalog fetch failed, serving stale cache");
                    return Ok(GamesPage {
                        games,
                        subscription: None,
                        is_cached: true,
                    });
                }

                Err(err)
            }
        }
    }

    /// Fetches a game's question deck. Always network-first; the per-game
    /// cache exists only as a failure fallback.
    pub async fn get_game_questions(&self, game_id: i64) -> Result<Vec<Question>, AppError> {
        let cache_key = format!("questions_{game_id}");

        let mut payload = json!({"gameId": game_id});
        if let Some(token) = self.auth.access_token() {
            payload["accessToken"] = json!(token);
        }

        match self.api.call(Endpoint::GetQuestions, payload).await {
            Ok(result) => {
                let deck = parse_questions(&result, game_id);
                self.cache.set_item(&cache_key, &deck, self.questions_ttl);
                Ok(deck)
            }
            Err(err) => {
                self.auth.handle_auth_error(&err);
                if let Some(deck) = self.cache.get_item::<Vec<Question>>(&cache_key) {
                    warn!(game_id, error = %err, "question fetch failed, serving cached deck");
                    return Ok(deck);
                }
                Err(err)
            }
        }
    }

    /// Pure in-memory lookup; never performs network I/O. Callers that
    /// need guaranteed presence call [`GameService::get_all_games`] first.
    pub fn get_game_by_id(&self, id: i64) -> Option<Game> {
        self.state
            .lock()
            .expect("catalog lock poisoned")
            .games
            .iter()
            .find(|game| game.id == id)
            .cloned()
    }

    pub fn cached_games(&self) -> Vec<Game> {
        self.state.lock().expect("catalog lock poisoned").games.clone()
    }

    pub fn clear_cache(&self) {
        {
            let mut state = self.state.lock().expect("catalog lock poisoned");
            state.games.clear();
            state.last_fetch = None;
        }
        self.cache.remove_item(GAMES_KEY);
        self.cache.remove_item(GAMES_TIMESTAMP_KEY);
    }
}

/// The catalog endpoint has answered with three shapes over time: an
/// object with `games` (and piggybacked `subscription`), a bare array,
/// and an object with a `data` array.
fn parse_catalog(result: &Value) -> (Vec<Game>, Option<Subscription>) {
    if let Some(games) = result.get("games") {
        let games = serde_json::from_value(games.clone()).unwrap_or_default();
        let subscription = result
            .get("subscription")
            .and_then(|s| serde_json::from_value(s.clone()).ok());
        return (games, subscription);
    }

    if result.is_array() {
        return (serde_json::from_value(result.clone()).unwrap_or_default(), None);
    }

    if let Some(data) = result.get("data").filter(|d| d.is_array()) {
        return (serde_json::from_value(data.clone()).unwrap_or_default(), None);
    }

    (Vec::new(), None)
}

fn parse_questions(result: &Value, game_id: i64) -> Vec<Question> {
    if result.is_array() {
        return serde_json::from_value(result.clone()).unwrap_or_default();
    }

    if let Some(object) = result.as_object() {
        if let Some(questions) = object.get("questions").filter(|q| q.is_array()) {
            return serde_json::from_value(questions.clone()).unwrap_or_default();
        }
        // A lone question record; anything else is an empty deck.
        if object.contains_key("id") || object.contains_key("text") || object.contains_key("question") {
            return serde_json::from_value(result.clone()).map(|q| vec![q]).unwrap_or_default();
        }
    }

    warn!(game_id, "no questions returned");
    Vec::new()
}
