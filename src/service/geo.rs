use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::warn;

use crate::api::{ApiClient, Endpoint};
use crate::cache::TtlCache;
use crate::error::AppError;
use crate::models::geo::{City, Country};
use crate::store::KvStore;

const COUNTRIES_KEY: &str = "countries";

/// Country/city lookups for the registration and profile forms. Geo data
/// changes rarely, so it gets the long TTL and degrades to whatever is
/// cached rather than surfacing fetch errors.
pub struct GeoService {
    api: Arc<ApiClient>,
    cache: TtlCache,
    ttl: Duration,
    countries: Mutex<Vec<Country>>,
    cities: Mutex<HashMap<i64, Vec<City>>>,
}

impl GeoService {
    pub fn new(api: Arc<ApiClient>, store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        let cache = TtlCache::new(store);
        let countries = cache.get_item(COUNTRIES_KEY).unwrap_or_default();

        Self {
            api,
            cache,
            ttl,
            countries: Mutex::new(countries),
            cities: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_countries(&self) -> Result<Vec<Country>, AppError> {
        {
            let countries = self.countries.lock().expect("geo lock poisoned");
            if !countries.is_empty() {
                return Ok(countries.clone());
            }
        }

        match self.api.call(Endpoint::GetCountries, json!({})).await {
            Ok(result) => {
                let countries: Vec<Country> = parse_list(&result, "countries");
                *self.countries.lock().expect("geo lock poisoned") = countries.clone();
                self.cache.set_item(COUNTRIES_KEY, &countries, self.ttl);
                Ok(countries)
            }
            Err(err) => {
                warn!(error = %err, "country fetch failed, serving cached list");
                Ok(self.countries.lock().expect("geo lock poisoned").clone())
            }
        }
    }

    pub async fn get_cities(&self, country_id: i64) -> Result<Vec<City>, AppError> {
        {
            let cities = self.cities.lock().expect("geo lock poisoned");
            if let Some(list) = cities.get(&country_id) {
                return Ok(list.clone());
            }
        }

        let cache_key = format!("cities_{country_id}");

        match self.api.call(Endpoint::GetCities, json!({"countryId": country_id})).await {
            Ok(result) => {
                let cities: Vec<City> = parse_list(&result, "cities");
                self.cities
                    .lock()
                    .expect("geo lock poisoned")
                    .insert(country_id, cities.clone());
                self.cache.set_item(&cache_key, &cities, self.ttl);
                Ok(cities)
            }
            Err(err) => {
                warn!(country_id, error = %err, "city fetch failed, serving cached list");
                if let Some(cached) = self.cache.get_item::<Vec<City>>(&cache_key) {
                    self.cities
                        .lock()
                        .expect("geo lock poisoned")
                        .insert(country_id, cached.clone());
                    return Ok(cached);
                }
                Ok(Vec::new())
            }
        }
    }

    pub fn cached_countries(&self) -> Vec<Country> {
        self.countries.lock().expect("geo lock poisoned").clone()
    }

    pub fn cached_cities(&self, country_id: i64) -> Vec<City> {
        self.cities
            .lock()
            .expect("geo lock poisoned")
            .get(&country_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Geo endpoints answer as a bare array or wrap the list under one of a
/// few field names.
fn parse_list<T: serde::de::DeserializeOwned>(result: &Value, field: &str) -> Vec<T> {
    if result.is_array() {
        return serde_json::from_value(result.clone()).unwrap_or_default();
    }

    for key in [field, "data", "list"] {
        if let Some(list) = result.get(key).filter(|v| v.is_array()) {
            return serde_json::from_value(list.clone()).unwrap_or_default();
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::test_utils::{MockTransport, ok_envelope};
    use crate::store::MemoryStore;

    struct Fixture {
        geo: GeoService,
        transport: Arc<MockTransport>,
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemoryStore::new()))
    }

    fn fixture_with_store(store: Arc<MemoryStore>) -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let api = Arc::new(ApiClient::new(
            ApiConfig {
                base_url: "https://backend.test/api".to_string(),
                api_key: "key".to_string(),
            },
            transport.clone() as Arc<dyn crate::api::HttpTransport>,
        ));
        let geo = GeoService::new(api, store as Arc<dyn KvStore>, Duration::from_secs(86_400));
        Fixture { geo, transport }
    }

    #[tokio::test]
    async fn countries_are_memoized_after_first_fetch() {
        let f = fixture();
        f.transport.push_ok(200, ok_envelope(json!([{"id": 1, "name": "Egypt"}])));

        let first = f.geo.get_countries().await.expect("fetch ok");
        let second = f.geo.get_countries().await.expect("memoized");

        assert_eq!(first, second);
        assert_eq!(first[0].name, "Egypt");
        assert_eq!(f.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn countries_survive_restart_through_the_cache() {
        let store = Arc::new(MemoryStore::new());
        {
            let f = fixture_with_store(store.clone());
            f.transport.push_ok(200, ok_envelope(json!([{"id": 1, "name": "Egypt"}])));
            f.geo.get_countries().await.expect("fetch ok");
        }

        // A new service over the same store hydrates without a network call.
        let f = fixture_with_store(store);
        let countries = f.geo.get_countries().await.expect("cache hit");
        assert_eq!(countries[0].name, "Egypt");
        assert_eq!(f.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn country_fetch_failure_degrades_to_empty_list() {
        let f = fixture();
        f.transport.push_transport_failure("connection refused");

        let countries = f.geo.get_countries().await.expect("degrades");
        assert!(countries.is_empty());
    }

    #[tokio::test]
    async fn cities_are_cached_per_country() {
        let f = fixture();
        f.transport.push_ok(200, ok_envelope(json!({"cities": [{"id": 10, "name": "Cairo"}]})));
        f.transport.push_ok(200, ok_envelope(json!({"cities": [{"id": 20, "name": "Alexandria"}]})));

        let cairo = f.geo.get_cities(1).await.expect("fetch ok");
        let alex = f.geo.get_cities(2).await.expect("fetch ok");

        assert_eq!(cairo[0].name, "Cairo");
        assert_eq!(alex[0].name, "Alexandria");
        assert_eq!(f.geo.cached_cities(1)[0].name, "Cairo");

        // Memoized per country id.
        f.geo.get_cities(1).await.expect("memoized");
        assert_eq!(f.transport.request_count(), 2);
    }

    #[tokio::test]
    async fn city_fetch_failure_falls_back_to_cache_then_empty() {
        let store = Arc::new(MemoryStore::new());
        let cache = TtlCache::new(store.clone() as Arc<dyn KvStore>);
        cache.set_item(
            "cities_1",
            &vec![City {
                id: 10,
                name: "Cairo".to_string(),
                country_id: Some(1),
            }],
            Duration::from_secs(86_400),
        );

        let f = fixture_with_store(store);
        f.transport.push_transport_failure("connection refused");
        let cached = f.geo.get_cities(1).await.expect("cached fallback");
        assert_eq!(cached[0].name, "Cairo");

        f.transport.push_transport_failure("connection refused");
        let empty = f.geo.get_cities(2).await.expect("degrades");
        assert!(empty.is_empty());
    }
}
