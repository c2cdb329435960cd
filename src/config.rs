use std::collections::HashMap;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub entitlements: EntitlementsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Shared API key sent as the `hashedKey` field of every request body.
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the persistent key-value store file.
    pub dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub games_ttl_ms: u64,
    pub questions_ttl_ms: u64,
    pub geo_ttl_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EntitlementsConfig {
    /// Entitlement-SDK API key; empty means in-app purchases are
    /// unavailable in this build.
    pub api_key: String,
    /// Backend package id -> entitlement-SDK product identifier. Kept as
    /// configured data so deployments can change the mapping scheme
    /// without a code change.
    pub packages: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://admin.daretoconnectgames.com/api".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: ".dtc".to_string() }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            games_ttl_ms: 5 * 60 * 1000,
            questions_ttl_ms: 10 * 60 * 1000,
            geo_ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        let packages = [
            ("1", "com.daretoconnect.bronze"),
            ("2", "com.daretoconnect.silver"),
            ("3", "com.daretoconnect.gold"),
            ("4", "com.daretoconnect.platinum"),
        ]
        .into_iter()
        .map(|(id, product)| (id.to_string(), product.to_string()))
        .collect();

        Self {
            api_key: String::new(),
            packages,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            entitlements: EntitlementsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn games_ttl(&self) -> Duration {
        Duration::from_millis(self.games_ttl_ms)
    }

    pub fn questions_ttl(&self) -> Duration {
        Duration::from_millis(self.questions_ttl_ms)
    }

    pub fn geo_ttl(&self) -> Duration {
        Duration::from_millis(self.geo_ttl_ms)
    }
}

impl EntitlementsConfig {
    /// Resolves a backend package id to the entitlement-SDK product id.
    pub fn product_id(&self, package_id: i64) -> Option<&str> {
        self.packages.get(&package_id.to_string()).map(String::as_str)
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Connect.toml (base configuration file)
    /// 3. Environment variables (prefixed with CONNECT_, double underscore
    ///    separating sections, e.g. CONNECT_API__BASE_URL)
    pub fn load() -> Result<Self, figment::Error> {
        let defaults = toml::to_string(&Config::default()).expect("default config serializes");
        let figment = Figment::new()
            .merge(Toml::string(&defaults))
            .merge(Toml::file("Connect.toml"))
            .merge(Env::prefixed("CONNECT_").split("__"));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_documented_ttls() {
        let config = Config::default();
        assert_eq!(config.cache.games_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.questions_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache.geo_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn package_mapping_resolves_by_numeric_id() {
        let config = EntitlementsConfig::default();
        assert_eq!(config.product_id(1), Some("com.daretoconnect.bronze"));
        assert_eq!(config.product_id(4), Some("com.daretoconnect.platinum"));
        assert_eq!(config.product_id(99), None);
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CONNECT_API__BASE_URL", "https://staging.example.com/api");
            jail.set_env("CONNECT_CACHE__GAMES_TTL_MS", "1000");

            let config = Config::load().expect("config loads");
            assert_eq!(config.api.base_url, "https://staging.example.com/api");
            assert_eq!(config.cache.games_ttl_ms, 1000);
            Ok(())
        });
    }

    #[test]
    fn toml_file_layers_between_defaults_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Connect.toml",
                r#"
                [api]
                api_key = "daretoconnect_games_api_key_2024"

                [entitlements.packages]
                "7" = "com.daretoconnect.weekly"
                "#,
            )?;

            let config = Config::load().expect("config loads");
            assert_eq!(config.api.api_key, "daretoconnect_games_api_key_2024");
            assert_eq!(config.entitlements.product_id(7), Some("com.daretoconnect.weekly"));
            Ok(())
        });
    }
}
