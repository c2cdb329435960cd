pub mod api;
pub mod cache;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

#[cfg(test)]
pub mod test_utils;

pub use api::{ApiClient, Connectivity, Endpoint, HttpTransport, ReqwestTransport};
pub use cache::TtlCache;
pub use config::Config;
pub use error::AppError;
pub use service::auth::AuthService;
pub use service::game::GameService;
pub use service::geo::GeoService;
pub use service::subscription::SubscriptionService;
pub use service::support::SupportService;
pub use store::{FileStore, KvStore, MemoryStore};

use tracing_subscriber::EnvFilter;

/// Configure logging with environment variable support.
/// RUST_LOG can be used for fine-grained control per module:
/// Examples:
///   RUST_LOG=debug                      - Set all to debug
///   RUST_LOG=dtc_core=debug             - Set this crate to debug
///   RUST_LOG=dtc_core::service=trace    - Set specific module to trace
///   RUST_LOG=info,dtc_core::api=debug   - Global info, api at debug
pub fn init_tracing(log_level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
