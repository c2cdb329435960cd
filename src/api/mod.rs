pub mod envelope;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::AppError;

pub use envelope::{ENVELOPE_KEY, normalize_response, strip_diagnostics};

/// Logical backend endpoints. All are POST; the path is the only
/// per-endpoint wire detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    GetProfile,
    GetGames,
    GetQuestions,
    GetCountries,
    GetCities,
    UpdateProfile,
    ChangePassword,
    ForgotPassword,
    GetSubscription,
    GetPaymentPackages,
    InitiatePayment,
    RecordSubscription,
    SubmitSupport,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/login",
            Endpoint::Register => "/register",
            Endpoint::GetProfile => "/getProfile",
            Endpoint::GetGames => "/getGames",
            Endpoint::GetQuestions => "/getQuestions",
            Endpoint::GetCountries => "/getCountries",
            Endpoint::GetCities => "/getCities",
            Endpoint::UpdateProfile => "/updateProfile",
            Endpoint::ChangePassword => "/changePassword",
            Endpoint::ForgotPassword => "/forgotPass",
            Endpoint::GetSubscription => "/getSubscription",
            Endpoint::GetPaymentPackages => "/getPaymentPackages",
            Endpoint::InitiatePayment => "/initiatePayment",
            Endpoint::RecordSubscription => "/recordSubscription",
            Endpoint::SubmitSupport => "/submitSupport",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Raw transport response. The body is carried as text so the normalizer
/// can tolerate empty bodies instead of failing inside a to-JSON
/// convenience.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// Production transport over reqwest.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Process-level connectivity probe. The default assumes online; hosts
/// with a platform network monitor inject their own.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Thin client for the backend wire contract: every request is a POST
/// whose body carries the shared `hashedKey` plus the endpoint payload;
/// authenticated endpoints add `accessToken` to the body (not a header).
pub struct ApiClient {
    config: ApiConfig,
    transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn with_default_transport(config: ApiConfig) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()))
    }

    pub async fn call(&self, endpoint: Endpoint, payload: Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.config.base_url, endpoint.path());

        let mut body = Map::new();
        body.insert("hashedKey".to_string(), json!(self.config.api_key));
        if let Value::Object(fields) = payload {
            body.extend(fields);
        }

        debug!(endpoint = %endpoint, "calling backend");
        let response = self.transport.post(&url, &Value::Object(body)).await.map_err(|e| {
            warn!(endpoint = %endpoint, error = %e, "transport failure");
            AppError::network(e.to_string())
        })?;

        normalize_response(endpoint, response.status, &response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTransport, ok_envelope};

    fn api_config() -> ApiConfig {
        ApiConfig {
            base_url: "https://backend.test/api".to_string(),
            api_key: "key_2024".to_string(),
        }
    }

    #[tokio::test]
    async fn request_body_carries_shared_key_and_payload() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(200, ok_envelope(json!([])));

        let api = ApiClient::new(api_config(), transport.clone());
        api.call(Endpoint::GetGames, json!({"accessToken": "tok"})).await.expect("call ok");

        let (url, body) = transport.request(0);
        assert_eq!(url, "https://backend.test/api/getGames");
        assert_eq!(body["hashedKey"], "key_2024");
        assert_eq!(body["accessToken"], "tok");
    }

    #[tokio::test]
    async fn transport_rejection_maps_to_network_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_transport_failure("connection refused");

        let api = ApiClient::new(api_config(), transport);
        let err = api.call(Endpoint::GetGames, json!({})).await.expect_err("must fail");
        assert!(matches!(err, AppError::Network { .. }));
    }
}
