use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::api::{HttpResponse, HttpTransport, TransportError};
use crate::entitlements::{
    CustomerInfo, EntitlementClient, EntitlementError, EntitlementInfo, EntitlementPackage, Entitlements, Offering,
    Offerings, PurchaseResult,
};

/// Wraps a payload in the backend's nominal success envelope.
pub fn ok_envelope(result: Value) -> String {
    json!({"status": "Ok", "message": "", "result": result}).to_string()
}

enum Scripted {
    Response(HttpResponse),
    Failure(String),
}

/// Scripted transport: responses are served in push order and every
/// request is journaled for assertions.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, status: u16, body: String) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Scripted::Response(HttpResponse { status, body }));
    }

    pub fn push_transport_failure(&self, message: &str) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Scripted::Failure(message.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock lock poisoned").len()
    }

    pub fn request(&self, index: usize) -> (String, Value) {
        self.requests.lock().expect("mock lock poisoned")[index].clone()
    }

    /// URLs of all requests made, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push((url.to_string(), body.clone()));

        match self.responses.lock().expect("mock lock poisoned").pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(TransportError(message)),
            None => Err(TransportError("no scripted response".to_string())),
        }
    }
}

/// Entitlement SDK double with a method-call journal, so tests can assert
/// protocol ordering against backend calls.
pub struct MockEntitlementClient {
    pub offerings: Mutex<Result<Offerings, EntitlementError>>,
    pub purchase: Mutex<Result<PurchaseResult, EntitlementError>>,
    pub restore: Mutex<Result<CustomerInfo, EntitlementError>>,
    pub customer_info: Mutex<Result<CustomerInfo, EntitlementError>>,
    pub configure_result: Mutex<Result<(), EntitlementError>>,
    pub journal: Mutex<Vec<&'static str>>,
}

impl Default for MockEntitlementClient {
    fn default() -> Self {
        Self {
            offerings: Mutex::new(Ok(offerings_with(&["com.daretoconnect.bronze"]))),
            purchase: Mutex::new(Ok(PurchaseResult {
                customer_info: active_customer_info("premium", "com.daretoconnect.bronze"),
                transaction_identifier: Some("txn_1".to_string()),
            })),
            restore: Mutex::new(Ok(CustomerInfo::default())),
            customer_info: Mutex::new(Ok(CustomerInfo::default())),
            configure_result: Mutex::new(Ok(())),
            journal: Mutex::new(Vec::new()),
        }
    }
}

impl MockEntitlementClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &'static str) {
        self.journal.lock().expect("mock lock poisoned").push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.journal.lock().expect("mock lock poisoned").clone()
    }
}

fn clone_result<T: Clone>(result: &Result<T, EntitlementError>) -> Result<T, EntitlementError> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(EntitlementError::Cancelled) => Err(EntitlementError::Cancelled),
        Err(EntitlementError::Network) => Err(EntitlementError::Network),
        Err(EntitlementError::AlreadyOwned) => Err(EntitlementError::AlreadyOwned),
        Err(EntitlementError::NotConfigured) => Err(EntitlementError::NotConfigured),
        Err(EntitlementError::Other(message)) => Err(EntitlementError::Other(message.clone())),
    }
}

#[async_trait]
impl EntitlementClient for MockEntitlementClient {
    async fn configure(&self, _api_key: &str, _app_user_id: Option<&str>) -> Result<(), EntitlementError> {
        self.record("configure");
        clone_result(&self.configure_result.lock().expect("mock lock poisoned"))
    }

    async fn get_offerings(&self) -> Result<Offerings, EntitlementError> {
        self.record("get_offerings");
        clone_result(&self.offerings.lock().expect("mock lock poisoned"))
    }

    async fn purchase_package(&self, _offering_id: &str, _package_id: &str) -> Result<PurchaseResult, EntitlementError> {
        self.record("purchase_package");
        clone_result(&self.purchase.lock().expect("mock lock poisoned"))
    }

    async fn restore_purchases(&self) -> Result<CustomerInfo, EntitlementError> {
        self.record("restore_purchases");
        clone_result(&self.restore.lock().expect("mock lock poisoned"))
    }

    async fn get_customer_info(&self) -> Result<CustomerInfo, EntitlementError> {
        self.record("get_customer_info");
        clone_result(&self.customer_info.lock().expect("mock lock poisoned"))
    }
}

pub fn offerings_with(package_ids: &[&str]) -> Offerings {
    Offerings {
        current: Some(Offering {
            identifier: "default".to_string(),
            available_packages: package_ids
                .iter()
                .map(|id| EntitlementPackage {
                    identifier: id.to_string(),
                    price_string: None,
                })
                .collect(),
        }),
    }
}

pub fn active_customer_info(entitlement: &str, product_id: &str) -> CustomerInfo {
    let mut active = std::collections::HashMap::new();
    active.insert(
        entitlement.to_string(),
        EntitlementInfo {
            product_identifier: product_id.to_string(),
            expires_date: Some(chrono::Utc::now() + chrono::Duration::days(30)),
        },
    );
    CustomerInfo {
        entitlements: Entitlements { active },
    }
}
