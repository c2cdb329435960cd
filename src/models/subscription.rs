use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entitlements::CustomerInfo;

/// Purchasable subscription package as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentPackage {
    pub id: i64,
    pub name: String,
    pub price: Option<f64>,
    pub description: String,
}

/// Ephemeral correlation record returned when a purchase is initiated.
/// Held only for the duration of a single purchase attempt; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentReference {
    pub ref_no: String,
}

/// Backend-held truth of the user's current subscription. Always fetched
/// live; entitlement checks must never run against a TTL cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    pub package_id: Option<i64>,
    pub package_name: String,
    pub expiry_date: Option<String>,
}

/// Outcome of a completed purchase attempt. `recorded` is false when the
/// backend bookkeeping call failed after the entitlement purchase
/// succeeded; the purchase itself still stands.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub payment_ref: String,
    pub package_id: i64,
    pub product_id: String,
    pub customer_info: CustomerInfo,
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    pub full_name: Option<String>,
    pub mobile_number: Option<String>,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}
