//! Seam for the third-party entitlement SDK that brokers platform
//! in-app purchases. The coordinator depends only on this trait; the
//! concrete SDK binding lives with the host application.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("purchase cancelled by user")]
    Cancelled,
    #[error("network failure during purchase")]
    Network,
    #[error("product already owned")]
    AlreadyOwned,
    #[error("entitlement SDK not configured")]
    NotConfigured,
    #[error("{0}")]
    Other(String),
}

impl From<EntitlementError> for AppError {
    fn from(e: EntitlementError) -> Self {
        match e {
            EntitlementError::Cancelled => AppError::PurchaseCancelled,
            EntitlementError::Network => AppError::network("entitlement SDK network failure"),
            EntitlementError::AlreadyOwned => AppError::PurchaseAlreadyOwned,
            EntitlementError::NotConfigured => {
                AppError::PurchaseUnavailable("In-app purchases not available on this platform.".to_string())
            }
            EntitlementError::Other(message) => AppError::Backend(message),
        }
    }
}

/// Current catalog of purchasable packages for this user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Offerings {
    pub current: Option<Offering>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Offering {
    pub identifier: String,
    pub available_packages: Vec<EntitlementPackage>,
}

impl Offering {
    pub fn find_package(&self, identifier: &str) -> Option<&EntitlementPackage> {
        self.available_packages.iter().find(|p| p.identifier == identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntitlementPackage {
    pub identifier: String,
    pub price_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CustomerInfo {
    pub entitlements: Entitlements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Entitlements {
    /// Entitlement name -> active entitlement record.
    pub active: HashMap<String, EntitlementInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntitlementInfo {
    pub product_identifier: String,
    pub expires_date: Option<DateTime<Utc>>,
}

impl CustomerInfo {
    pub fn has_active_entitlement(&self) -> bool {
        !self.entitlements.active.is_empty()
    }

    /// Latest expiry across active entitlements, used when recording a
    /// completed purchase with the backend.
    pub fn latest_expiry(&self) -> Option<DateTime<Utc>> {
        self.entitlements.active.values().filter_map(|e| e.expires_date).max()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseResult {
    pub customer_info: CustomerInfo,
    pub transaction_identifier: Option<String>,
}

#[async_trait]
pub trait EntitlementClient: Send + Sync {
    async fn configure(&self, api_key: &str, app_user_id: Option<&str>) -> Result<(), EntitlementError>;

    /// Current offerings snapshot. Callers must fetch this fresh for every
    /// purchase attempt; pricing and eligibility can change between calls.
    async fn get_offerings(&self) -> Result<Offerings, EntitlementError>;

    async fn purchase_package(&self, offering_id: &str, package_id: &str) -> Result<PurchaseResult, EntitlementError>;

    async fn restore_purchases(&self) -> Result<CustomerInfo, EntitlementError>;

    async fn get_customer_info(&self) -> Result<CustomerInfo, EntitlementError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn latest_expiry_picks_the_furthest_date() {
        let near = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        let far = Utc.with_ymd_and_hms(2027, 9, 1, 0, 0, 0).unwrap();

        let mut active = HashMap::new();
        active.insert(
            "premium".to_string(),
            EntitlementInfo {
                product_identifier: "com.daretoconnect.gold".to_string(),
                expires_date: Some(near),
            },
        );
        active.insert(
            "legacy".to_string(),
            EntitlementInfo {
                product_identifier: "com.daretoconnect.bronze".to_string(),
                expires_date: Some(far),
            },
        );

        let info = CustomerInfo {
            entitlements: Entitlements { active },
        };

        assert!(info.has_active_entitlement());
        assert_eq!(info.latest_expiry(), Some(far));
    }

    #[test]
    fn empty_entitlements_have_no_expiry() {
        let info = CustomerInfo::default();
        assert!(!info.has_active_entitlement());
        assert_eq!(info.latest_expiry(), None);
    }
}
