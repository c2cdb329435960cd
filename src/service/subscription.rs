use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::api::{ApiClient, Endpoint};
use crate::cache::TtlCache;
use crate::config::EntitlementsConfig;
use crate::entitlements::{CustomerInfo, EntitlementClient, Offering, PurchaseResult};
use crate::error::AppError;
use crate::models::subscription::{PaymentPackage, PaymentReference, PurchaseReceipt, RestoreOutcome, Subscription};
use crate::service::auth::AuthService;
use crate::store::KvStore;

const PACKAGES_KEY: &str = "subscription_packages";
const PACKAGES_TIMESTAMP_KEY: &str = "subscription_packages_timestamp";

/// Drives the three-phase subscription purchase protocol against the
/// backend and the entitlement SDK.
///
/// Phase order is a hard invariant: the backend must hold a pending
/// payment row (initiate) before any money can change hands (purchase),
/// so its ledger can be reconciled against the entitlement provider's
/// webhooks even if this process dies before phase three (record). The
/// record phase is deliberately fire-and-forget relative to the caller's
/// success: a completed entitlement purchase is never reported as a
/// failure because of a bookkeeping write.
pub struct SubscriptionService {
    api: Arc<ApiClient>,
    auth: Arc<AuthService>,
    entitlements: Arc<dyn EntitlementClient>,
    cache: TtlCache,
    config: EntitlementsConfig,
    packages_ttl: Duration,
    configured: AtomicBool,
}

impl SubscriptionService {
    pub fn new(
        api: Arc<ApiClient>,
        auth: Arc<AuthService>,
        entitlements: Arc<dyn EntitlementClient>,
        store: Arc<dyn KvStore>,
        config: EntitlementsConfig,
        packages_ttl: Duration,
    ) -> Self {
        Self {
            api,
            auth,
            entitlements,
            cache: TtlCache::new(store),
            config,
            packages_ttl,
            configured: AtomicBool::new(false),
        }
    }

    pub async fn get_payment_packages(&self, force_refresh: bool) -> Result<Vec<PaymentPackage>, AppError> {
        let cached: Option<Vec<PaymentPackage>> = self.cache.get_item(PACKAGES_KEY);
        let fetched_at: Option<i64> = self.cache.get_item(PACKAGES_TIMESTAMP_KEY);

        let now = Utc::now().timestamp_millis();
        let fresh = fetched_at
            .map(|at| now.saturating_sub(at) < self.packages_ttl.as_millis() as i64)
            .unwrap_or(false);

        if let Some(packages) = &cached {
            if !force_refresh && !packages.is_empty() && fresh {
                return Ok(packages.clone());
            }
        }

        let mut payload = json!({});
        if let Some(token) = self.auth.access_token() {
            payload["accessToken"] = json!(token);
        }

        match self.api.call(Endpoint::GetPaymentPackages, payload).await {
            Ok(result) => {
                let packages: Vec<PaymentPackage> = serde_json::from_value(result).unwrap_or_default();
                let now = Utc::now().timestamp_millis();
                self.cache.set_item(PACKAGES_KEY, &packages, self.packages_ttl);
                self.cache.set_item(PACKAGES_TIMESTAMP_KEY, &now, self.packages_ttl);
                Ok(packages)
            }
            Err(err) => {
                self.auth.handle_auth_error(&err);
                if let Some(packages) = cached.filter(|p| !p.is_empty()) {
                    warn!(error = %err, "package fetch failed, serving stale cache");
                    return Ok(packages);
                }
                Err(err)
            }
        }
    }

    /// Executes one purchase attempt: initiate, purchase, record.
    pub async fn purchase_package(&self, package_id: i64) -> Result<PurchaseReceipt, AppError> {
        self.ensure_configured().await?;

        let product_id = self
            .config
            .product_id(package_id)
            .ok_or_else(|| AppError::PurchaseUnavailable("Product not available for purchase".to_string()))?
            .to_string();

        // Phase 1: a pending payment row must exist server-side before the
        // user can be charged. No reference, no purchase.
        let reference = self.initiate_payment(package_id).await?;
        info!(package_id, ref_no = %reference.ref_no, "payment initiated");

        // Phase 2: offerings are fetched fresh on every attempt; pricing
        // and eligibility can change between attempts.
        let offerings = self.entitlements.get_offerings().await.map_err(AppError::from)?;
        let offering = offerings
            .current
            .ok_or_else(|| AppError::PurchaseUnavailable("No subscription offerings available".to_string()))?;
        let purchase = self.purchase_from_offering(&offering, &product_id).await?;

        // Phase 3: bookkeeping only. The entitlement purchase has already
        // succeeded and must not be rolled back or reported as a failure.
        let recorded = match self
            .record_subscription(&reference.ref_no, package_id, &product_id, &purchase)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(
                    ref_no = %reference.ref_no,
                    package_id,
                    error = %err,
                    "failed to record completed purchase, leaving for out-of-band reconciliation"
                );
                false
            }
        };

        Ok(PurchaseReceipt {
            payment_ref: reference.ref_no,
            package_id,
            product_id,
            customer_info: purchase.customer_info,
            recorded,
        })
    }

    /// Backend-held subscription truth. Entitlement checks are
    /// safety-critical, so this is always a live fetch, never TTL-cached.
    pub async fn get_user_subscription(&self) -> Result<Option<Subscription>, AppError> {
        let token = self.auth.access_token().ok_or(AppError::AuthenticationRequired)?;

        let result = match self.api.call(Endpoint::GetSubscription, json!({"accessToken": token})).await {
            Ok(result) => result,
            Err(err) => {
                self.auth.handle_auth_error(&err);
                return Err(err);
            }
        };

        Ok(result
            .get("subscription")
            .and_then(|s| serde_json::from_value(s.clone()).ok()))
    }

    pub async fn restore_purchases(&self) -> Result<RestoreOutcome, AppError> {
        self.ensure_configured().await?;

        let customer_info = self.entitlements.restore_purchases().await.map_err(AppError::from)?;

        if customer_info.has_active_entitlement() {
            Ok(RestoreOutcome {
                success: true,
                message: "Purchases restored successfully! Your subscription is now active.".to_string(),
            })
        } else {
            Ok(RestoreOutcome {
                success: false,
                message: "No active subscriptions found".to_string(),
            })
        }
    }

    /// Read-only passthrough; an unconfigured SDK reads as absent rather
    /// than an error.
    pub async fn get_customer_info(&self) -> Option<CustomerInfo> {
        if self.ensure_configured().await.is_err() {
            return None;
        }
        self.entitlements.get_customer_info().await.ok()
    }

    pub fn clear_cache(&self) {
        self.cache.remove_item(PACKAGES_KEY);
        self.cache.remove_item(PACKAGES_TIMESTAMP_KEY);
    }

    async fn ensure_configured(&self) -> Result<(), AppError> {
        if self.configured.load(Ordering::Acquire) {
            return Ok(());
        }

        if self.config.api_key.is_empty() {
            return Err(AppError::PurchaseUnavailable(
                "In-app purchases not available on this platform.".to_string(),
            ));
        }

        let app_user_id = self.auth.user().and_then(|u| u.id).map(|id| id.to_string());
        self.entitlements
            .configure(&self.config.api_key, app_user_id.as_deref())
            .await
            .map_err(AppError::from)?;

        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    async fn initiate_payment(&self, package_id: i64) -> Result<PaymentReference, AppError> {
        let token = self.auth.access_token().ok_or(AppError::AuthenticationRequired)?;

        let payload = json!({"accessToken": token, "packageId": package_id});
        let result = match self.api.call(Endpoint::InitiatePayment, payload).await {
            Ok(result) => result,
            Err(err) => {
                self.auth.handle_auth_error(&err);
                return Err(err);
            }
        };

        serde_json::from_value::<PaymentReference>(result)
            .ok()
            .filter(|r| !r.ref_no.is_empty())
            .ok_or_else(|| AppError::Backend("Failed to generate payment reference".to_string()))
    }

    async fn purchase_from_offering(&self, offering: &Offering, product_id: &str) -> Result<PurchaseResult, AppError> {
        let package = offering
            .find_package(product_id)
            .ok_or_else(|| AppError::PurchaseUnavailable("Subscription package not found".to_string()))?;

        self.entitlements
            .purchase_package(&offering.identifier, &package.identifier)
            .await
            .map_err(AppError::from)
    }

    async fn record_subscription(
        &self,
        ref_no: &str,
        package_id: i64,
        product_id: &str,
        purchase: &PurchaseResult,
    ) -> Result<(), AppError> {
        let token = self.auth.access_token().ok_or(AppError::AuthenticationRequired)?;

        let payload = json!({
            "accessToken": token,
            "ref_no": ref_no,
            "packageId": package_id,
            "productId": product_id,
            "transactionId": purchase.transaction_identifier,
            "expiryDate": purchase.customer_info.latest_expiry().map(|d| d.to_rfc3339()),
        });

        self.api.call(Endpoint::RecordSubscription, payload).await.map(|_| ())
    }
}
