use std::sync::Arc;

use serde_json::{Value, json};
use validator::Validate;

use crate::api::{ApiClient, Endpoint};
use crate::error::AppError;
use crate::models::subscription::SupportRequest;
use crate::service::auth::AuthService;

/// Submits help/contact requests, backfilling identity fields from the
/// session profile when the form leaves them blank.
pub struct SupportService {
    api: Arc<ApiClient>,
    auth: Arc<AuthService>,
}

impl SupportService {
    pub fn new(api: Arc<ApiClient>, auth: Arc<AuthService>) -> Self {
        Self { api, auth }
    }

    pub async fn submit_request(&self, request: &SupportRequest) -> Result<String, AppError> {
        request.validate()?;

        let user = self.auth.user();
        let full_name = request
            .full_name
            .clone()
            .or_else(|| user.as_ref().map(|u| u.full_name()))
            .unwrap_or_default();
        let mobile_number = request
            .mobile_number
            .clone()
            .or_else(|| user.as_ref().map(|u| u.mobile_no.clone()))
            .unwrap_or_default();
        let email = user.as_ref().map(|u| u.email.clone()).unwrap_or_default();

        let mut payload = json!({
            "fullName": full_name,
            "mobileNumber": mobile_number,
            "message": request.message,
            "email": email,
            "type": "support_request",
        });
        if let Some(token) = self.auth.access_token() {
            payload["accessToken"] = json!(token);
        }

        let result = match self.api.call(Endpoint::SubmitSupport, payload).await {
            Ok(result) => result,
            Err(err) => {
                self.auth.handle_auth_error(&err);
                return Err(err);
            }
        };

        Ok(result
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Your request has been submitted.")
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::service::auth::{ACCESS_TOKEN_KEY, USER_KEY};
    use crate::store::{KvStore, MemoryStore};
    use crate::test_utils::MockTransport;

    fn fixture() -> (SupportService, Arc<MockTransport>) {
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "tok_abc123");
        store.set(
            USER_KEY,
            r#"{"id": 7, "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com", "mobileNo": "+20100000000"}"#,
        );

        let transport = Arc::new(MockTransport::new());
        let api = Arc::new(ApiClient::new(
            ApiConfig {
                base_url: "https://backend.test/api".to_string(),
                api_key: "key".to_string(),
            },
            transport.clone() as Arc<dyn crate::api::HttpTransport>,
        ));
        let auth = Arc::new(AuthService::new(api.clone(), store as Arc<dyn KvStore>));
        (SupportService::new(api, auth), transport)
    }

    #[tokio::test]
    async fn profile_fields_backfill_the_request() {
        let (support, transport) = fixture();
        transport.push_ok(200, serde_json::json!({"status": "Ok", "message": "Ticket #42 created"}).to_string());

        let message = support
            .submit_request(&SupportRequest {
                message: "The cards will not flip".to_string(),
                ..SupportRequest::default()
            })
            .await
            .expect("submit ok");

        assert_eq!(message, "Ticket #42 created");
        let (_, body) = transport.request(0);
        assert_eq!(body["fullName"], "Ada Lovelace");
        assert_eq!(body["mobileNumber"], "+20100000000");
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["type"], "support_request");
        assert_eq!(body["accessToken"], "tok_abc123");
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_network() {
        let (support, transport) = fixture();

        let err = support
            .submit_request(&SupportRequest::default())
            .await
            .expect_err("must fail");
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(transport.request_count(), 0);
    }
}
