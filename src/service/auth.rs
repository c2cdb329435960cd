use std::sync::{Arc, RwLock};

use serde_json::{Value, json};
use tracing::warn;
use validator::Validate;

use crate::api::{ApiClient, Endpoint, strip_diagnostics};
use crate::cache::TtlCache;
use crate::error::AppError;
use crate::models::user::{LoginSession, RegisterRequest, UpdateProfileRequest, UserProfile};
use crate::store::KvStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const USER_KEY: &str = "user";

#[derive(Debug, Default, Clone)]
struct SessionState {
    access_token: Option<String>,
    user: Option<UserProfile>,
}

/// Owns the authentication token and user profile.
///
/// A stored token is restored optimistically at construction and trusted
/// until the first authenticated call answers "session expired"; that
/// answer (from any endpoint) triggers the same full wipe as an explicit
/// logout, because cached data may be user-specific. Every transition
/// that changes the token or profile persists to the store before the
/// call returns.
pub struct AuthService {
    api: Arc<ApiClient>,
    store: Arc<dyn KvStore>,
    cache: TtlCache,
    state: RwLock<SessionState>,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>, store: Arc<dyn KvStore>) -> Self {
        let access_token = store.get(ACCESS_TOKEN_KEY);
        let user = store.get(USER_KEY).and_then(|raw| serde_json::from_str(&raw).ok());
        let cache = TtlCache::new(Arc::clone(&store));

        Self {
            api,
            store,
            cache,
            state: RwLock::new(SessionState { access_token, user }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().expect("session lock poisoned").access_token.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().expect("session lock poisoned").access_token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().expect("session lock poisoned").user.clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AppError> {
        let payload = json!({"email": email, "password": password});
        let result = self.api.call(Endpoint::Login, payload).await.map_err(classify_login_error)?;

        // The backend conflates the access token with the envelope's
        // message field; the normalizer surfaces it as a synthetic
        // `message` key on the login payload.
        let access_token = extract_access_token(&result)
            .ok_or_else(|| AppError::Backend("No access token received from server".to_string()))?;
        self.persist_token(Some(&access_token));

        let user = match self.fetch_profile().await {
            Ok(profile) => Some(profile),
            Err(err) if err.is_session_expired() => return Err(err),
            Err(err) => {
                warn!(error = %err, "profile fetch after login failed, using login payload");
                residual_profile(&result)
            }
        };
        self.persist_user(user.as_ref());

        Ok(LoginSession { access_token, user })
    }

    /// Registers a new account. Does not authenticate the caller.
    pub async fn register(&self, request: &RegisterRequest) -> Result<String, AppError> {
        request.validate()?;

        let payload = serde_json::to_value(request).map_err(|_| AppError::InvalidResponseFormat)?;
        let result = self.api.call(Endpoint::Register, payload).await?;

        Ok(confirmation(
            &result,
            "Registration successful. Please check your email for verification.",
        ))
    }

    /// Fetches the profile from the backend and replaces the locally held
    /// copy wholesale.
    pub async fn get_profile(&self) -> Result<UserProfile, AppError> {
        if !self.is_authenticated() {
            return Err(AppError::AuthenticationRequired);
        }

        let profile = self.fetch_profile().await?;
        self.persist_user(Some(&profile));
        Ok(profile)
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<UserProfile, AppError> {
        request.validate()?;
        let token = self.access_token().ok_or(AppError::AuthenticationRequired)?;

        let mut payload = serde_json::to_value(request).map_err(|_| AppError::InvalidResponseFormat)?;
        payload["accessToken"] = json!(token);

        if let Err(err) = self.api.call(Endpoint::UpdateProfile, payload).await {
            self.handle_auth_error(&err);
            return Err(err);
        }

        // Refetch wholesale so the local profile matches backend truth;
        // never patch fields locally.
        let profile = self.fetch_profile().await?;
        self.persist_user(Some(&profile));
        Ok(profile)
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<String, AppError> {
        let token = self.access_token().ok_or(AppError::AuthenticationRequired)?;
        if new_password.len() < 8 {
            return Err(AppError::Validation("Password must be at least 8 characters".to_string()));
        }

        let payload = json!({
            "accessToken": token,
            "currentPassword": current_password,
            "newPassword": new_password,
        });

        match self.api.call(Endpoint::ChangePassword, payload).await {
            Ok(result) => Ok(confirmation(&result, "Password changed successfully.")),
            Err(err) => {
                self.handle_auth_error(&err);
                Err(err)
            }
        }
    }

    /// Requests a password reset email. Session state is untouched.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AppError> {
        let result = self.api.call(Endpoint::ForgotPassword, json!({"email": email})).await?;
        Ok(confirmation(&result, "Reset instructions sent to your email."))
    }

    /// Full session wipe: token, profile, and every cache namespace.
    /// Per-game progress keys are not cache entries and survive.
    pub fn logout(&self) {
        {
            let mut state = self.state.write().expect("session lock poisoned");
            state.access_token = None;
            state.user = None;
        }
        self.store.remove(ACCESS_TOKEN_KEY);
        self.store.remove(USER_KEY);
        self.cache.clear();
    }

    /// Central reaction to authentication-invalid answers. Services route
    /// their call failures through here so a 401 from any endpoint wipes
    /// the session exactly like an explicit logout.
    pub fn handle_auth_error(&self, error: &AppError) {
        if error.is_session_expired() {
            warn!("session expired, wiping local session");
            self.logout();
        }
    }

    async fn fetch_profile(&self) -> Result<UserProfile, AppError> {
        let token = self.access_token().ok_or(AppError::AuthenticationRequired)?;

        let result = match self.api.call(Endpoint::GetProfile, json!({"accessToken": token})).await {
            Ok(result) => result,
            Err(err) => {
                self.handle_auth_error(&err);
                return Err(err);
            }
        };

        serde_json::from_value(strip_diagnostics(&result)).map_err(|_| AppError::InvalidResponseFormat)
    }

    fn persist_token(&self, token: Option<&str>) {
        self.state.write().expect("session lock poisoned").access_token = token.map(str::to_string);
        match token {
            Some(token) => self.store.set(ACCESS_TOKEN_KEY, token),
            None => self.store.remove(ACCESS_TOKEN_KEY),
        }
    }

    fn persist_user(&self, user: Option<&UserProfile>) {
        self.state.write().expect("session lock poisoned").user = user.cloned();
        match user.and_then(|u| serde_json::to_string(u).ok()) {
            Some(serialized) => self.store.set(USER_KEY, &serialized),
            None => self.store.remove(USER_KEY),
        }
    }
}

/// Token extraction fallbacks, in the order the backend has been observed
/// to use: bare string result, conflated message field, explicit field.
fn extract_access_token(payload: &Value) -> Option<String> {
    let candidates = [
        payload.as_str(),
        payload.get("message").and_then(Value::as_str),
        payload.get("accessToken").and_then(Value::as_str),
    ];
    candidates.into_iter().flatten().find(|t| !t.is_empty()).map(str::to_string)
}

/// Login payloads sometimes carry the user record inline. Usable only
/// when an `id` field is present, with the synthetic keys stripped.
fn residual_profile(payload: &Value) -> Option<UserProfile> {
    let cleaned = strip_diagnostics(payload);
    let object = cleaned.as_object()?;
    if !object.contains_key("id") {
        return None;
    }

    let mut object = object.clone();
    object.remove("message");
    serde_json::from_value(Value::Object(object)).ok()
}

fn confirmation(payload: &Value, fallback: &str) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn classify_login_error(error: AppError) -> AppError {
    let message = match &error {
        AppError::Backend(message) | AppError::NotFound(message) => message.to_lowercase(),
        _ => return error,
    };

    if message.contains("wrong email address or password") {
        AppError::InvalidCredentials
    } else if message.contains("email address not found") {
        AppError::EmailNotFound
    } else if message.contains("not verified") {
        AppError::AccountNotVerified
    } else {
        error
    }
}
