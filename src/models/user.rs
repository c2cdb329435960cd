use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PROFILE_PHOTO: &str = "assets/profile-placeholder.png";

fn default_profile_photo() -> String {
    DEFAULT_PROFILE_PHOTO.to_string()
}

/// Denormalized user record mirrored from the backend. Owned exclusively
/// by the auth service; consumers read it through the session accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_no: String,
    pub country_id: Option<i64>,
    pub city_id: Option<i64>,
    #[serde(default = "default_profile_photo")]
    pub profile_photo: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: None,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            mobile_no: String::new(),
            country_id: None,
            city_id: None,
            profile_photo: default_profile_photo(),
        }
    }
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    pub mobile_no: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub country_id: i64,
    pub city_id: i64,
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub mobile_no: String,
    pub country_id: Option<i64>,
    pub city_id: Option<i64>,
}

/// What a successful login yields: the new token plus whatever profile
/// could be established at login time.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSession {
    pub access_token: String,
    pub user: Option<UserProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_photo_defaults_to_placeholder() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 7, "firstName": "Ada", "email": "ada@example.com"}"#).expect("decodes");

        assert_eq!(profile.id, Some(7));
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.profile_photo, DEFAULT_PROFILE_PHOTO);
    }

    #[test]
    fn profile_tolerates_unknown_envelope_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"firstName": "Ada", "_envelope": {"status": "Ok"}}"#).expect("decodes");
        assert_eq!(profile.first_name, "Ada");
    }

    #[test]
    fn register_request_validation() {
        let request = RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "not-an-email".to_string(),
            mobile_no: "+20100000000".to_string(),
            password: "short".to_string(),
            country_id: 1,
            city_id: 2,
        };

        let errors = request.validate().expect_err("invalid request");
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
