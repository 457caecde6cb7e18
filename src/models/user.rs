//! User identity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The backend-owned user record.
///
/// The client holds a read-mostly cached copy that is overwritten wholesale
/// on every successful profile/login/signup/update response, never merged
/// field-by-field, so derived fields can't go stale against the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_currency")]
    pub preferred_currency: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub onboarding_complete: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

impl User {
    /// Display name: first/last name when present, username otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !last.is_empty() => format!("{} {}", first, last),
            (Some(first), _) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

/// Partial profile update sent to the backend.
///
/// Only `Some` fields are serialized; the server applies them and returns
/// the full updated record, which replaces the cached copy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_deserializes_with_minimal_fields() {
        let user: User = serde_json::from_str(
            r#"{"id": 7, "username": "maria", "email": "maria@example.com"}"#,
        )
        .unwrap();
        assert_eq!(user.timezone, "UTC");
        assert_eq!(user.preferred_currency, "USD");
        assert!(user.is_active);
        assert!(!user.onboarding_complete);
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "username": "sam", "email": "s@x.com"}"#).unwrap();
        assert_eq!(user.display_name(), "sam");
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            timezone: Some("Europe/Berlin".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"timezone":"Europe/Berlin"}"#);
    }
}
