use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::validate_email;

use crate::auth::validate_password_policy;
use crate::error::AppError;
use crate::models::double_option;

/// Public profile of a user as returned by the API.
///
/// Deliberately excludes the password hash, the session token rows and the
/// avatar bytes; handlers select only these columns when shaping responses.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `PATCH /users/me`.
///
/// Only `name`, `email` and `password` are mutable; any other field in the
/// body fails deserialization (400). Each field is a double `Option` so an
/// explicit `null` is distinguished from an absent field and rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub password: Option<Option<String>>,
}

impl UpdateUserRequest {
    /// Checks every present field against the same rules signup applies.
    /// An empty body is valid and updates nothing.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            match name {
                Some(name) if !name.trim().is_empty() => {}
                _ => return Err(AppError::Validation("name must be a non-empty string".into())),
            }
        }
        if let Some(email) = &self.email {
            match email {
                Some(email) if validate_email(email) => {}
                _ => return Err(AppError::Validation("email is not valid".into())),
            }
        }
        if let Some(password) = &self.password {
            match password {
                Some(password)
                    if password.len() >= 7 && validate_password_policy(password).is_ok() => {}
                _ => {
                    return Err(AppError::Validation(
                        "password must be at least 7 characters and must not contain \"password\""
                            .into(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(body: serde_json::Value) -> Result<UpdateUserRequest, serde_json::Error> {
        serde_json::from_value(body)
    }

    #[test]
    fn test_update_accepts_known_fields() {
        let req = from_json(serde_json::json!({ "name": "Mike" })).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.name, Some(Some("Mike".to_string())));
        assert!(req.email.is_none());
    }

    #[test]
    fn test_update_rejects_unknown_field() {
        let result = from_json(serde_json::json!({ "location": "Thailand" }));
        assert!(result.is_err(), "Unknown fields must fail deserialization");
    }

    #[test]
    fn test_update_rejects_explicit_null() {
        let req = from_json(serde_json::json!({ "name": null })).unwrap();
        assert_eq!(req.name, Some(None));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_rejects_invalid_email() {
        let req = from_json(serde_json::json!({ "email": "thisIsAEmail" })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_rejects_weak_password() {
        let req = from_json(serde_json::json!({ "password": "password" })).unwrap();
        assert!(req.validate().is_err());

        let req = from_json(serde_json::json!({ "password": "abc12" })).unwrap();
        assert!(req.validate().is_err());

        let req = from_json(serde_json::json!({ "password": "youHasBeenHack!55" })).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_update_is_valid() {
        let req = from_json(serde_json::json!({})).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.is_empty());
    }
}
