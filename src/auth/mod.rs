pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// Re-export necessary items
pub use extractors::AuthSession;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{generate_token, verify_token, Claims};

use crate::models::user::User;

/// Password policy: at least 7 characters and must not literally contain the
/// substring "password" (case-insensitive).
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.to_lowercase().contains("password") {
        return Err(ValidationError::new("password_contains_password"));
    }
    Ok(())
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// User's email address. Must be a valid email format.
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Represents the payload for a new account signup request.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    /// Display name for the new account. Must be non-empty.
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    /// Email address for the new account. Must be a valid email format and is
    /// unique across all users.
    #[validate(email)]
    pub email: String,
    #[validate(
        length(min = 7, message = "password must be at least 7 characters"),
        custom = "validate_password_policy"
    )]
    pub password: String,
}

/// Response structure after successful authentication (login or signup).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The public profile of the authenticated user.
    pub user: User,
    /// The bearer token for session authentication. Valid until it expires,
    /// is logged out, or the account is deleted.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "MyPass777!".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let invalid_email_login = LoginRequest {
            email: "testexample.com".to_string(),
            password: "MyPass777!".to_string(),
        };
        assert!(invalid_email_login.validate().is_err());
    }

    #[test]
    fn test_signup_request_validation() {
        let valid_signup = SignupRequest {
            name: "Mike".to_string(),
            email: "test@example.com".to_string(),
            password: "MyPass777!".to_string(),
        };
        assert!(valid_signup.validate().is_ok());

        let empty_name = SignupRequest {
            name: "".to_string(),
            email: "test@example.com".to_string(),
            password: "MyPass777!".to_string(),
        };
        assert!(empty_name.validate().is_err());

        let bad_email = SignupRequest {
            name: "Mike".to_string(),
            email: "thisIsAEmail".to_string(),
            password: "MyPass777!".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = SignupRequest {
            name: "Mike".to_string(),
            email: "test@example.com".to_string(),
            password: "abc12".to_string(),
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_password_policy_rejects_the_word_password() {
        for candidate in ["password", "Password123", "myPASSWORD!", "xxpasswordxx"] {
            assert!(
                validate_password_policy(candidate).is_err(),
                "{:?} should be rejected",
                candidate
            );
        }
        assert!(validate_password_policy("MyPass777!").is_ok());
    }
}
