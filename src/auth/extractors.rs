use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

/// The authenticated session for the current request.
///
/// Inserted into request extensions by `AuthMiddleware` after the bearer token
/// has been verified and matched against the user's session rows. Carries the
/// presented token as well as the user id so that logout can remove exactly
/// the session that made the request.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i32,
    pub token: String,
}

impl FromRequest for AuthSession {
    type Error = ActixError; // AppError converts into ActixError via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthSession>().cloned() {
            Some(session) => ready(Ok(session)),
            None => {
                // Only reachable when a protected handler is mounted outside
                // AuthMiddleware; treat it as an unauthenticated request.
                let err = AppError::Authentication("Please authenticate".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
