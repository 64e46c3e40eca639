use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;
use std::rc::Rc;

use crate::auth::extractors::AuthSession;
use crate::auth::token::verify_token;
use crate::error::AppError;

/// Bearer-token authentication middleware.
///
/// A request authenticates iff its `Authorization: Bearer <token>` header
/// carries a token whose signature verifies AND which is still present in the
/// issuing user's session rows. The second half is what makes logout,
/// logoutAll and account deletion take effect immediately: revocation removes
/// the row, after which a structurally valid token no longer authenticates.
///
/// The check is read-only; on success an `AuthSession` is placed in request
/// extensions for handlers to extract.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    // The session lookup is async, so the inner service must be shareable
    // with the boxed future.
    service: Rc<S>,
}

/// Endpoints reachable without credentials: health probe, signup, login, and
/// fetching a user's avatar image.
fn is_public(req: &ServiceRequest) -> bool {
    let path = req.path();
    if req.method() == Method::OPTIONS {
        // CORS preflights never carry credentials.
        true
    } else if req.method() == Method::POST {
        path == "/users" || path == "/users/login"
    } else if req.method() == Method::GET {
        path == "/health" || (path.starts_with("/users/") && path.ends_with("/avatar"))
    } else {
        false
    }
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(&req) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => {
                    return Err(AppError::Authentication("Please authenticate".into()).into())
                }
            };

            let claims = verify_token(&token)?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .cloned()
                .ok_or_else(|| AppError::Internal("Database pool not configured".into()))?;

            // Signature alone is not enough: the token must still be listed
            // for the user. Covers logout and account deletion.
            let session: Option<(i32,)> =
                sqlx::query_as("SELECT user_id FROM sessions WHERE user_id = $1 AND token = $2")
                    .bind(claims.sub)
                    .bind(&token)
                    .fetch_optional(pool.get_ref())
                    .await
                    .map_err(AppError::from)?;

            if session.is_none() {
                return Err(AppError::Authentication("Please authenticate".into()).into());
            }

            req.extensions_mut().insert(AuthSession {
                user_id: claims.sub,
                token,
            });

            service.call(req).await
        })
    }
}
