use crate::{
    auth::{
        generate_token, hash_password, verify_password, AuthResponse, AuthSession, LoginRequest,
        SignupRequest,
    },
    error::AppError,
    models::{UpdateUserRequest, User},
};
use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use futures::{StreamExt, TryStreamExt};
use sqlx::PgPool;
use validator::Validate;

/// Largest accepted avatar upload, in bytes.
const AVATAR_MAX_BYTES: usize = 1_000_000;

/// Image formats accepted for avatars.
const AVATAR_ALLOWED_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";

async fn fetch_user(pool: &PgPool, user_id: i32) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Issues a fresh token and records it as a live session for the user.
/// Sessions accumulate; each login adds one without touching the others.
async fn open_session(pool: &PgPool, user_id: i32) -> Result<String, AppError> {
    let token = generate_token(user_id)?;

    sqlx::query("INSERT INTO sessions (user_id, token) VALUES ($1, $2)")
        .bind(user_id)
        .bind(&token)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Sign up a new user
///
/// Creates the account, opens a session and returns the profile plus a bearer
/// token. The password is stored only as a bcrypt hash.
#[post("")]
pub async fn signup(
    pool: web::Data<PgPool>,
    signup_data: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    signup_data.validate()?;

    // Check if email already exists
    let existing: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&signup_data.email)
        .fetch_optional(&**pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&signup_data.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&signup_data.name)
    .bind(&signup_data.email)
    .bind(&password_hash)
    .fetch_one(&**pool)
    .await?;

    let token = open_session(&pool, user.id).await?;

    Ok(HttpResponse::Created().json(AuthResponse { user, token }))
}

/// Login
///
/// Verifies the credentials and opens an additional session. Earlier tokens
/// stay valid, supporting concurrent multi-device sessions.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let credentials: Option<(i32, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(&login_data.email)
            .fetch_optional(&**pool)
            .await?;

    // Unknown email and wrong password are reported identically.
    let (user_id, password_hash) = credentials
        .ok_or_else(|| AppError::Authentication("Unable to login".into()))?;

    if !verify_password(&login_data.password, &password_hash)? {
        return Err(AppError::Authentication("Unable to login".into()));
    }

    let user = fetch_user(&pool, user_id).await?;
    let token = open_session(&pool, user_id).await?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
}

/// Logout the presented session only; other devices stay logged in.
#[post("/logout")]
pub async fn logout(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token = $2")
        .bind(session.user_id)
        .bind(&session.token)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Logout every session of the authenticated user.
#[post("/logoutAll")]
pub async fn logout_all(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(session.user_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Get the authenticated user's profile.
#[get("/me")]
pub async fn me(pool: web::Data<PgPool>, session: AuthSession) -> Result<impl Responder, AppError> {
    let user = fetch_user(&pool, session.user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Update the authenticated user's profile.
///
/// Only `name`, `email` and `password` are mutable; anything else in the body
/// is a validation failure. An email change is re-checked for uniqueness and
/// a new password is re-hashed before storage.
#[patch("/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    session: AuthSession,
    update_data: web::Json<UpdateUserRequest>,
) -> Result<impl Responder, AppError> {
    update_data.validate()?;

    if update_data.is_empty() {
        let user = fetch_user(&pool, session.user_id).await?;
        return Ok(HttpResponse::Ok().json(user));
    }

    if let Some(Some(email)) = &update_data.email {
        let taken: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(email)
                .bind(session.user_id)
                .fetch_optional(&**pool)
                .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
    }

    // Assemble the SET list from whichever fields are present.
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    let mut param_count = 1;

    if let Some(Some(name)) = &update_data.name {
        sets.push(format!("name = ${}", param_count));
        values.push(name.clone());
        param_count += 1;
    }
    if let Some(Some(email)) = &update_data.email {
        sets.push(format!("email = ${}", param_count));
        values.push(email.clone());
        param_count += 1;
    }
    if let Some(Some(password)) = &update_data.password {
        sets.push(format!("password_hash = ${}", param_count));
        values.push(hash_password(password)?);
        param_count += 1;
    }
    sets.push("updated_at = now()".to_string());

    let sql = format!(
        "UPDATE users SET {} WHERE id = ${} RETURNING {}",
        sets.join(", "),
        param_count,
        USER_COLUMNS
    );

    let mut query_builder = sqlx::query_as::<_, User>(&sql);
    for value in &values {
        query_builder = query_builder.bind(value);
    }
    let user = query_builder.bind(session.user_id).fetch_one(&**pool).await?;

    Ok(HttpResponse::Ok().json(user))
}

/// Delete the authenticated user's account.
///
/// Session rows and all tasks owned by the user are removed by the store's
/// cascading foreign keys; the deleted profile is returned.
#[delete("/me")]
pub async fn delete_me(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "DELETE FROM users WHERE id = $1 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(session.user_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(user))
}

/// Upload an avatar image.
///
/// Expects a multipart form with an `avatar` file field. Only JPEG and PNG
/// are accepted, up to `AVATAR_MAX_BYTES`; the image replaces any previous
/// avatar.
#[post("/me/avatar")]
pub async fn upload_avatar(
    pool: web::Data<PgPool>,
    session: AuthSession,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut avatar: Option<(Vec<u8>, String)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != "avatar" {
            continue;
        }

        let mime = field.content_type().map(|m| m.to_string()).unwrap_or_default();
        if !AVATAR_ALLOWED_TYPES.contains(&mime.as_str()) {
            return Err(AppError::Validation(
                "avatar must be a JPEG or PNG image".into(),
            ));
        }

        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::Validation(format!("Upload failed: {}", e)))?;
            if buffer.len() + chunk.len() > AVATAR_MAX_BYTES {
                return Err(AppError::Validation(format!(
                    "avatar must be smaller than {} bytes",
                    AVATAR_MAX_BYTES
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        avatar = Some((buffer, mime));
    }

    let (bytes, mime) =
        avatar.ok_or_else(|| AppError::Validation("avatar file field is required".into()))?;

    sqlx::query("UPDATE users SET avatar = $1, avatar_mime = $2, updated_at = now() WHERE id = $3")
        .bind(&bytes)
        .bind(&mime)
        .bind(session.user_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Remove the authenticated user's avatar.
#[delete("/me/avatar")]
pub async fn delete_avatar(
    pool: web::Data<PgPool>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    sqlx::query("UPDATE users SET avatar = NULL, avatar_mime = NULL, updated_at = now() WHERE id = $1")
        .bind(session.user_id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Serve a user's avatar image. Public: avatars are displayable without a
/// session, and absence of user or avatar is a plain 404.
#[get("/{id}/avatar")]
pub async fn get_avatar(
    pool: web::Data<PgPool>,
    user_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let row: Option<(Option<Vec<u8>>, Option<String>)> =
        sqlx::query_as("SELECT avatar, avatar_mime FROM users WHERE id = $1")
            .bind(user_id.into_inner())
            .fetch_optional(&**pool)
            .await?;

    match row {
        Some((Some(bytes), Some(mime))) => {
            Ok(HttpResponse::Ok().content_type(mime).body(bytes))
        }
        _ => Err(AppError::NotFound("Avatar not found".into())),
    }
}
