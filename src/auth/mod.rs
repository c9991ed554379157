//! Signup/login/logout and the bearer-token extractor.
//!
//! Tokens are opaque: 32 random bytes, hex-encoded, stored in
//! `auth_tokens`. A valid token resolves to exactly one user; anything
//! else is rejected with 401.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use rand::RngCore;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::models::{DbAuthToken, DbUser, Role, UserResponse};
use crate::shared::schema::{auth_tokens, users};
use crate::shared::state::AppState;
use crate::shared::utils::DbPool;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns the user's existing token or mints one.
pub fn get_or_create_token(
    conn: &mut PgConnection,
    uid: Uuid,
) -> Result<String, diesel::result::Error> {
    let existing: Option<String> = auth_tokens::table
        .filter(auth_tokens::user_id.eq(uid))
        .select(auth_tokens::token)
        .first(conn)
        .optional()?;
    if let Some(token) = existing {
        return Ok(token);
    }

    let row = DbAuthToken {
        id: Uuid::new_v4(),
        user_id: uid,
        token: generate_token(),
        created_at: Utc::now(),
    };
    diesel::insert_into(auth_tokens::table)
        .values(&row)
        .execute(conn)?;
    Ok(row.token)
}

fn resolve_token(conn: &mut PgConnection, token: &str) -> Result<DbUser, ApiError> {
    auth_tokens::table
        .inner_join(users::table)
        .filter(auth_tokens::token.eq(token))
        .select(users::all_columns)
        .first::<DbUser>(conn)
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn lookup_user(pool: DbPool, token: String) -> Result<DbUser, ApiError> {
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        resolve_token(&mut conn, &token)
    })
    .await?
}

/// Extractor for endpoints that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub DbUser);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;
        let user = lookup_user(state.conn.clone(), token).await?;
        Ok(AuthUser(user))
    }
}

/// Extractor for public endpoints that personalize when a token is present.
/// A missing header yields `None`; a present-but-invalid token is still 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<DbUser>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let user = lookup_user(state.conn.clone(), token).await?;
                Ok(MaybeAuthUser(Some(user)))
            }
        }
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::Validation(
            "username and email are required".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".to_string()));
    }
    if req.password != req.password2 {
        return Err(ApiError::Validation(
            "password fields didn't match".to_string(),
        ));
    }

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let now = Utc::now();
        let user = DbUser {
            id: Uuid::new_v4(),
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash: hash_password(&req.password)?,
            role: Role::User.as_str().to_string(),
            bio: req.bio,
            organization_id: None,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(users::table)
            .values(&user)
            .execute(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => ApiError::Conflict("username or email already in use".to_string()),
                other => other.into(),
            })?;
        let token = get_or_create_token(&mut conn, user.id)?;
        info!("user signed up: {}", user.username);
        Ok::<_, ApiError>(AuthResponse {
            token,
            user: user.into(),
        })
    })
    .await??;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let user: Option<DbUser> = users::table
            .filter(users::username.eq(&req.username))
            .first(&mut conn)
            .optional()?;
        let user = match user {
            Some(u) if verify_password(&req.password, &u.password_hash) => u,
            _ => return Err(ApiError::Unauthorized("invalid credentials".to_string())),
        };
        let token = get_or_create_token(&mut conn, user.id)?;
        Ok::<_, ApiError>(AuthResponse {
            token,
            user: user.into(),
        })
    })
    .await??;

    Ok(Json(response))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        diesel::delete(auth_tokens::table.filter(auth_tokens::user_id.eq(user.id)))
            .execute(&mut conn)?;
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/signup", post(signup))
        .route("/api/users/login", post(login))
        .route("/api/users/logout", post(logout))
        .route(
            "/api/users/me",
            get(me).put(crate::accounts::update_profile),
        )
}

#[cfg(test)]
mod tests;
