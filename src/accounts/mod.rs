//! User profiles, user-to-user follows, and organization visibility.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::{DbFollow, DbOrganization, DbUser, Role, UserResponse};
use crate::shared::schema::{follows, organizations, users};
use crate::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFollowRequest {
    pub followed: Uuid,
}

/// `PUT /api/users/me`. Email and role are immutable through this path.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let pool = state.conn.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;

        if let Some(ref username) = req.username {
            if username.trim().is_empty() {
                return Err(ApiError::Validation("username cannot be empty".to_string()));
            }
            let taken: i64 = users::table
                .filter(users::username.eq(username))
                .filter(users::id.ne(user.id))
                .count()
                .get_result(&mut conn)?;
            if taken > 0 {
                return Err(ApiError::Conflict(
                    "this username is already in use".to_string(),
                ));
            }
        }

        let updated: DbUser = diesel::update(users::table.filter(users::id.eq(user.id)))
            .set((
                users::username.eq(req.username.unwrap_or(user.username)),
                users::bio.eq(req.bio.or(user.bio)),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?;
        Ok::<_, ApiError>(updated)
    })
    .await??;

    Ok(Json(updated.into()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let pool = state.conn.clone();
    let target = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let target: DbUser = users::table
            .filter(users::id.eq(user_id))
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
        Ok::<_, ApiError>(target)
    })
    .await??;

    Ok(Json(target.into()))
}

/// `POST /api/follows` — follow another user. Get-or-create against the
/// unique (follower, followed) constraint; following an already-followed
/// user is reported as a conflict, matching remove-when-absent below.
pub async fn create_follow(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFollowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.followed == user.id {
        return Err(ApiError::Validation(
            "you cannot follow yourself".to_string(),
        ));
    }

    let pool = state.conn.clone();
    let row = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;

        let exists: i64 = users::table
            .filter(users::id.eq(req.followed))
            .count()
            .get_result(&mut conn)?;
        if exists == 0 {
            return Err(ApiError::NotFound("user not found".to_string()));
        }

        let row = DbFollow {
            id: Uuid::new_v4(),
            follower_id: user.id,
            followed_id: req.followed,
            created_at: Utc::now(),
        };
        let inserted = diesel::insert_into(follows::table)
            .values(&row)
            .on_conflict((follows::follower_id, follows::followed_id))
            .do_nothing()
            .execute(&mut conn)?;
        if inserted == 0 {
            return Err(ApiError::Conflict(
                "you are already following this user".to_string(),
            ));
        }
        Ok::<_, ApiError>(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row)))
}

/// `DELETE /api/follows/{user_id}` — unfollow.
pub async fn delete_follow(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(followed_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(user.id))
                .filter(follows::followed_id.eq(followed_id)),
        )
        .execute(&mut conn)?;
        if deleted == 0 {
            return Err(ApiError::Conflict(
                "you are not following this user".to_string(),
            ));
        }
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/follows` — users the caller follows.
pub async fn list_follows(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let pool = state.conn.clone();
    let followed = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let ids: Vec<Uuid> = follows::table
            .filter(follows::follower_id.eq(user.id))
            .select(follows::followed_id)
            .load(&mut conn)?;
        let rows: Vec<DbUser> = users::table
            .filter(users::id.eq_any(ids))
            .order(users::username.asc())
            .load(&mut conn)?;
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(followed.into_iter().map(UserResponse::from).collect()))
}

/// `GET /api/organizations` — scoped by role: admins see all, subadmins the
/// organizations they administer, everyone else the one they belong to.
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<DbOrganization>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let caps = access::capabilities(&user);
        let rows: Vec<DbOrganization> = if caps.can_view_all_users {
            organizations::table
                .order(organizations::name.asc())
                .load(&mut conn)?
        } else if user.role() == Role::Subadmin {
            organizations::table
                .filter(organizations::admin_id.eq(user.id))
                .order(organizations::name.asc())
                .load(&mut conn)?
        } else {
            match user.organization_id {
                Some(org_id) => organizations::table
                    .filter(organizations::id.eq(org_id))
                    .load(&mut conn)?,
                None => Vec::new(),
            }
        };
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(rows))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/{id}", get(get_user))
        .route("/api/follows", get(list_follows).post(create_follow))
        .route("/api/follows/{user_id}", delete(delete_follow))
        .route("/api/organizations", get(list_organizations))
}
