//! Like / favorite / story-follow membership edges.
//!
//! Each edge set is keyed by (user, story). Adds are atomic against the
//! unique constraint: `ON CONFLICT DO NOTHING` with the affected-row count
//! deciding "created" vs "already present", so concurrent adds agree.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::DbUser;
use crate::shared::schema::{favorites, likes, story_followers};
use crate::shared::state::AppState;
use crate::stories::{ensure_viewable, load_story};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Like,
    Favorite,
    Follower,
}

impl EdgeKind {
    fn noun(&self) -> &'static str {
        match self {
            EdgeKind::Like => "liked",
            EdgeKind::Favorite => "favorited",
            EdgeKind::Follower => "followed",
        }
    }
}

/// Inserts the edge if absent. Returns whether a row was created.
pub fn insert_edge(
    conn: &mut PgConnection,
    kind: EdgeKind,
    uid: Uuid,
    sid: Uuid,
) -> Result<bool, diesel::result::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let inserted = match kind {
        EdgeKind::Like => diesel::insert_into(likes::table)
            .values((
                likes::id.eq(id),
                likes::user_id.eq(uid),
                likes::story_id.eq(sid),
                likes::created_at.eq(now),
            ))
            .on_conflict((likes::user_id, likes::story_id))
            .do_nothing()
            .execute(conn)?,
        EdgeKind::Favorite => diesel::insert_into(favorites::table)
            .values((
                favorites::id.eq(id),
                favorites::user_id.eq(uid),
                favorites::story_id.eq(sid),
                favorites::created_at.eq(now),
            ))
            .on_conflict((favorites::user_id, favorites::story_id))
            .do_nothing()
            .execute(conn)?,
        EdgeKind::Follower => diesel::insert_into(story_followers::table)
            .values((
                story_followers::id.eq(id),
                story_followers::user_id.eq(uid),
                story_followers::story_id.eq(sid),
                story_followers::created_at.eq(now),
            ))
            .on_conflict((story_followers::user_id, story_followers::story_id))
            .do_nothing()
            .execute(conn)?,
    };
    Ok(inserted == 1)
}

/// Deletes the edge. Returns whether it existed.
pub fn remove_edge(
    conn: &mut PgConnection,
    kind: EdgeKind,
    uid: Uuid,
    sid: Uuid,
) -> Result<bool, diesel::result::Error> {
    let deleted = match kind {
        EdgeKind::Like => diesel::delete(
            likes::table
                .filter(likes::user_id.eq(uid))
                .filter(likes::story_id.eq(sid)),
        )
        .execute(conn)?,
        EdgeKind::Favorite => diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(uid))
                .filter(favorites::story_id.eq(sid)),
        )
        .execute(conn)?,
        EdgeKind::Follower => diesel::delete(
            story_followers::table
                .filter(story_followers::user_id.eq(uid))
                .filter(story_followers::story_id.eq(sid)),
        )
        .execute(conn)?,
    };
    Ok(deleted > 0)
}

pub fn story_ids_for_user(
    conn: &mut PgConnection,
    kind: EdgeKind,
    uid: Uuid,
) -> Result<Vec<Uuid>, diesel::result::Error> {
    match kind {
        EdgeKind::Like => likes::table
            .filter(likes::user_id.eq(uid))
            .select(likes::story_id)
            .load(conn),
        EdgeKind::Favorite => favorites::table
            .filter(favorites::user_id.eq(uid))
            .select(favorites::story_id)
            .load(conn),
        EdgeKind::Follower => story_followers::table
            .filter(story_followers::user_id.eq(uid))
            .select(story_followers::story_id)
            .load(conn),
    }
}

async fn add_edge_handler(
    state: Arc<AppState>,
    user: DbUser,
    story_id: Uuid,
    kind: EdgeKind,
) -> Result<impl IntoResponse, ApiError> {
    let pool = state.conn.clone();
    let created = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        Ok::<_, ApiError>(insert_edge(&mut conn, kind, user.id, story.id)?)
    })
    .await??;

    let (status, message) = if created {
        (StatusCode::CREATED, format!("story {}", kind.noun()))
    } else {
        (StatusCode::OK, format!("story already {}", kind.noun()))
    };
    Ok((status, Json(serde_json::json!({ "status": message }))))
}

async fn remove_edge_handler(
    state: Arc<AppState>,
    user: DbUser,
    story_id: Uuid,
    kind: EdgeKind,
) -> Result<StatusCode, ApiError> {
    let pool = state.conn.clone();
    let existed = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        Ok::<_, ApiError>(remove_edge(&mut conn, kind, user.id, story.id)?)
    })
    .await??;

    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Conflict(format!(
            "story not {}",
            kind.noun()
        )))
    }
}

pub async fn like(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    add_edge_handler(state, user, story_id, EdgeKind::Like).await
}

pub async fn unlike(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_edge_handler(state, user, story_id, EdgeKind::Like).await
}

pub async fn favorite(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    add_edge_handler(state, user, story_id, EdgeKind::Favorite).await
}

pub async fn unfavorite(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_edge_handler(state, user, story_id, EdgeKind::Favorite).await
}

pub async fn follow(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    add_edge_handler(state, user, story_id, EdgeKind::Follower).await
}

pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_edge_handler(state, user, story_id, EdgeKind::Follower).await
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stories/{id}/like", post(like))
        .route("/api/stories/{id}/unlike", post(unlike))
        .route("/api/stories/{id}/favorite", post(favorite))
        .route("/api/stories/{id}/unfavorite", post(unfavorite))
        .route("/api/stories/{id}/follow", post(follow))
        .route("/api/stories/{id}/unfollow", post(unfollow))
}
