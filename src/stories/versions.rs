//! Versions: the immutable revisions of an episode.
//!
//! version_number is assigned by the server, never the caller. The
//! assignment is a single INSERT..SELECT computing max+1 inside the
//! statement, with a bounded retry on the unique constraint, so concurrent
//! writers on one episode end up with a contiguous 1..=N with no
//! duplicates.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::DbVersion;
use crate::shared::schema::versions;
use crate::shared::state::AppState;
use crate::stories::episodes::load_episode;
use crate::stories::navigate::{navigate, Navigation};
use crate::stories::{ensure_viewable, load_story};

const VERSION_INSERT_RETRIES: usize = 8;

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub id: Uuid,
    pub episode_id: Uuid,
    pub version_number: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub navigation: Navigation,
}

fn insert_next_version(
    conn: &mut PgConnection,
    episode_id: Uuid,
    content: &str,
) -> Result<DbVersion, diesel::result::Error> {
    diesel::sql_query(
        "INSERT INTO versions (id, episode_id, version_number, content, created_at) \
         SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3, $4 \
         FROM versions WHERE episode_id = $2 \
         RETURNING id, episode_id, version_number, content, created_at",
    )
    .bind::<sql_types::Uuid, _>(Uuid::new_v4())
    .bind::<sql_types::Uuid, _>(episode_id)
    .bind::<sql_types::Text, _>(content)
    .bind::<sql_types::Timestamptz, _>(Utc::now())
    .get_result::<DbVersion>(conn)
}

/// Server-side version numbering with a bounded retry: a concurrent writer
/// that lands on the same number loses to the unique constraint and tries
/// again with a fresh max.
pub fn create_next_version(
    conn: &mut PgConnection,
    episode_id: Uuid,
    content: &str,
) -> Result<DbVersion, ApiError> {
    use diesel::result::{DatabaseErrorKind, Error};
    for _ in 0..VERSION_INSERT_RETRIES {
        match insert_next_version(conn, episode_id, content) {
            Err(Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => continue,
            other => return other.map_err(ApiError::from),
        }
    }
    Err(ApiError::Conflict(
        "could not assign a version number, try again".to_string(),
    ))
}

fn version_response(
    conn: &mut PgConnection,
    version: DbVersion,
) -> Result<VersionResponse, ApiError> {
    let siblings: Vec<(i32, Uuid)> = versions::table
        .filter(versions::episode_id.eq(version.episode_id))
        .select((versions::version_number, versions::id))
        .load(conn)?;
    let navigation = navigate(&siblings, version.version_number);

    Ok(VersionResponse {
        id: version.id,
        episode_id: version.episode_id,
        version_number: version.version_number,
        content: version.content,
        created_at: version.created_at,
        navigation,
    })
}

/// `POST /api/stories/{story_id}/episodes/{episode_id}/versions`
pub async fn create_version(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if story.author_id != user.id {
            return Err(ApiError::Forbidden(
                "only the author may add versions".to_string(),
            ));
        }
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        let version = create_next_version(&mut conn, episode.id, &req.content)?;
        version_response(&mut conn, version)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET .../versions` — ordered by version_number.
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<VersionResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        let version_rows: Vec<DbVersion> = versions::table
            .filter(versions::episode_id.eq(episode.id))
            .order(versions::version_number.asc())
            .load(&mut conn)?;
        version_rows
            .into_iter()
            .map(|v| version_response(&mut conn, v))
            .collect::<Result<Vec<_>, _>>()
    })
    .await??;

    Ok(Json(rows))
}

pub async fn get_version(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id, version_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<VersionResponse>, ApiError> {
    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        let version: DbVersion = versions::table
            .filter(versions::id.eq(version_id))
            .filter(versions::episode_id.eq(episode.id))
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("version not found".to_string()))?;
        version_response(&mut conn, version)
    })
    .await??;

    Ok(Json(response))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/stories/{story_id}/episodes/{episode_id}/versions",
            get(list_versions).post(create_version),
        )
        .route(
            "/api/stories/{story_id}/episodes/{episode_id}/versions/{version_id}",
            get(get_version),
        )
}
