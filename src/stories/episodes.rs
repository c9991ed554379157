//! Episodes: the ordered children of a story. An episode is never created
//! without content; the first version rides in the same transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::{DbEpisode, DbVersion};
use crate::shared::schema::{episodes, versions};
use crate::shared::state::AppState;
use crate::stories::navigate::{navigate, Navigation};
use crate::stories::{ensure_viewable, load_story};

#[derive(Debug, Deserialize)]
pub struct CreateEpisodeRequest {
    pub title: String,
    pub number: i32,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEpisodeRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct EpisodeResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub number: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub versions: Vec<DbVersion>,
    #[serde(flatten)]
    pub navigation: Navigation,
}

pub(crate) fn list_for_story(
    conn: &mut PgConnection,
    story_id: Uuid,
) -> Result<Vec<DbEpisode>, diesel::result::Error> {
    episodes::table
        .filter(episodes::story_id.eq(story_id))
        .order(episodes::number.asc())
        .load(conn)
}

pub(crate) fn load_episode(
    conn: &mut PgConnection,
    story_id: Uuid,
    episode_id: Uuid,
) -> Result<DbEpisode, ApiError> {
    episodes::table
        .filter(episodes::id.eq(episode_id))
        .filter(episodes::story_id.eq(story_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("episode not found".to_string()))
}

pub(crate) fn episode_response(
    conn: &mut PgConnection,
    episode: DbEpisode,
) -> Result<EpisodeResponse, ApiError> {
    let version_rows: Vec<DbVersion> = versions::table
        .filter(versions::episode_id.eq(episode.id))
        .order(versions::version_number.asc())
        .load(conn)?;
    let siblings: Vec<(i32, Uuid)> = episodes::table
        .filter(episodes::story_id.eq(episode.story_id))
        .select((episodes::number, episodes::id))
        .load(conn)?;
    let navigation = navigate(&siblings, episode.number);

    Ok(EpisodeResponse {
        id: episode.id,
        story_id: episode.story_id,
        number: episode.number,
        title: episode.title,
        created_at: episode.created_at,
        updated_at: episode.updated_at,
        versions: version_rows,
        navigation,
    })
}

/// Inserts an episode and its first version in one transaction. A
/// duplicate number surfaces as Conflict and leaves no orphan version
/// behind.
pub fn create_with_first_version(
    conn: &mut PgConnection,
    story_id: Uuid,
    number: i32,
    title: &str,
    content: String,
) -> Result<DbEpisode, ApiError> {
    let now = Utc::now();
    let episode = DbEpisode {
        id: Uuid::new_v4(),
        story_id,
        number,
        title: title.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    let first_version = DbVersion {
        id: Uuid::new_v4(),
        episode_id: episode.id,
        version_number: 1,
        content,
        created_at: now,
    };

    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::insert_into(episodes::table)
            .values(&episode)
            .execute(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => ApiError::Conflict(format!(
                    "episode number {} already exists for this story",
                    episode.number
                )),
                other => other.into(),
            })?;
        diesel::insert_into(versions::table)
            .values(&first_version)
            .execute(conn)?;
        Ok(())
    })?;

    Ok(episode)
}

/// `POST /api/stories/{story_id}/episodes` — only while the story is
/// active, and only by its author. Creates the episode and its first
/// version atomically.
pub async fn create_episode(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
    Json(req): Json<CreateEpisodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if req.content.is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if !access::can_edit_story(&user, &story) {
            return Err(ApiError::Forbidden(
                "only the author may add episodes".to_string(),
            ));
        }
        if !story.is_active() {
            return Err(ApiError::InvalidState(
                "cannot add episodes to an inactive or quarantined story".to_string(),
            ));
        }

        let episode =
            create_with_first_version(&mut conn, story.id, req.number, &req.title, req.content)?;

        info!("episode {} created on story {}", episode.number, story.id);
        episode_response(&mut conn, episode)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/stories/{story_id}/episodes` — ordered by number.
pub async fn list_episodes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<Vec<EpisodeResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        list_for_story(&mut conn, story.id)?
            .into_iter()
            .map(|e| episode_response(&mut conn, e))
            .collect::<Result<Vec<_>, _>>()
    })
    .await??;

    Ok(Json(rows))
}

pub async fn get_episode(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<EpisodeResponse>, ApiError> {
    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        episode_response(&mut conn, episode)
    })
    .await??;

    Ok(Json(response))
}

/// `PUT .../episodes/{id}` — title only; the number is immutable.
pub async fn update_episode(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateEpisodeRequest>,
) -> Result<Json<EpisodeResponse>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if !access::can_edit_story(&user, &story) {
            return Err(ApiError::Forbidden(
                "only the author may edit episodes".to_string(),
            ));
        }
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        let updated: DbEpisode =
            diesel::update(episodes::table.filter(episodes::id.eq(episode.id)))
                .set((
                    episodes::title.eq(req.title.trim()),
                    episodes::updated_at.eq(Utc::now()),
                ))
                .get_result(&mut conn)?;
        episode_response(&mut conn, updated)
    })
    .await??;

    Ok(Json(response))
}

pub async fn delete_episode(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((story_id, episode_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if !access::can_edit_story(&user, &story) {
            return Err(ApiError::Forbidden(
                "only the author may delete episodes".to_string(),
            ));
        }
        let episode = load_episode(&mut conn, story.id, episode_id)?;
        diesel::delete(episodes::table.filter(episodes::id.eq(episode.id)))
            .execute(&mut conn)?;
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/stories/{story_id}/episodes",
            get(list_episodes).post(create_episode),
        )
        .route(
            "/api/stories/{story_id}/episodes/{episode_id}",
            get(get_episode).put(update_episode).delete(delete_episode),
        )
}
