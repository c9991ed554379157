//! Story resources: CRUD, public browsing, feed and per-user listings.

pub mod engagement;
pub mod episodes;
pub mod navigate;
pub mod versions;

use axum::extract::{Path, Query, State};
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
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::shared::error::ApiError;
use crate::shared::models::{
    DbStory, DbUser, StoryStatus, UserSummary, Visibility,
};
use crate::shared::schema::{
    episodes as episodes_t, favorites, follows, likes, stories, story_followers, users,
};
use crate::shared::state::AppState;

use episodes::EpisodeResponse;

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    pub title: String,
    pub description: String,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub(crate) fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub(crate) fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author: UserSummary,
    pub status: StoryStatus,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub episodes_count: i64,
    pub likes_count: i64,
    pub is_liked: bool,
    pub is_favorited: bool,
}

#[derive(Debug, Serialize)]
pub struct StoryDetailResponse {
    #[serde(flatten)]
    pub story: StoryResponse,
    pub episodes: Vec<EpisodeResponse>,
}

pub(crate) fn load_story(conn: &mut PgConnection, id: Uuid) -> Result<DbStory, ApiError> {
    stories::table
        .filter(stories::id.eq(id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("story not found".to_string()))
}

/// The viewer's edges toward this story: (follows the author, follows the
/// story).
pub(crate) fn follow_edges(
    conn: &mut PgConnection,
    viewer_id: Uuid,
    story: &DbStory,
) -> Result<(bool, bool), diesel::result::Error> {
    let follows_author: i64 = follows::table
        .filter(follows::follower_id.eq(viewer_id))
        .filter(follows::followed_id.eq(story.author_id))
        .count()
        .get_result(conn)?;
    let follows_story: i64 = story_followers::table
        .filter(story_followers::user_id.eq(viewer_id))
        .filter(story_followers::story_id.eq(story.id))
        .count()
        .get_result(conn)?;
    Ok((follows_author > 0, follows_story > 0))
}

/// Applies the access policy; invisible stories surface as not-found so
/// their existence is not leaked.
pub(crate) fn ensure_viewable(
    conn: &mut PgConnection,
    viewer: Option<&DbUser>,
    story: &DbStory,
) -> Result<(), ApiError> {
    let (follows_author, follows_story) = match viewer {
        Some(u) if u.id != story.author_id => follow_edges(conn, u.id, story)?,
        _ => (false, false),
    };
    if access::can_view_story(viewer, story, follows_author, follows_story) {
        Ok(())
    } else {
        Err(ApiError::NotFound("story not found".to_string()))
    }
}

pub(crate) fn story_response(
    conn: &mut PgConnection,
    story: DbStory,
    viewer: Option<Uuid>,
) -> Result<StoryResponse, ApiError> {
    let author: DbUser = users::table
        .filter(users::id.eq(story.author_id))
        .first(conn)?;
    let episodes_count: i64 = episodes_t::table
        .filter(episodes_t::story_id.eq(story.id))
        .count()
        .get_result(conn)?;
    let likes_count: i64 = likes::table
        .filter(likes::story_id.eq(story.id))
        .count()
        .get_result(conn)?;
    let (is_liked, is_favorited) = match viewer {
        Some(uid) => {
            let liked: i64 = likes::table
                .filter(likes::story_id.eq(story.id))
                .filter(likes::user_id.eq(uid))
                .count()
                .get_result(conn)?;
            let favorited: i64 = favorites::table
                .filter(favorites::story_id.eq(story.id))
                .filter(favorites::user_id.eq(uid))
                .count()
                .get_result(conn)?;
            (liked > 0, favorited > 0)
        }
        None => (false, false),
    };

    let status = story.status();
    let visibility = story.visibility();
    Ok(StoryResponse {
        id: story.id,
        title: story.title,
        description: story.description,
        author: UserSummary::from(&author),
        status,
        visibility,
        created_at: story.created_at,
        updated_at: story.updated_at,
        episodes_count,
        likes_count,
        is_liked,
        is_favorited,
    })
}

fn story_responses(
    conn: &mut PgConnection,
    rows: Vec<DbStory>,
    viewer: Option<Uuid>,
) -> Result<Vec<StoryResponse>, ApiError> {
    rows.into_iter()
        .map(|s| story_response(conn, s, viewer))
        .collect()
}

pub async fn create_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".to_string()));
    }

    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let now = Utc::now();
        let story = DbStory {
            id: Uuid::new_v4(),
            title: req.title.trim().to_string(),
            description: req.description,
            author_id: user.id,
            status: StoryStatus::Active.as_str().to_string(),
            visibility: req
                .visibility
                .unwrap_or(Visibility::Public)
                .as_str()
                .to_string(),
            quarantine_count: 0,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(stories::table)
            .values(&story)
            .execute(&mut conn)?;
        info!("story created: {} by {}", story.id, user.username);
        story_response(&mut conn, story, Some(user.id))
    })
    .await??;

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/public-stories` — unauthenticated browsing: public and active
/// only, newest first.
pub async fn list_public_stories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let rows: Vec<DbStory> = stories::table
            .filter(stories::visibility.eq(Visibility::Public.as_str()))
            .filter(stories::status.eq(StoryStatus::Active.as_str()))
            .order(stories::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        story_responses(&mut conn, rows, None)
    })
    .await??;

    Ok(Json(rows))
}

pub async fn get_public_story(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryDetailResponse>, ApiError> {
    let pool = state.conn.clone();
    let viewer_id = viewer.map(|u| u.id);
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        if story.visibility() != Visibility::Public || !story.is_active() {
            return Err(ApiError::NotFound("story not found".to_string()));
        }
        story_detail(&mut conn, story, viewer_id)
    })
    .await??;

    Ok(Json(response))
}

fn story_detail(
    conn: &mut PgConnection,
    story: DbStory,
    viewer: Option<Uuid>,
) -> Result<StoryDetailResponse, ApiError> {
    let episode_rows = episodes::list_for_story(conn, story.id)?;
    let episodes = episode_rows
        .into_iter()
        .map(|e| episodes::episode_response(conn, e))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StoryDetailResponse {
        story: story_response(conn, story, viewer)?,
        episodes,
    })
}

/// `GET /api/stories` — stories visible to the caller: public, their own,
/// or ones they follow.
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let followed_story_ids: Vec<Uuid> = story_followers::table
            .filter(story_followers::user_id.eq(user.id))
            .select(story_followers::story_id)
            .load(&mut conn)?;
        let rows: Vec<DbStory> = stories::table
            .filter(
                stories::visibility
                    .eq(Visibility::Public.as_str())
                    .or(stories::author_id.eq(user.id))
                    .or(stories::id.eq_any(followed_story_ids)),
            )
            .order(stories::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        story_responses(&mut conn, rows, Some(user.id))
    })
    .await??;

    Ok(Json(rows))
}

pub async fn get_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryDetailResponse>, ApiError> {
    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        story_detail(&mut conn, story, Some(user.id))
    })
    .await??;

    Ok(Json(response))
}

pub async fn update_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
    Json(req): Json<UpdateStoryRequest>,
) -> Result<Json<StoryResponse>, ApiError> {
    let pool = state.conn.clone();
    let response = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if !access::can_edit_story(&user, &story) {
            return Err(ApiError::Forbidden(
                "only the author may edit this story".to_string(),
            ));
        }

        let updated: DbStory = diesel::update(stories::table.filter(stories::id.eq(story.id)))
            .set((
                stories::title.eq(req.title.unwrap_or(story.title)),
                stories::description.eq(req.description.unwrap_or(story.description)),
                stories::visibility.eq(req
                    .visibility
                    .map(|v| v.as_str().to_string())
                    .unwrap_or(story.visibility)),
                stories::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?;
        story_response(&mut conn, updated, Some(user.id))
    })
    .await??;

    Ok(Json(response))
}

pub async fn delete_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        if !access::can_delete_story(&user, &story) {
            return Err(ApiError::Forbidden(
                "only the author or an admin may delete this story".to_string(),
            ));
        }
        diesel::delete(stories::table.filter(stories::id.eq(story.id))).execute(&mut conn)?;
        info!("story deleted: {} by {}", story.id, user.username);
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/stories/feed` — active stories by followed authors plus the
/// caller's own.
pub async fn feed(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let mut author_ids: Vec<Uuid> = follows::table
            .filter(follows::follower_id.eq(user.id))
            .select(follows::followed_id)
            .load(&mut conn)?;
        author_ids.push(user.id);
        let rows: Vec<DbStory> = stories::table
            .filter(stories::author_id.eq_any(author_ids))
            .filter(stories::status.eq(StoryStatus::Active.as_str()))
            .order(stories::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        story_responses(&mut conn, rows, Some(user.id))
    })
    .await??;

    Ok(Json(rows))
}

pub async fn my_stories(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let rows: Vec<DbStory> = stories::table
            .filter(stories::author_id.eq(user.id))
            .order(stories::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        story_responses(&mut conn, rows, Some(user.id))
    })
    .await??;

    Ok(Json(rows))
}

/// `GET /api/stories/favorites` and `GET /api/stories/followed` share this
/// shape: resolve the edge table, then load the stories.
async fn stories_from_edges(
    state: Arc<AppState>,
    user: DbUser,
    query: ListQuery,
    kind: engagement::EdgeKind,
) -> Result<Vec<StoryResponse>, ApiError> {
    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let ids = engagement::story_ids_for_user(&mut conn, kind, user.id)?;
        let rows: Vec<DbStory> = stories::table
            .filter(stories::id.eq_any(ids))
            .order(stories::created_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        story_responses(&mut conn, rows, Some(user.id))
    })
    .await?
}

pub async fn favorite_stories(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let rows = stories_from_edges(state, user, query, engagement::EdgeKind::Favorite).await?;
    Ok(Json(rows))
}

pub async fn followed_stories(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let rows = stories_from_edges(state, user, query, engagement::EdgeKind::Follower).await?;
    Ok(Json(rows))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stories", get(list_stories).post(create_story))
        .route("/api/stories/feed", get(feed))
        .route("/api/stories/mine", get(my_stories))
        .route("/api/stories/favorites", get(favorite_stories))
        .route("/api/stories/followed", get(followed_stories))
        .route(
            "/api/stories/{id}",
            get(get_story).put(update_story).delete(delete_story),
        )
        .route("/api/public-stories", get(list_public_stories))
        .route("/api/public-stories/{id}", get(get_public_story))
}
