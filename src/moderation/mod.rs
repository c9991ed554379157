//! Report accumulation and the story moderation state machine:
//! active → quarantined → {approved, rejected}.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::{DbQuarantineReport, DbStory, DbUser, StoryStatus};
use crate::shared::schema::{quarantine_reports, stories};
use crate::shared::state::AppState;
use crate::stories::{ensure_viewable, load_story, story_response, ListQuery, StoryResponse};

/// Reports at which a story is automatically quarantined.
pub const QUARANTINE_THRESHOLD: i32 = 3;

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reason: String,
}

/// Whether a story moves to quarantine given its post-increment report
/// count. Rejection is terminal; everything else (including a previously
/// approved story collecting fresh reports) re-enters quarantine at the
/// threshold.
pub fn quarantine_transition(current: StoryStatus, new_count: i32) -> Option<StoryStatus> {
    if new_count < QUARANTINE_THRESHOLD {
        return None;
    }
    match current {
        StoryStatus::Rejected | StoryStatus::Quarantined => None,
        StoryStatus::Active | StoryStatus::Approved => Some(StoryStatus::Quarantined),
    }
}

/// Appends a report and bumps the counter in one transaction. The
/// increment is a single SQL update, so concurrent reports cannot lose
/// ticks and the threshold fires on exactly the Nth one. Returns the story
/// as it stands after the report.
pub fn record_report(
    conn: &mut PgConnection,
    story_id: Uuid,
    reporter: Uuid,
    reason: &str,
) -> Result<DbStory, ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| {
        let report = DbQuarantineReport {
            id: Uuid::new_v4(),
            story_id,
            reported_by: reporter,
            reason: reason.trim().to_string(),
            created_at: Utc::now(),
        };
        diesel::insert_into(quarantine_reports::table)
            .values(&report)
            .execute(conn)?;

        let updated: DbStory = diesel::update(stories::table.filter(stories::id.eq(story_id)))
            .set((
                stories::quarantine_count.eq(stories::quarantine_count + 1),
                stories::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        if let Some(next) = quarantine_transition(updated.status(), updated.quarantine_count) {
            let quarantined: DbStory =
                diesel::update(stories::table.filter(stories::id.eq(story_id)))
                    .set(stories::status.eq(next.as_str()))
                    .get_result(conn)?;
            warn!(
                "story {} quarantined after {} reports",
                story_id, updated.quarantine_count
            );
            return Ok(quarantined);
        }
        Ok(updated)
    })
}

/// `POST /api/stories/{id}/report`. The report is appended unconditionally:
/// a user may report the same story repeatedly.
pub async fn report_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
    Json(req): Json<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::Validation("reason is required".to_string()));
    }

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        ensure_viewable(&mut conn, Some(&user), &story)?;
        record_report(&mut conn, story.id, user.id, &req.reason)?;
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "story reported" })),
    ))
}

fn require_moderator(user: &DbUser) -> Result<(), ApiError> {
    if access::can_moderate(user) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "moderator privileges required".to_string(),
        ))
    }
}

fn load_quarantined(conn: &mut PgConnection, story_id: Uuid) -> Result<DbStory, ApiError> {
    stories::table
        .filter(stories::id.eq(story_id))
        .filter(stories::status.eq(StoryStatus::Quarantined.as_str()))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("quarantined story not found".to_string()))
}

/// Clears a quarantined story and resets its counter, so a fresh run of
/// reports is needed to quarantine it again. NotFound unless the story is
/// currently quarantined.
pub fn approve(conn: &mut PgConnection, story_id: Uuid) -> Result<DbStory, ApiError> {
    let story = load_quarantined(conn, story_id)?;
    let updated: DbStory = diesel::update(stories::table.filter(stories::id.eq(story.id)))
        .set((
            stories::status.eq(StoryStatus::Approved.as_str()),
            stories::quarantine_count.eq(0),
            stories::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;
    Ok(updated)
}

/// Rejects a quarantined story. Terminal; the counter is left as evidence.
pub fn reject(conn: &mut PgConnection, story_id: Uuid) -> Result<DbStory, ApiError> {
    let story = load_quarantined(conn, story_id)?;
    let updated: DbStory = diesel::update(stories::table.filter(stories::id.eq(story.id)))
        .set((
            stories::status.eq(StoryStatus::Rejected.as_str()),
            stories::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;
    Ok(updated)
}

/// `GET /api/admin/quarantined-stories`
pub async fn list_quarantined(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    require_moderator(&user)?;

    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let rows: Vec<DbStory> = stories::table
            .filter(stories::status.eq(StoryStatus::Quarantined.as_str()))
            .order(stories::updated_at.desc())
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)?;
        rows.into_iter()
            .map(|s| story_response(&mut conn, s, Some(user.id)))
            .collect::<Result<Vec<_>, _>>()
    })
    .await??;

    Ok(Json(rows))
}

/// `POST /api/admin/quarantined-stories/{id}/approve` — clears the story
/// and resets its report counter.
pub async fn approve_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_moderator(&user)?;

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = approve(&mut conn, story_id)?;
        info!("story {} approved by {}", story.id, user.username);
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({ "status": "story approved" })))
}

/// `POST /api/admin/quarantined-stories/{id}/reject` — terminal; the
/// counter is left as evidence.
pub async fn reject_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_moderator(&user)?;

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = reject(&mut conn, story_id)?;
        info!("story {} rejected by {}", story.id, user.username);
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(Json(serde_json::json!({ "status": "story rejected" })))
}

/// `GET /api/admin/quarantined-stories/{id}/reports` — newest first.
pub async fn story_reports(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(story_id): Path<Uuid>,
) -> Result<Json<Vec<DbQuarantineReport>>, ApiError> {
    require_moderator(&user)?;

    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let story = load_story(&mut conn, story_id)?;
        let rows: Vec<DbQuarantineReport> = quarantine_reports::table
            .filter(quarantine_reports::story_id.eq(story.id))
            .order(quarantine_reports::created_at.desc())
            .load(&mut conn)?;
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(rows))
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stories/{id}/report", post(report_story))
        .route("/api/admin/quarantined-stories", get(list_quarantined))
        .route(
            "/api/admin/quarantined-stories/{id}/approve",
            post(approve_story),
        )
        .route(
            "/api/admin/quarantined-stories/{id}/reject",
            post(reject_story),
        )
        .route(
            "/api/admin/quarantined-stories/{id}/reports",
            get(story_reports),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_stays_put() {
        assert_eq!(quarantine_transition(StoryStatus::Active, 1), None);
        assert_eq!(quarantine_transition(StoryStatus::Active, 2), None);
    }

    #[test]
    fn third_report_quarantines() {
        assert_eq!(
            quarantine_transition(StoryStatus::Active, 3),
            Some(StoryStatus::Quarantined)
        );
        assert_eq!(
            quarantine_transition(StoryStatus::Active, 7),
            Some(StoryStatus::Quarantined)
        );
    }

    #[test]
    fn approved_story_can_reenter_quarantine() {
        assert_eq!(
            quarantine_transition(StoryStatus::Approved, 3),
            Some(StoryStatus::Quarantined)
        );
    }

    #[test]
    fn rejected_is_terminal() {
        assert_eq!(quarantine_transition(StoryStatus::Rejected, 100), None);
    }

    #[test]
    fn quarantined_stays_quarantined() {
        assert_eq!(quarantine_transition(StoryStatus::Quarantined, 4), None);
    }
}
