//! Admin panel: user role management and organization administration.
//! Admins operate globally; subadmins only inside their own organization.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::auth::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::{DbOrganization, DbUser, Role, UserResponse};
use crate::shared::schema::{organizations, users};
use crate::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrganizationAssignmentRequest {
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub description: Option<String>,
    pub admin_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn require_admin(user: &DbUser) -> Result<(), ApiError> {
    if user.is_superuser || user.role() == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin privileges required".to_string()))
    }
}

fn load_user(conn: &mut PgConnection, user_id: Uuid) -> Result<DbUser, ApiError> {
    users::table
        .filter(users::id.eq(user_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))
}

fn load_organization(conn: &mut PgConnection, org_id: Uuid) -> Result<DbOrganization, ApiError> {
    organizations::table
        .filter(organizations::id.eq(org_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("organization not found".to_string()))
}

/// `GET /api/admin/users` — admins see everyone, subadmins their own
/// organization's members.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let caps = access::capabilities(&user);
    if !caps.can_view_all_users && !caps.can_manage_org {
        return Err(ApiError::Forbidden(
            "admin or subadmin privileges required".to_string(),
        ));
    }

    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let rows: Vec<DbUser> = if caps.can_view_all_users {
            users::table.order(users::username.asc()).load(&mut conn)?
        } else {
            match user.organization_id {
                Some(org_id) => users::table
                    .filter(users::organization_id.eq(org_id))
                    .order(users::username.asc())
                    .load(&mut conn)?,
                None => Vec::new(),
            }
        };
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

/// `POST /api/admin/users/{id}/make-subadmin` — promotes a user and binds
/// them to the organization they will administer.
pub async fn make_subadmin(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<OrganizationAssignmentRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&caller)?;
    let org_id = req
        .organization_id
        .ok_or_else(|| ApiError::Validation("organization_id is required".to_string()))?;

    let pool = state.conn.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let target = load_user(&mut conn, user_id)?;
        let org = load_organization(&mut conn, org_id)?;
        let updated: DbUser = diesel::update(users::table.filter(users::id.eq(target.id)))
            .set((
                users::role.eq(Role::Subadmin.as_str()),
                users::organization_id.eq(org.id),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?;
        info!(
            "user {} promoted to subadmin of {} by {}",
            updated.username, org.name, caller.username
        );
        Ok::<_, ApiError>(updated)
    })
    .await??;

    Ok(Json(updated.into()))
}

/// `POST /api/admin/users/{id}/assign-organization`
pub async fn assign_organization(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<OrganizationAssignmentRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&caller)?;
    let org_id = req
        .organization_id
        .ok_or_else(|| ApiError::Validation("organization_id is required".to_string()))?;

    let pool = state.conn.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let target = load_user(&mut conn, user_id)?;
        let org = load_organization(&mut conn, org_id)?;
        let updated: DbUser = diesel::update(users::table.filter(users::id.eq(target.id)))
            .set((
                users::organization_id.eq(org.id),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?;
        Ok::<_, ApiError>(updated)
    })
    .await??;

    Ok(Json(updated.into()))
}

/// `POST /api/admin/users/{id}/add-to-organization` — the subadmin path:
/// pulls a user into the caller's own organization.
pub async fn add_to_organization(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let org_id = match (caller.role(), caller.organization_id) {
        (Role::Subadmin, Some(org_id)) => org_id,
        _ => {
            return Err(ApiError::Forbidden(
                "you do not have permission to add users to an organization".to_string(),
            ))
        }
    };

    let pool = state.conn.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let target = load_user(&mut conn, user_id)?;
        let updated: DbUser = diesel::update(users::table.filter(users::id.eq(target.id)))
            .set((
                users::organization_id.eq(org_id),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)?;
        Ok::<_, ApiError>(updated)
    })
    .await??;

    Ok(Json(updated.into()))
}

/// `GET /api/admin/organizations`
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<DbOrganization>>, ApiError> {
    require_admin(&caller)?;

    let pool = state.conn.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let rows: Vec<DbOrganization> = organizations::table
            .order(organizations::name.asc())
            .load(&mut conn)?;
        Ok::<_, ApiError>(rows)
    })
    .await??;

    Ok(Json(rows))
}

/// `POST /api/admin/organizations` — the owning admin defaults to the
/// caller.
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let pool = state.conn.clone();
    let row = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let admin_id = match req.admin_id {
            Some(id) => load_user(&mut conn, id)?.id,
            None => caller.id,
        };
        let row = DbOrganization {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            description: req.description,
            admin_id,
            created_at: Utc::now(),
        };
        diesel::insert_into(organizations::table)
            .values(&row)
            .execute(&mut conn)?;
        Ok::<_, ApiError>(row)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_organization(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(org_id): Path<Uuid>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<DbOrganization>, ApiError> {
    require_admin(&caller)?;

    let pool = state.conn.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let org = load_organization(&mut conn, org_id)?;
        let updated: DbOrganization =
            diesel::update(organizations::table.filter(organizations::id.eq(org.id)))
                .set((
                    organizations::name.eq(req.name.unwrap_or(org.name)),
                    organizations::description.eq(req.description.or(org.description)),
                ))
                .get_result(&mut conn)?;
        Ok::<_, ApiError>(updated)
    })
    .await??;

    Ok(Json(updated))
}

pub async fn delete_organization(
    State(state): State<Arc<AppState>>,
    AuthUser(caller): AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&caller)?;

    let pool = state.conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let org = load_organization(&mut conn, org_id)?;
        diesel::delete(organizations::table.filter(organizations::id.eq(org.id)))
            .execute(&mut conn)?;
        Ok::<_, ApiError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}/make-subadmin", post(make_subadmin))
        .route(
            "/api/admin/users/{id}/assign-organization",
            post(assign_organization),
        )
        .route(
            "/api/admin/users/{id}/add-to-organization",
            post(add_to_organization),
        )
        .route(
            "/api/admin/organizations",
            get(list_organizations).post(create_organization),
        )
        .route(
            "/api/admin/organizations/{id}",
            put(update_organization).delete(delete_organization),
        )
}
