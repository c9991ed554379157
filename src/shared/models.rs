use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{
    auth_tokens, episodes, favorites, follows, likes, organizations, quarantine_reports, stories,
    story_followers, users, versions,
};

/// Closed role set. The `role` column carries a CHECK constraint, so
/// `parse` falling back to `User` only ever fires on hand-edited rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Subadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Subadmin => "subadmin",
        }
    }

    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "subadmin" => Role::Subadmin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Active,
    Quarantined,
    Approved,
    Rejected,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Active => "active",
            StoryStatus::Quarantined => "quarantined",
            StoryStatus::Approved => "approved",
            StoryStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<StoryStatus> {
        match s {
            "active" => Some(StoryStatus::Active),
            "quarantined" => Some(StoryStatus::Quarantined),
            "approved" => Some(StoryStatus::Approved),
            "rejected" => Some(StoryStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Visibility> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub bio: Option<String>,
    pub organization_id: Option<Uuid>,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = organizations)]
pub struct DbOrganization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub admin_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = follows)]
pub struct DbFollow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = auth_tokens)]
pub struct DbAuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = stories)]
pub struct DbStory {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author_id: Uuid,
    pub status: String,
    pub visibility: String,
    pub quarantine_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbStory {
    pub fn status(&self) -> StoryStatus {
        StoryStatus::parse(&self.status).unwrap_or(StoryStatus::Active)
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::parse(&self.visibility).unwrap_or(Visibility::Public)
    }

    pub fn is_active(&self) -> bool {
        self.status() == StoryStatus::Active
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = episodes)]
pub struct DbEpisode {
    pub id: Uuid,
    pub story_id: Uuid,
    pub number: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, QueryableByName, Insertable, Serialize, Deserialize)]
#[diesel(table_name = versions)]
pub struct DbVersion {
    pub id: Uuid,
    pub episode_id: Uuid,
    pub version_number: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = likes)]
pub struct DbLike {
    pub id: Uuid,
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = favorites)]
pub struct DbFavorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = story_followers)]
pub struct DbStoryFollower {
    pub id: Uuid,
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = quarantine_reports)]
pub struct DbQuarantineReport {
    pub id: Uuid,
    pub story_id: Uuid,
    pub reported_by: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, safe to return to any caller.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for UserResponse {
    fn from(u: DbUser) -> Self {
        let role = u.role();
        UserResponse {
            id: u.id,
            username: u.username,
            email: u.email,
            role,
            bio: u.bio,
            organization_id: u.organization_id,
            created_at: u.created_at,
        }
    }
}

/// Compact author embed used inside story responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<&DbUser> for UserSummary {
    fn from(u: &DbUser) -> Self {
        UserSummary {
            id: u.id,
            username: u.username.clone(),
            role: u.role(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::User, Role::Admin, Role::Subadmin] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
        assert_eq!(Role::parse("something-else"), Role::User);
    }

    #[test]
    fn status_round_trip() {
        for status in [
            StoryStatus::Active,
            StoryStatus::Quarantined,
            StoryStatus::Approved,
            StoryStatus::Rejected,
        ] {
            assert_eq!(StoryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(StoryStatus::parse("banned"), None);
    }

    #[test]
    fn visibility_round_trip() {
        assert_eq!(Visibility::parse("public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("private"), Some(Visibility::Private));
        assert_eq!(Visibility::parse("unlisted"), None);
    }
}
