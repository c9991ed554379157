//! Role capability table and per-request visibility rules.
//!
//! Everything here is a pure function over already-loaded rows; handlers
//! fetch the follow edges they need and pass them in as booleans.

use crate::shared::models::{DbStory, DbUser, Role, StoryStatus, Visibility};

/// What a role is allowed to do. Kept as an explicit table so call sites
/// never compare role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_moderate: bool,
    pub can_manage_org: bool,
    pub can_view_all_users: bool,
}

pub fn capabilities(user: &DbUser) -> Capabilities {
    if user.is_superuser {
        return Capabilities {
            can_moderate: true,
            can_manage_org: true,
            can_view_all_users: true,
        };
    }
    match user.role() {
        Role::Admin => Capabilities {
            can_moderate: true,
            can_manage_org: true,
            can_view_all_users: true,
        },
        // Subadmins manage users only inside their assigned organization,
        // and only once they have one.
        Role::Subadmin => Capabilities {
            can_moderate: false,
            can_manage_org: user.organization_id.is_some(),
            can_view_all_users: false,
        },
        Role::User => Capabilities {
            can_moderate: false,
            can_manage_org: false,
            can_view_all_users: false,
        },
    }
}

pub fn can_moderate(user: &DbUser) -> bool {
    capabilities(user).can_moderate
}

/// Story read access for a possibly-anonymous viewer.
///
/// `follows_author` / `follows_story` are the viewer's edges toward this
/// story, resolved by the caller.
pub fn can_view_story(
    viewer: Option<&DbUser>,
    story: &DbStory,
    follows_author: bool,
    follows_story: bool,
) -> bool {
    match viewer {
        None => story.visibility() == Visibility::Public && story.status() == StoryStatus::Active,
        Some(user) => {
            if user.id == story.author_id || can_moderate(user) {
                return true;
            }
            story.visibility() == Visibility::Public || follows_author || follows_story
        }
    }
}

/// Write access to a story and, transitively, to its episodes and versions:
/// whoever owns the nearest ancestor story.
pub fn can_edit_story(user: &DbUser, story: &DbStory) -> bool {
    user.id == story.author_id
}

pub fn can_delete_story(user: &DbUser, story: &DbStory) -> bool {
    user.id == story.author_id || can_moderate(user)
}

#[cfg(test)]
mod tests;
