use super::*;
use chrono::Utc;
use uuid::Uuid;

fn user(role: &str) -> DbUser {
    DbUser {
        id: Uuid::new_v4(),
        username: format!("u-{}", Uuid::new_v4()),
        email: format!("{}@example.com", Uuid::new_v4()),
        password_hash: String::new(),
        role: role.to_string(),
        bio: None,
        organization_id: None,
        is_superuser: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn story(author: &DbUser, visibility: &str, status: &str) -> DbStory {
    DbStory {
        id: Uuid::new_v4(),
        title: "t".to_string(),
        description: "d".to_string(),
        author_id: author.id,
        status: status.to_string(),
        visibility: visibility.to_string(),
        quarantine_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn capability_table_per_role() {
    let admin = user("admin");
    let caps = capabilities(&admin);
    assert!(caps.can_moderate && caps.can_manage_org && caps.can_view_all_users);

    let plain = user("user");
    let caps = capabilities(&plain);
    assert!(!caps.can_moderate && !caps.can_manage_org && !caps.can_view_all_users);

    let mut subadmin = user("subadmin");
    assert!(!capabilities(&subadmin).can_manage_org);
    subadmin.organization_id = Some(Uuid::new_v4());
    let caps = capabilities(&subadmin);
    assert!(caps.can_manage_org);
    assert!(!caps.can_moderate);
}

#[test]
fn superuser_moderates_regardless_of_role() {
    let mut su = user("user");
    su.is_superuser = true;
    assert!(can_moderate(&su));
}

#[test]
fn anonymous_sees_only_public_active() {
    let author = user("user");
    assert!(can_view_story(
        None,
        &story(&author, "public", "active"),
        false,
        false
    ));
    assert!(!can_view_story(
        None,
        &story(&author, "private", "active"),
        false,
        false
    ));
    assert!(!can_view_story(
        None,
        &story(&author, "public", "quarantined"),
        false,
        false
    ));
}

#[test]
fn author_sees_own_story_in_any_state() {
    let author = user("user");
    for status in ["active", "quarantined", "approved", "rejected"] {
        let s = story(&author, "private", status);
        assert!(can_view_story(Some(&author), &s, false, false));
    }
}

#[test]
fn private_story_needs_a_follow_edge() {
    let author = user("user");
    let viewer = user("user");
    let s = story(&author, "private", "active");
    assert!(!can_view_story(Some(&viewer), &s, false, false));
    assert!(can_view_story(Some(&viewer), &s, true, false));
    assert!(can_view_story(Some(&viewer), &s, false, true));
}

#[test]
fn admin_sees_everything() {
    let author = user("user");
    let admin = user("admin");
    let s = story(&author, "private", "rejected");
    assert!(can_view_story(Some(&admin), &s, false, false));
}

#[test]
fn edit_rights_belong_to_the_author() {
    let author = user("user");
    let other = user("user");
    let admin = user("admin");
    let s = story(&author, "public", "active");
    assert!(can_edit_story(&author, &s));
    assert!(!can_edit_story(&other, &s));
    assert!(!can_edit_story(&admin, &s));
    assert!(can_delete_story(&admin, &s));
    assert!(!can_delete_story(&other, &s));
}
