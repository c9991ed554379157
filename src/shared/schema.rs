diesel::table! {
    organizations (id) {
        id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        admin_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        role -> Text,
        bio -> Nullable<Text>,
        organization_id -> Nullable<Uuid>,
        is_superuser -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    follows (id) {
        id -> Uuid,
        follower_id -> Uuid,
        followed_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    auth_tokens (id) {
        id -> Uuid,
        user_id -> Uuid,
        token -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    stories (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        author_id -> Uuid,
        status -> Text,
        visibility -> Text,
        quarantine_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    episodes (id) {
        id -> Uuid,
        story_id -> Uuid,
        number -> Int4,
        title -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    versions (id) {
        id -> Uuid,
        episode_id -> Uuid,
        version_number -> Int4,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    likes (id) {
        id -> Uuid,
        user_id -> Uuid,
        story_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    favorites (id) {
        id -> Uuid,
        user_id -> Uuid,
        story_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    story_followers (id) {
        id -> Uuid,
        user_id -> Uuid,
        story_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    quarantine_reports (id) {
        id -> Uuid,
        story_id -> Uuid,
        reported_by -> Uuid,
        reason -> Text,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(auth_tokens -> users (user_id));
diesel::joinable!(stories -> users (author_id));
diesel::joinable!(episodes -> stories (story_id));
diesel::joinable!(versions -> episodes (episode_id));
diesel::joinable!(likes -> stories (story_id));
diesel::joinable!(favorites -> stories (story_id));
diesel::joinable!(story_followers -> stories (story_id));
diesel::joinable!(quarantine_reports -> stories (story_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    users,
    follows,
    auth_tokens,
    stories,
    episodes,
    versions,
    likes,
    favorites,
    story_followers,
    quarantine_reports,
);
