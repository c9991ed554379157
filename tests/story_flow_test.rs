#[cfg(test)]
mod story_flow_integration_tests {
    use chrono::Utc;
    use diesel::prelude::*;
    use diesel_migrations::MigrationHarness;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    use storyserver::moderation::{approve, record_report, reject, QUARANTINE_THRESHOLD};
    use storyserver::shared::error::ApiError;
    use storyserver::shared::models::{DbStory, DbUser, DbVersion, StoryStatus};
    use storyserver::shared::schema::{episodes, stories, users, versions};
    use storyserver::shared::utils::{create_conn, DbPool};
    use storyserver::stories::engagement::{insert_edge, remove_edge, EdgeKind};
    use storyserver::stories::episodes::create_with_first_version;
    use storyserver::stories::versions::create_next_version;
    use storyserver::tests::test_util::setup;
    use storyserver::{assert_err, assert_ok};

    // All tests skip when Postgres is not reachable.
    fn test_pool() -> Option<DbPool> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping test - DATABASE_URL not set");
                return None;
            }
        };
        let pool = match create_conn(&url) {
            Ok(pool) => pool,
            Err(_) => {
                println!("Skipping test - cannot connect to Postgres");
                return None;
            }
        };
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(_) => {
                println!("Skipping test - cannot check out a connection");
                return None;
            }
        };
        if conn.run_pending_migrations(storyserver::MIGRATIONS).is_err() {
            println!("Skipping test - migrations failed");
            return None;
        }
        Some(pool)
    }

    fn seed_user(conn: &mut PgConnection) -> DbUser {
        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        let user = DbUser {
            id: Uuid::new_v4(),
            username: format!("tester-{suffix}"),
            email: format!("tester-{suffix}@example.com"),
            password_hash: "x".to_string(),
            role: "user".to_string(),
            bio: None,
            organization_id: None,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        };
        assert_ok!(diesel::insert_into(users::table).values(&user).execute(conn));
        user
    }

    fn seed_story(conn: &mut PgConnection, author: &DbUser) -> DbStory {
        let now = Utc::now();
        let story = DbStory {
            id: Uuid::new_v4(),
            title: "Test Story".to_string(),
            description: "integration fixture".to_string(),
            author_id: author.id,
            status: "active".to_string(),
            visibility: "public".to_string(),
            quarantine_count: 0,
            created_at: now,
            updated_at: now,
        };
        assert_ok!(diesel::insert_into(stories::table)
            .values(&story)
            .execute(conn));
        story
    }

    fn report_times(conn: &mut PgConnection, story_id: Uuid, reporter: Uuid, n: i32) -> DbStory {
        let mut last = None;
        for _ in 0..n {
            last = Some(assert_ok!(record_report(conn, story_id, reporter, "spam")));
        }
        last.expect("at least one report")
    }

    #[test]
    fn engagement_edges_are_idempotent() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let reader = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);

        for kind in [EdgeKind::Like, EdgeKind::Favorite, EdgeKind::Follower] {
            assert!(assert_ok!(insert_edge(&mut conn, kind, reader.id, story.id)));
            assert!(!assert_ok!(insert_edge(&mut conn, kind, reader.id, story.id)));
            assert!(assert_ok!(remove_edge(&mut conn, kind, reader.id, story.id)));
            assert!(!assert_ok!(remove_edge(&mut conn, kind, reader.id, story.id)));
        }
    }

    #[test]
    fn reports_quarantine_at_threshold() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let reporter = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);

        for n in 1..QUARANTINE_THRESHOLD {
            let after = assert_ok!(record_report(&mut conn, story.id, reporter.id, "spam"));
            assert_eq!(after.quarantine_count, n);
            assert_eq!(after.status(), StoryStatus::Active);
        }

        let after = assert_ok!(record_report(&mut conn, story.id, reporter.id, "spam"));
        assert_eq!(after.quarantine_count, QUARANTINE_THRESHOLD);
        assert_eq!(after.status(), StoryStatus::Quarantined);

        // Further reports keep counting but do not change the state.
        let after = assert_ok!(record_report(&mut conn, story.id, reporter.id, "still spam"));
        assert_eq!(after.quarantine_count, QUARANTINE_THRESHOLD + 1);
        assert_eq!(after.status(), StoryStatus::Quarantined);
    }

    #[test]
    fn approve_resets_counter_and_rejoins_the_cycle() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let reporter = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);

        // Approve only applies to quarantined stories.
        let err = assert_err!(approve(&mut conn, story.id));
        assert!(matches!(err, ApiError::NotFound(_)));

        report_times(&mut conn, story.id, reporter.id, QUARANTINE_THRESHOLD);
        let cleared = assert_ok!(approve(&mut conn, story.id));
        assert_eq!(cleared.status(), StoryStatus::Approved);
        assert_eq!(cleared.quarantine_count, 0);

        // The counter starts over: a fresh run of reports quarantines again.
        let after = report_times(&mut conn, story.id, reporter.id, QUARANTINE_THRESHOLD);
        assert_eq!(after.quarantine_count, QUARANTINE_THRESHOLD);
        assert_eq!(after.status(), StoryStatus::Quarantined);
    }

    #[test]
    fn reject_is_terminal_and_keeps_the_counter() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let reporter = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);

        report_times(&mut conn, story.id, reporter.id, QUARANTINE_THRESHOLD);
        let rejected = assert_ok!(reject(&mut conn, story.id));
        assert_eq!(rejected.status(), StoryStatus::Rejected);
        assert_eq!(rejected.quarantine_count, QUARANTINE_THRESHOLD);

        // No path back: neither review action applies any longer, and more
        // reports keep counting without moving the state.
        let err = assert_err!(approve(&mut conn, story.id));
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = assert_err!(reject(&mut conn, story.id));
        assert!(matches!(err, ApiError::NotFound(_)));
        let after = assert_ok!(record_report(&mut conn, story.id, reporter.id, "late report"));
        assert_eq!(after.status(), StoryStatus::Rejected);
        assert_eq!(after.quarantine_count, QUARANTINE_THRESHOLD + 1);
    }

    #[test]
    fn episode_create_carries_its_first_version() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);

        let episode = assert_ok!(create_with_first_version(
            &mut conn,
            story.id,
            1,
            "Pilot",
            "once upon".to_string()
        ));
        let first: DbVersion = assert_ok!(versions::table
            .filter(versions::episode_id.eq(episode.id))
            .first(&mut conn));
        assert_eq!(first.version_number, 1);
        assert_eq!(first.content, "once upon");

        // A duplicate number fails as a whole: no second episode, no orphan
        // version.
        let err = assert_err!(create_with_first_version(
            &mut conn,
            story.id,
            1,
            "Again",
            "twice".to_string()
        ));
        assert!(matches!(err, ApiError::Conflict(_)));

        let episode_count: i64 = assert_ok!(episodes::table
            .filter(episodes::story_id.eq(story.id))
            .count()
            .get_result(&mut conn));
        assert_eq!(episode_count, 1);
        let version_count: i64 = assert_ok!(versions::table
            .filter(versions::episode_id.eq(episode.id))
            .count()
            .get_result(&mut conn));
        assert_eq!(version_count, 1);
    }

    #[test]
    fn concurrent_version_numbers_stay_contiguous() {
        setup();
        let Some(pool) = test_pool() else { return };
        let mut conn = assert_ok!(pool.get());
        let author = seed_user(&mut conn);
        let story = seed_story(&mut conn, &author);
        let episode = assert_ok!(create_with_first_version(
            &mut conn,
            story.id,
            1,
            "Pilot",
            "v1".to_string()
        ));
        drop(conn);

        let writers = 6;
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let pool = pool.clone();
                let episode_id = episode.id;
                std::thread::spawn(move || {
                    let mut conn = pool.get().expect("pooled connection");
                    assert_ok!(create_next_version(&mut conn, episode_id, &format!("draft {i}")))
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let mut conn = assert_ok!(pool.get());
        let numbers: Vec<i32> = assert_ok!(versions::table
            .filter(versions::episode_id.eq(episode.id))
            .select(versions::version_number)
            .load(&mut conn));
        let got: BTreeSet<i32> = numbers.iter().copied().collect();
        let want: BTreeSet<i32> = (1..=writers + 1).collect();
        assert_eq!(got, want, "version numbers must be contiguous 1..=N");
    }
}
