#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::db::{
        authenticate_user, create_player, create_user, delete_player, find_session,
        find_or_create_session, find_user_by_email, get_all_sessions, get_all_tests,
        get_leaderboard_rows, get_player, get_players_without_accounts, get_scores_for_session_test,
        get_sessions_for_player, get_test, get_user_by_email, update_player, update_test,
    };
    use crate::error::AppError;
    use crate::models::BetterScore;
    use crate::test::test_utils::{STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db};

    #[rocket::async_test]
    async fn test_create_and_find_user() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        create_user(&test_db.pool, "coach@club.test", STANDARD_PASSWORD, "coach")
            .await
            .expect("Failed to create user");

        let user = find_user_by_email(&test_db.pool, "coach@club.test")
            .await
            .expect("Failed to look up user");

        match user {
            Some(user) => {
                assert_eq!(user.email, "coach@club.test");
                assert_eq!(user.role, Role::Coach);
                assert_eq!(user.player_id, None);
            }
            _ => panic!("User wasn't created"),
        }

        let missing = find_user_by_email(&test_db.pool, "nobody@club.test")
            .await
            .expect("Lookup should not error");
        assert!(missing.is_none());

        let not_found = get_user_by_email(&test_db.pool, "nobody@club.test").await;
        assert!(matches!(not_found, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_duplicate_user_rejected() {
        let test_db = TestDbBuilder::new()
            .coach("coach@club.test")
            .build()
            .await
            .expect("Failed to build test database");

        let result =
            create_user(&test_db.pool, "coach@club.test", STANDARD_PASSWORD, "coach").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_authenticate_user() {
        let test_db = TestDbBuilder::new()
            .coach("coach@club.test")
            .build()
            .await
            .expect("Failed to build test database");

        let user = authenticate_user(&test_db.pool, "coach@club.test", STANDARD_PASSWORD)
            .await
            .expect("Authentication should not error");
        assert!(user.is_some(), "Correct password was rejected");

        let user = authenticate_user(&test_db.pool, "coach@club.test", "wrong_password")
            .await
            .expect("Authentication should not error");
        assert!(user.is_none(), "Wrong password was accepted");

        let user = authenticate_user(&test_db.pool, "nobody@club.test", STANDARD_PASSWORD)
            .await
            .expect("Authentication should not error");
        assert!(user.is_none(), "Unknown email was accepted");
    }

    #[rocket::async_test]
    async fn test_player_crud() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let player_id = create_player(&test_db.pool, "Jane", "Doe", Some(16))
            .await
            .expect("Failed to create player");

        let player = get_player(&test_db.pool, player_id)
            .await
            .expect("Failed to get player");
        assert_eq!(player.first_name, "Jane");
        assert_eq!(player.last_name, "Doe");
        assert_eq!(player.age, Some(16));
        assert_eq!(player.user_id, None);

        update_player(&test_db.pool, player_id, "Janet", "Doe", None)
            .await
            .expect("Failed to update player");

        let player = get_player(&test_db.pool, player_id)
            .await
            .expect("Failed to get player");
        assert_eq!(player.first_name, "Janet");
        assert_eq!(player.age, None);

        delete_player(&test_db.pool, player_id)
            .await
            .expect("Failed to delete player");

        let missing = get_player(&test_db.pool, player_id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_delete_player_cascades_results() {
        let test_db = create_standard_test_db().await;

        assert_eq!(test_db.result_count().await, 6);

        let jane_id = test_db.player_id("Jane Doe").expect("Player not found");
        delete_player(&test_db.pool, jane_id)
            .await
            .expect("Failed to delete player");

        assert_eq!(test_db.result_count().await, 4);

        let session_id = test_db.session_id("March", 2024).expect("Session not found");
        let sprint_id = test_db.test_id("Sprint 40m").expect("Test not found");

        let rows = get_leaderboard_rows(&test_db.pool, session_id, sprint_id)
            .await
            .expect("Failed to get leaderboard rows");
        assert_eq!(rows.len(), 2);
        assert!(!rows.iter().any(|r| r.player_id == jane_id));
    }

    #[rocket::async_test]
    async fn test_players_without_accounts() {
        let test_db = create_standard_test_db().await;

        let unlinked = get_players_without_accounts(&test_db.pool)
            .await
            .expect("Failed to get unlinked players");

        let names: Vec<String> = unlinked
            .iter()
            .map(|p| format!("{} {}", p.first_name, p.last_name))
            .collect();

        assert_eq!(names, vec!["Amy Pond", "Ben King"]);
    }

    #[rocket::async_test]
    async fn test_fitness_test_roundtrip() {
        let test_db = create_standard_test_db().await;

        let sprint_id = test_db.test_id("Sprint 40m").expect("Test not found");

        let sprint = get_test(&test_db.pool, sprint_id)
            .await
            .expect("Failed to get test");
        assert_eq!(sprint.name, "Sprint 40m");
        assert_eq!(sprint.unit, "seconds");
        assert_eq!(sprint.better_score, BetterScore::Low);

        update_test(&test_db.pool, sprint_id, "Sprint 50m", "", "seconds", "high")
            .await
            .expect("Failed to update test");

        let sprint = get_test(&test_db.pool, sprint_id)
            .await
            .expect("Failed to get test");
        assert_eq!(sprint.name, "Sprint 50m");
        assert_eq!(sprint.better_score, BetterScore::High);

        // Name-ordered listing
        let all = get_all_tests(&test_db.pool)
            .await
            .expect("Failed to list tests");
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Sprint 50m", "Vertical Jump"]);
    }

    #[rocket::async_test]
    async fn test_session_reuse() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let first = find_or_create_session(&test_db.pool, "March", 2024)
            .await
            .expect("Failed to create session");
        let second = find_or_create_session(&test_db.pool, "March", 2024)
            .await
            .expect("Failed to find session");

        assert_eq!(first.id, second.id, "Same month and year must reuse the session");

        let other = find_or_create_session(&test_db.pool, "April", 2024)
            .await
            .expect("Failed to create session");
        assert_ne!(first.id, other.id);

        // Month text is compared exactly
        let lowercase = find_or_create_session(&test_db.pool, "march", 2024)
            .await
            .expect("Failed to create session");
        assert_ne!(first.id, lowercase.id);

        let missing = find_session(&test_db.pool, "May", 2024)
            .await
            .expect("Lookup should not error");
        assert!(missing.is_none());

        let all = get_all_sessions(&test_db.pool)
            .await
            .expect("Failed to list sessions");
        assert_eq!(all.len(), 3);
    }

    #[rocket::async_test]
    async fn test_score_pool_excludes_null() {
        let test_db = create_standard_test_db().await;

        let session_id = test_db.session_id("March", 2024).expect("Session not found");
        let jump_id = test_db.test_id("Vertical Jump").expect("Test not found");

        let scores = get_scores_for_session_test(&test_db.pool, session_id, jump_id)
            .await
            .expect("Failed to get scores");
        assert_eq!(scores.len(), 2, "Null score must not join the pool");

        let rows = get_leaderboard_rows(&test_db.pool, session_id, jump_id)
            .await
            .expect("Failed to get leaderboard rows");
        let ben_id = test_db.player_id("Ben King").expect("Player not found");
        assert!(!rows.iter().any(|r| r.player_id == ben_id));
    }

    #[rocket::async_test]
    async fn test_sessions_for_player() {
        let test_db = create_standard_test_db().await;

        let jane_id = test_db.player_id("Jane Doe").expect("Player not found");
        let sessions = get_sessions_for_player(&test_db.pool, jane_id)
            .await
            .expect("Failed to get sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].month, "March");
        assert_eq!(sessions[0].year, 2024);

        let new_player = create_player(&test_db.pool, "Zoe", "New", None)
            .await
            .expect("Failed to create player");
        let sessions = get_sessions_for_player(&test_db.pool, new_player)
            .await
            .expect("Failed to get sessions");
        assert!(sessions.is_empty());
    }
}
