#[cfg(test)]
mod tests {
    use crate::db::{
        clean_expired_sessions, create_user, create_user_session, get_session_by_token,
        invalidate_session,
    };
    use crate::error::AppError;
    use crate::test::test_utils::{STANDARD_PASSWORD, TestDbBuilder};
    use chrono::{Duration, Utc};
    use sqlx::{Pool, Sqlite};
    use uuid::Uuid;

    async fn pool_with_user() -> (Pool<Sqlite>, i64) {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = create_user(
            &test_db.pool,
            "sessions@club.test",
            STANDARD_PASSWORD,
            "coach",
        )
        .await
        .expect("Failed to create user");

        (test_db.pool, user_id)
    }

    /// Inserts a session expiring `offset` from now and returns its token.
    async fn insert_session(pool: &Pool<Sqlite>, user_id: i64, offset: Duration) -> String {
        let token = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + offset).naive_utc();

        create_user_session(pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");

        token
    }

    #[rocket::async_test]
    async fn test_session_round_trip() {
        let (pool, user_id) = pool_with_user().await;

        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        let token = Uuid::new_v4().to_string();
        let session_id = create_user_session(&pool, user_id, &token, expires_at)
            .await
            .expect("Failed to create session");
        assert!(session_id > 0);

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token, token);

        let drift =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(drift <= 1, "Stored expiry drifted by {}s", drift);
    }

    #[rocket::async_test]
    async fn test_unknown_token_is_authentication_error() {
        let (pool, _) = pool_with_user().await;

        let result = get_session_by_token(&pool, "no_such_token").await;

        match result {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Invalid session token"),
            other => panic!("Expected authentication error, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn test_invalidate_session_removes_it() {
        let (pool, user_id) = pool_with_user().await;
        let token = insert_session(&pool, user_id, Duration::hours(1)).await;

        assert!(get_session_by_token(&pool, &token).await.is_ok());

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        assert!(
            get_session_by_token(&pool, &token).await.is_err(),
            "Session survived invalidation"
        );
    }

    #[rocket::async_test]
    async fn test_clean_expired_sessions_only_removes_expired() {
        let (pool, user_id) = pool_with_user().await;

        let expired = insert_session(&pool, user_id, -Duration::hours(1)).await;
        let expires_soon = insert_session(&pool, user_id, Duration::minutes(1)).await;
        let expires_later = insert_session(&pool, user_id, Duration::days(1)).await;

        let cleaned = clean_expired_sessions(&pool)
            .await
            .expect("Failed to clean expired sessions");
        assert_eq!(cleaned, 1, "Exactly one session had expired");

        assert!(get_session_by_token(&pool, &expired).await.is_err());
        assert!(get_session_by_token(&pool, &expires_soon).await.is_ok());
        assert!(get_session_by_token(&pool, &expires_later).await.is_ok());
    }

    #[rocket::async_test]
    async fn test_is_valid_tracks_expiry() {
        let (pool, user_id) = pool_with_user().await;

        let expired = insert_session(&pool, user_id, -Duration::hours(1)).await;
        let live = insert_session(&pool, user_id, Duration::hours(1)).await;

        let session = get_session_by_token(&pool, &expired)
            .await
            .expect("Expired sessions are still retrievable");
        assert!(!session.is_valid());

        let session = get_session_by_token(&pool, &live)
            .await
            .expect("Failed to get session");
        assert!(session.is_valid());
    }
}
