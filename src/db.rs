use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::models::{DbFitnessTest, FitnessTest, Player, TestResult, TestSession};
use crate::stats::{LeaderboardRow, PlayerResultRow};

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT u.id, u.email, u.role, p.id AS player_id
         FROM users u
         LEFT JOIN players p ON p.user_id = u.id
         WHERE u.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    info!("Looking up user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT u.id, u.email, u.role, p.id AS player_id
         FROM users u
         LEFT JOIN players p ON p.user_id = u.id
         WHERE u.email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn get_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<User, AppError> {
    info!("Getting user by email");
    match find_user_by_email(pool, email).await? {
        Some(user) => Ok(user),
        _ => Err(AppError::NotFound(format!(
            "User with email {} not found in database",
            email
        ))),
    }
}

#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let stored_password =
        sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    let valid = match stored_password {
        // Verify the password using bcrypt
        Some(hash) => match bcrypt::verify(password, &hash) {
            Ok(valid) => valid,
            Err(_) => false,
        },
        _ => false,
    };

    if valid {
        Ok(Some(get_user_by_email(pool, email).await?))
    } else {
        Ok(None)
    }
}

#[instrument(skip_all, fields(email, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing_user = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(format!(
            "Account '{}' already exists",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (email, password, role) VALUES (?, ?, ?)")
        .bind(email)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument]
pub async fn get_all_players(pool: &Pool<Sqlite>) -> Result<Vec<Player>, AppError> {
    info!("Getting all players");
    let players = sqlx::query_as::<_, Player>(
        "SELECT id, first_name, last_name, age, user_id FROM players ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(players)
}

#[instrument]
pub async fn get_player(pool: &Pool<Sqlite>, id: i64) -> Result<Player, AppError> {
    info!("Getting player");
    let player = sqlx::query_as::<_, Player>(
        "SELECT id, first_name, last_name, age, user_id FROM players WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match player {
        Some(player) => Ok(player),
        _ => Err(AppError::NotFound(format!(
            "Player with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn create_player(
    pool: &Pool<Sqlite>,
    first_name: &str,
    last_name: &str,
    age: Option<i64>,
) -> Result<i64, AppError> {
    info!("Creating player");
    let res = sqlx::query("INSERT INTO players (first_name, last_name, age) VALUES (?, ?, ?)")
        .bind(first_name)
        .bind(last_name)
        .bind(age)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_player(
    pool: &Pool<Sqlite>,
    id: i64,
    first_name: &str,
    last_name: &str,
    age: Option<i64>,
) -> Result<(), AppError> {
    info!("Updating player");
    sqlx::query("UPDATE players SET first_name = ?, last_name = ?, age = ? WHERE id = ?")
        .bind(first_name)
        .bind(last_name)
        .bind(age)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn delete_player(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting player");
    // Results cascade at the schema level
    sqlx::query("DELETE FROM players WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn link_player_account(
    pool: &Pool<Sqlite>,
    player_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    info!("Linking player to user account");
    sqlx::query("UPDATE players SET user_id = ? WHERE id = ?")
        .bind(user_id)
        .bind(player_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn get_players_without_accounts(pool: &Pool<Sqlite>) -> Result<Vec<Player>, AppError> {
    info!("Getting players without linked accounts");
    let players = sqlx::query_as::<_, Player>(
        "SELECT id, first_name, last_name, age, user_id FROM players WHERE user_id IS NULL ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(players)
}

#[instrument]
pub async fn get_all_tests(pool: &Pool<Sqlite>) -> Result<Vec<FitnessTest>, AppError> {
    info!("Getting all tests");
    let rows = sqlx::query_as::<_, DbFitnessTest>(
        "SELECT id, name, description, unit, better_score FROM tests ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FitnessTest::from).collect())
}

#[instrument]
pub async fn get_test(pool: &Pool<Sqlite>, id: i64) -> Result<FitnessTest, AppError> {
    info!("Getting test");
    let row = sqlx::query_as::<_, DbFitnessTest>(
        "SELECT id, name, description, unit, better_score FROM tests WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(test) => Ok(FitnessTest::from(test)),
        _ => Err(AppError::NotFound(format!(
            "Test with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn create_test(
    pool: &Pool<Sqlite>,
    name: &str,
    description: &str,
    unit: &str,
    better_score: &str,
) -> Result<i64, AppError> {
    info!("Creating test");
    let res = sqlx::query(
        "INSERT INTO tests (name, description, unit, better_score) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(unit)
    .bind(better_score)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_test(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    description: &str,
    unit: &str,
    better_score: &str,
) -> Result<(), AppError> {
    info!("Updating test");
    sqlx::query(
        "UPDATE tests SET name = ?, description = ?, unit = ?, better_score = ? WHERE id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(unit)
    .bind(better_score)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument]
pub async fn delete_test(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting test");
    sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn find_session(
    pool: &Pool<Sqlite>,
    month: &str,
    year: i64,
) -> Result<Option<TestSession>, AppError> {
    info!("Looking up testing session");
    let session = sqlx::query_as::<_, TestSession>(
        "SELECT id, month, year FROM test_sessions WHERE month = ? AND year = ?",
    )
    .bind(month)
    .bind(year)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

#[instrument]
pub async fn find_or_create_session(
    pool: &Pool<Sqlite>,
    month: &str,
    year: i64,
) -> Result<TestSession, AppError> {
    if let Some(session) = find_session(pool, month, year).await? {
        return Ok(session);
    }

    info!("Creating testing session");
    let res = sqlx::query("INSERT INTO test_sessions (month, year) VALUES (?, ?)")
        .bind(month)
        .bind(year)
        .execute(pool)
        .await?;

    Ok(TestSession {
        id: res.last_insert_rowid(),
        month: month.to_string(),
        year,
    })
}

#[instrument]
pub async fn get_all_sessions(pool: &Pool<Sqlite>) -> Result<Vec<TestSession>, AppError> {
    info!("Getting all testing sessions");
    let sessions = sqlx::query_as::<_, TestSession>(
        "SELECT id, month, year FROM test_sessions ORDER BY year, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

#[instrument]
pub async fn get_session(pool: &Pool<Sqlite>, id: i64) -> Result<TestSession, AppError> {
    info!("Getting testing session");
    let session = sqlx::query_as::<_, TestSession>(
        "SELECT id, month, year FROM test_sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(session),
        _ => Err(AppError::NotFound(format!(
            "Testing session with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_result(
    pool: &Pool<Sqlite>,
    player_id: i64,
    test_id: i64,
    session_id: i64,
) -> Result<Option<TestResult>, AppError> {
    let result = sqlx::query_as::<_, TestResult>(
        "SELECT id, player_id, test_id, session_id, score FROM test_results
         WHERE player_id = ? AND test_id = ? AND session_id = ?",
    )
    .bind(player_id)
    .bind(test_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(result)
}

#[instrument]
pub async fn get_scores_for_session_test(
    pool: &Pool<Sqlite>,
    session_id: i64,
    test_id: i64,
) -> Result<Vec<f64>, AppError> {
    // Null scores stay out of every statistic
    let scores = sqlx::query_scalar::<_, f64>(
        "SELECT score FROM test_results
         WHERE session_id = ? AND test_id = ? AND score IS NOT NULL",
    )
    .bind(session_id)
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    Ok(scores)
}

#[instrument]
pub async fn get_leaderboard_rows(
    pool: &Pool<Sqlite>,
    session_id: i64,
    test_id: i64,
) -> Result<Vec<LeaderboardRow>, AppError> {
    info!("Getting leaderboard rows");
    let rows = sqlx::query_as::<_, LeaderboardRow>(
        "SELECT p.id AS player_id, p.first_name, p.last_name, r.score
         FROM test_results r
         JOIN players p ON p.id = r.player_id
         WHERE r.session_id = ? AND r.test_id = ? AND r.score IS NOT NULL
         ORDER BY r.id",
    )
    .bind(session_id)
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument]
pub async fn get_sessions_for_player(
    pool: &Pool<Sqlite>,
    player_id: i64,
) -> Result<Vec<TestSession>, AppError> {
    info!("Getting sessions with results for player");
    let sessions = sqlx::query_as::<_, TestSession>(
        "SELECT DISTINCT s.id, s.month, s.year
         FROM test_sessions s
         JOIN test_results r ON r.session_id = s.id
         WHERE r.player_id = ?
         ORDER BY s.year, s.id",
    )
    .bind(player_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

#[instrument]
pub async fn get_player_results_for_session(
    pool: &Pool<Sqlite>,
    player_id: i64,
    session_id: i64,
) -> Result<Vec<PlayerResultRow>, AppError> {
    info!("Getting player results for session");
    let rows = sqlx::query_as::<_, PlayerResultRow>(
        "SELECT r.test_id, t.name AS test_name, t.unit AS test_unit, r.score
         FROM test_results r
         JOIN tests t ON t.id = r.test_id
         WHERE r.player_id = ? AND r.session_id = ?
         ORDER BY t.name",
    )
    .bind(player_id)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
