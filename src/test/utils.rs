#[cfg(test)]
pub mod test_utils {
    use crate::auth::Role;
    use crate::db::{
        create_player, create_test, create_user, find_or_create_session, link_player_account,
    };
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{BetterScore, TestResult};
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        players: Vec<TestPlayer>,
        tests: Vec<TestDefinition>,
        sessions: Vec<(String, i64)>,
        results: Vec<TestScore>,
    }

    pub struct TestUser {
        pub email: String,
        pub role: Role,
        pub password: String,
        pub player_name: Option<String>,
    }

    pub struct TestPlayer {
        pub first_name: String,
        pub last_name: String,
        pub age: Option<i64>,
    }

    pub struct TestDefinition {
        pub name: String,
        pub unit: String,
        pub better_score: BetterScore,
    }

    pub struct TestScore {
        pub player_name: String,
        pub test_name: String,
        pub month: String,
        pub year: i64,
        pub score: Option<f64>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn coach(mut self, email: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                role: Role::Coach,
                password: STANDARD_PASSWORD.to_string(),
                player_name: None,
            });
            self
        }

        /// A player-role login linked to the named player.
        pub fn player_account(mut self, email: &str, player_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                role: Role::Player,
                password: STANDARD_PASSWORD.to_string(),
                player_name: Some(player_name.to_string()),
            });
            self
        }

        pub fn player(mut self, first_name: &str, last_name: &str, age: Option<i64>) -> Self {
            self.players.push(TestPlayer {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                age,
            });
            self
        }

        pub fn fitness_test(mut self, name: &str, unit: &str, better_score: BetterScore) -> Self {
            self.tests.push(TestDefinition {
                name: name.to_string(),
                unit: unit.to_string(),
                better_score,
            });
            self
        }

        pub fn session(mut self, month: &str, year: i64) -> Self {
            self.sessions.push((month.to_string(), year));
            self
        }

        pub fn result(
            mut self,
            player_name: &str,
            test_name: &str,
            month: &str,
            year: i64,
            score: Option<f64>,
        ) -> Self {
            self.results.push(TestScore {
                player_name: player_name.to_string(),
                test_name: test_name.to_string(),
                month: month.to_string(),
                year,
                score,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut player_id_map: HashMap<String, i64> = HashMap::new();
            let mut test_id_map: HashMap<String, i64> = HashMap::new();
            let mut session_id_map: HashMap<(String, i64), i64> = HashMap::new();

            for player in &self.players {
                let player_id =
                    create_player(&pool, &player.first_name, &player.last_name, player.age).await?;

                player_id_map.insert(
                    format!("{} {}", player.first_name, player.last_name),
                    player_id,
                );
            }

            for user in &self.users {
                let user_id =
                    create_user(&pool, &user.email, &user.password, user.role.as_str()).await?;

                if let Some(player_name) = &user.player_name {
                    if let Some(player_id) = player_id_map.get(player_name).copied() {
                        link_player_account(&pool, player_id, user_id).await?;
                    }
                }
            }

            for test in &self.tests {
                let test_id =
                    create_test(&pool, &test.name, "", &test.unit, test.better_score.as_str())
                        .await?;

                test_id_map.insert(test.name.clone(), test_id);
            }

            for (month, year) in &self.sessions {
                let session = find_or_create_session(&pool, month, *year).await?;
                session_id_map.insert((month.clone(), *year), session.id);
            }

            for score in &self.results {
                let session = find_or_create_session(&pool, &score.month, score.year).await?;
                session_id_map.insert((score.month.clone(), score.year), session.id);

                let player_id = player_id_map[&score.player_name];
                let test_id = test_id_map[&score.test_name];

                sqlx::query(
                    "INSERT INTO test_results (player_id, test_id, session_id, score)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(player_id)
                .bind(test_id)
                .bind(session.id)
                .bind(score.score)
                .execute(&pool)
                .await?;
            }

            Ok(TestDb {
                pool,
                player_id_map,
                test_id_map,
                session_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub player_id_map: HashMap<String, i64>,
        pub test_id_map: HashMap<String, i64>,
        pub session_id_map: HashMap<(String, i64), i64>,
    }

    impl TestDb {
        pub fn player_id(&self, name: &str) -> Option<i64> {
            self.player_id_map.get(name).copied()
        }

        pub fn test_id(&self, name: &str) -> Option<i64> {
            self.test_id_map.get(name).copied()
        }

        pub fn session_id(&self, month: &str, year: i64) -> Option<i64> {
            self.session_id_map.get(&(month.to_string(), year)).copied()
        }

        pub async fn result_row(
            &self,
            player_name: &str,
            test_name: &str,
            month: &str,
            year: i64,
        ) -> Option<TestResult> {
            let player_id = self.player_id(player_name).expect("Player not found");
            let test_id = self.test_id(test_name).expect("Test not found");
            let session_id = self.session_id(month, year).expect("Session not found");

            crate::db::get_result(&self.pool, player_id, test_id, session_id)
                .await
                .expect("Failed to fetch result")
        }

        pub async fn score(
            &self,
            player_name: &str,
            test_name: &str,
            month: &str,
            year: i64,
        ) -> Option<f64> {
            self.result_row(player_name, test_name, month, year)
                .await
                .and_then(|result| result.score)
        }

        pub async fn result_count(&self) -> i64 {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM test_results")
                .fetch_one(&self.pool)
                .await
                .expect("Failed to count results")
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .coach("coach@club.test")
            .player("Jane", "Doe", Some(16))
            .player("Amy", "Pond", Some(15))
            .player("Ben", "King", Some(17))
            .player_account("jane.doe", "Jane Doe")
            .fitness_test("Sprint 40m", "seconds", BetterScore::Low)
            .fitness_test("Vertical Jump", "cm", BetterScore::High)
            .result("Jane Doe", "Sprint 40m", "March", 2024, Some(5.2))
            .result("Amy Pond", "Sprint 40m", "March", 2024, Some(4.9))
            .result("Ben King", "Sprint 40m", "March", 2024, Some(5.6))
            .result("Jane Doe", "Vertical Jump", "March", 2024, Some(41.0))
            .result("Amy Pond", "Vertical Jump", "March", 2024, Some(38.0))
            .result("Ben King", "Vertical Jump", "March", 2024, None)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone()).await;
        let client = Client::untracked(rocket)
            .await
            .expect("Failed to create test client");

        (client, test_db)
    }

    pub async fn login_test_user(
        client: &Client,
        email: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": email,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .iter()
            .map(|cookie| cookie.clone().into_owned())
            .collect()
    }
}
