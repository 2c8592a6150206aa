use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Direction in which a test's scores improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetterScore {
    High,
    Low,
}

impl BetterScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetterScore::High => "high",
            BetterScore::Low => "low",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, anyhow::Error> {
        match value.to_lowercase().as_str() {
            "high" => Ok(BetterScore::High),
            "low" => Ok(BetterScore::Low),
            _ => Err(anyhow!("Invalid better_score value: {}", value)),
        }
    }
}

impl std::fmt::Display for BetterScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i64>,
    pub user_id: Option<i64>, // Account link, null until provisioned
}

#[derive(Debug, Clone, Serialize)]
pub struct FitnessTest {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub better_score: BetterScore,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbFitnessTest {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub better_score: Option<String>,
}

impl From<DbFitnessTest> for FitnessTest {
    fn from(test: DbFitnessTest) -> Self {
        Self {
            id: test.id.unwrap_or_default(),
            name: test.name.unwrap_or_default(),
            description: test.description.unwrap_or_default(),
            unit: test.unit.unwrap_or_default(),
            better_score: test
                .better_score
                .as_deref()
                .and_then(|s| BetterScore::from_str(s).ok())
                .unwrap_or(BetterScore::High),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestSession {
    pub id: i64,
    pub month: String,
    pub year: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestResult {
    pub id: i64,
    pub player_id: i64,
    pub test_id: i64,
    pub session_id: i64,
    pub score: Option<f64>, // Null when the player sat out this test
}
