use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::db::{
    get_leaderboard_rows, get_player_results_for_session, get_scores_for_session_test, get_session,
    get_sessions_for_player, get_test,
};
use crate::error::AppError;
use crate::models::{BetterScore, FitnessTest, TestSession};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ScoreStats {
    pub best: f64,
    pub worst: f64,
    pub avg: f64,
}

/// Compute best (max), worst (min) and arithmetic mean for a score pool.
///
/// Returns the all-zeros sentinel for an empty pool. Best and worst are
/// numeric extremes regardless of the test's better-score direction.
pub fn score_stats(scores: &[f64]) -> ScoreStats {
    if scores.is_empty() {
        return ScoreStats::default();
    }
    let mut best = scores[0];
    let mut worst = scores[0];
    for &score in &scores[1..] {
        if score > best {
            best = score;
        }
        if score < worst {
            worst = score;
        }
    }
    ScoreStats {
        best,
        worst,
        avg: scores.iter().sum::<f64>() / scores.len() as f64,
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerResultRow {
    pub test_id: i64,
    pub test_name: String,
    pub test_unit: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub score: f64,
    pub rank: usize,
}

/// Order rows by score (descending when higher is better, ascending when
/// lower is) and assign 1-based ranks. Equal scores take player id ascending
/// as the tie-break, so ties still receive distinct, deterministic ranks.
pub fn rank_scores(mut rows: Vec<LeaderboardRow>, direction: BetterScore) -> Vec<RankedResult> {
    rows.sort_by(|a, b| {
        let by_score = match direction {
            BetterScore::High => b.score.total_cmp(&a.score),
            BetterScore::Low => a.score.total_cmp(&b.score),
        };
        by_score.then(a.player_id.cmp(&b.player_id))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| RankedResult {
            player_id: row.player_id,
            first_name: row.first_name,
            last_name: row.last_name,
            score: row.score,
            rank: i + 1,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsSort {
    FirstName,
    LastName,
    PlayerId,
    Score,
    Rank,
}

impl ResultsSort {
    pub fn parse(value: &str) -> Self {
        match value {
            "first_name" => ResultsSort::FirstName,
            "last_name" => ResultsSort::LastName,
            "player_id" => ResultsSort::PlayerId,
            "score" => ResultsSort::Score,
            _ => ResultsSort::Rank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        match value {
            "desc" => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// Re-order a ranked view for display. The stable sort leaves the computed
/// rank values untouched.
pub fn sort_standings(standings: &mut [RankedResult], sort_by: ResultsSort, order: SortOrder) {
    standings.sort_by(|a, b| {
        let ordering = match sort_by {
            ResultsSort::FirstName => a.first_name.cmp(&b.first_name),
            ResultsSort::LastName => a.last_name.cmp(&b.last_name),
            ResultsSort::PlayerId => a.player_id.cmp(&b.player_id),
            ResultsSort::Score => a.score.total_cmp(&b.score),
            ResultsSort::Rank => a.rank.cmp(&b.rank),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[derive(Debug, Serialize)]
pub struct Leaderboard {
    pub session: TestSession,
    pub test: FitnessTest,
    pub standings: Vec<RankedResult>,
    pub stats: ScoreStats,
}

#[instrument(skip(pool))]
pub async fn session_leaderboard(
    pool: &Pool<Sqlite>,
    session_id: i64,
    test_id: i64,
    sort_by: ResultsSort,
    order: SortOrder,
) -> Result<Leaderboard, AppError> {
    let session = get_session(pool, session_id).await?;
    let test = get_test(pool, test_id).await?;

    let rows = get_leaderboard_rows(pool, session_id, test_id).await?;
    let mut standings = rank_scores(rows, test.better_score);
    sort_standings(&mut standings, sort_by, order);

    let scores: Vec<f64> = standings.iter().map(|r| r.score).collect();
    let stats = score_stats(&scores);

    Ok(Leaderboard {
        session,
        test,
        standings,
        stats,
    })
}

#[derive(Debug, Serialize)]
pub struct PlayerResult {
    pub test_id: i64,
    pub test_name: String,
    pub unit: String,
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SessionBreakdown {
    pub session: TestSession,
    pub results: Vec<PlayerResult>,
    /// Whole-pool stats per test id, over every player's scores in the session.
    pub stats: HashMap<i64, ScoreStats>,
}

#[instrument(skip(pool))]
pub async fn player_session_breakdown(
    pool: &Pool<Sqlite>,
    player_id: i64,
) -> Result<Vec<SessionBreakdown>, AppError> {
    let sessions = get_sessions_for_player(pool, player_id).await?;

    let mut breakdown = Vec::with_capacity(sessions.len());
    for session in sessions {
        let rows = get_player_results_for_session(pool, player_id, session.id).await?;

        let mut stats = HashMap::new();
        for row in &rows {
            let scores = get_scores_for_session_test(pool, session.id, row.test_id).await?;
            stats.insert(row.test_id, score_stats(&scores));
        }

        let results = rows
            .into_iter()
            .map(|row| PlayerResult {
                test_id: row.test_id,
                test_name: row.test_name,
                unit: row.test_unit.unwrap_or_default(),
                score: row.score,
            })
            .collect();

        breakdown.push(SessionBreakdown {
            session,
            results,
            stats,
        });
    }

    Ok(breakdown)
}
