use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{find_or_create_session, get_all_players, get_all_tests};
use crate::error::AppError;
use crate::models::{FitnessTest, Player};
use crate::sheet::{SheetRow, parse_score_sheet};

pub const PLAYER_ID_COLUMN: &str = "Player ID";

/// Template columns carried for readability, never matched against tests.
const NAME_COLUMNS: [&str; 2] = ["First Name", "Last Name"];

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SheetWarning {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

/// Where each header column landed: the player-id column, columns matched
/// to known tests, and columns nothing matched.
#[derive(Debug)]
pub struct MappedHeader {
    pub player_column: usize,
    pub test_columns: Vec<(usize, i64)>,
    pub unmatched_columns: Vec<String>,
}

pub fn map_header(
    header: &[String],
    tests: &HashMap<String, FitnessTest>,
) -> Result<MappedHeader, AppError> {
    let mut player_column = None;
    let mut test_columns = Vec::new();
    let mut unmatched_columns = Vec::new();

    for (index, name) in header.iter().enumerate() {
        let name = name.trim();
        if name == PLAYER_ID_COLUMN {
            player_column = Some(index);
        } else if NAME_COLUMNS.contains(&name) {
            continue;
        } else if let Some(test) = tests.get(name) {
            test_columns.push((index, test.id));
        } else {
            unmatched_columns.push(name.to_string());
        }
    }

    match player_column {
        Some(player_column) => Ok(MappedHeader {
            player_column,
            test_columns,
            unmatched_columns,
        }),
        _ => Err(AppError::Validation(format!(
            "Spreadsheet is missing the '{}' column",
            PLAYER_ID_COLUMN
        ))),
    }
}

fn resolve_player(
    row: &SheetRow,
    player_column: usize,
    players: &HashMap<i64, Player>,
) -> Result<i64, SheetWarning> {
    let raw = row
        .fields
        .get(player_column)
        .map(|f| f.trim())
        .unwrap_or("");

    if raw.is_empty() {
        return Err(SheetWarning {
            line: row.line,
            code: "missing_player_id",
            message: "row has no player id".to_string(),
        });
    }

    let player_id = raw.parse::<i64>().map_err(|_| SheetWarning {
        line: row.line,
        code: "bad_player_id",
        message: format!("player id '{}' is not numeric", raw),
    })?;

    if !players.contains_key(&player_id) {
        return Err(SheetWarning {
            line: row.line,
            code: "unknown_player",
            message: format!("no player with id {}", player_id),
        });
    }

    Ok(player_id)
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub session_id: i64,
    pub month: String,
    pub year: i64,
    pub rows_total: usize,
    pub rows_matched: usize,
    pub results_inserted: usize,
    pub results_updated: usize,
    pub unmatched_columns: Vec<String>,
    pub warnings: Vec<SheetWarning>,
}

/// Reconciles an uploaded score sheet against known players and tests,
/// upserting one result per (player, test, session) cell.
#[instrument(skip(pool, text))]
pub async fn import_score_sheet(
    pool: &Pool<Sqlite>,
    month: &str,
    year: i64,
    text: &str,
) -> Result<ImportReport, AppError> {
    let sheet = parse_score_sheet(text)?;

    let tests: HashMap<String, FitnessTest> = get_all_tests(pool)
        .await?
        .into_iter()
        .map(|t| (t.name.clone(), t))
        .collect();
    let players: HashMap<i64, Player> = get_all_players(pool)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mapped = map_header(&sheet.header, &tests)?;

    // The session row persists even when every data row ends up skipped
    let session = find_or_create_session(pool, month, year).await?;

    let mut warnings = Vec::new();
    let mut rows_matched = 0usize;
    let mut results_inserted = 0usize;
    let mut results_updated = 0usize;

    let mut tx = pool.begin().await?;

    for row in &sheet.rows {
        let player_id = match resolve_player(row, mapped.player_column, &players) {
            Ok(id) => id,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };

        rows_matched += 1;

        for (column, test_id) in &mapped.test_columns {
            let raw = row.fields.get(*column).map(|f| f.trim()).unwrap_or("");
            if raw.is_empty() {
                // Empty cell means no data, not zero
                continue;
            }

            let score = match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    warnings.push(SheetWarning {
                        line: row.line,
                        code: "bad_score",
                        message: format!("score '{}' is not numeric", raw),
                    });
                    continue;
                }
            };

            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM test_results
                 WHERE player_id = ? AND test_id = ? AND session_id = ?",
            )
            .bind(player_id)
            .bind(test_id)
            .bind(session.id)
            .fetch_optional(&mut *tx)
            .await?;

            match existing {
                Some(result_id) => {
                    sqlx::query("UPDATE test_results SET score = ? WHERE id = ?")
                        .bind(score)
                        .bind(result_id)
                        .execute(&mut *tx)
                        .await?;
                    results_updated += 1;
                }
                _ => {
                    sqlx::query(
                        "INSERT INTO test_results (player_id, test_id, session_id, score)
                         VALUES (?, ?, ?, ?)",
                    )
                    .bind(player_id)
                    .bind(test_id)
                    .bind(session.id)
                    .bind(score)
                    .execute(&mut *tx)
                    .await?;
                    results_inserted += 1;
                }
            }
        }
    }

    tx.commit().await?;

    info!(
        session_id = session.id,
        rows_total = sheet.rows.len(),
        rows_matched,
        results_inserted,
        results_updated,
        warning_count = warnings.len(),
        "Score sheet imported"
    );

    Ok(ImportReport {
        session_id: session.id,
        month: session.month,
        year: session.year,
        rows_total: sheet.rows.len(),
        rows_matched,
        results_inserted,
        results_updated,
        unmatched_columns: mapped.unmatched_columns,
        warnings,
    })
}
