use rocket::http::{ContentType, Header};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

use crate::error::AppError;
use crate::models::{FitnessTest, Player};
use crate::provision::ProvisionedAccount;

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

#[derive(Debug, Clone)]
pub struct SheetRow {
    /// 1-based line number in the uploaded file, header included.
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreSheet {
    pub header: Vec<String>,
    pub rows: Vec<SheetRow>,
}

pub fn parse_score_sheet(text: &str) -> Result<ScoreSheet, AppError> {
    let mut header = Vec::new();
    let mut rows = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        if line_no == 0 {
            header = parse_csv_record(raw_line.trim());
            continue;
        }
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        rows.push(SheetRow {
            line: line_no + 1,
            fields: parse_csv_record(line),
        });
    }

    if header.is_empty() {
        return Err(AppError::Validation(
            "Spreadsheet has no header row".to_string(),
        ));
    }

    Ok(ScoreSheet { header, rows })
}

/// Blank score grid with one row per player and one column per test.
pub fn render_template_sheet(players: &[Player], tests: &[FitnessTest]) -> String {
    let mut csv = String::from("Player ID,First Name,Last Name");
    for test in tests {
        csv.push(',');
        csv.push_str(&csv_quote(&test.name));
    }
    csv.push('\n');

    for player in players {
        csv.push_str(&format!(
            "{},{},{}",
            player.id,
            csv_quote(&player.first_name),
            csv_quote(&player.last_name)
        ));
        for _ in tests {
            csv.push(',');
        }
        csv.push('\n');
    }

    csv
}

pub fn render_credentials_sheet(accounts: &[ProvisionedAccount]) -> String {
    let mut csv = String::from("Player ID,First Name,Last Name,Username,Temp Password\n");
    for account in accounts {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            account.player_id,
            csv_quote(&account.first_name),
            csv_quote(&account.last_name),
            csv_quote(&account.username),
            csv_quote(&account.temp_password)
        ));
    }
    csv
}

/// CSV download with an attachment disposition.
pub struct CsvFile {
    pub filename: &'static str,
    pub content: String,
}

impl<'r> Responder<'r, 'static> for CsvFile {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::new("text", "csv"))
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ))
            .sized_body(self.content.len(), Cursor::new(self.content))
            .ok()
    }
}
