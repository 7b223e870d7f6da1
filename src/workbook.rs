use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;

use crate::db::{Role, UserRecord};
use crate::normalize::{clean_header, WideTable};

/// Convert a cell to display text. Whole floats print as integers so numeric
/// name cells round-trip the way spreadsheet UIs show them.
fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => format!("{}", other),
    }
}

/// Read every sheet of a score workbook into its wide shape. Sheet name is
/// the lesson tag; the first row is taken as the header row.
pub fn read_score_workbook(path: &Path) -> Result<Vec<WideTable>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut tables = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("failed to read sheet {}", name))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(cell_to_text).collect(),
            None => Vec::new(),
        };
        tables.push(WideTable {
            lesson: name.clone(),
            headers,
            rows: rows.map(|r| r.to_vec()).collect(),
        });
    }
    Ok(tables)
}

#[derive(Debug, Clone, Default)]
pub struct UsersOutcome {
    pub users: Vec<UserRecord>,
    /// Rows with an unknown role or missing name/credential.
    pub skipped_rows: usize,
}

/// Header spellings for the credential table, compared after cleanup.
/// Whole-header equality, not substring match: "student" must not capture
/// "student name" style headers from a mispasted sheet.
const USER_HEADER_RULES: [(&str, &[&str]); 6] = [
    ("role", &["role"]),
    ("name", &["name", "display name", "user name"]),
    ("credential", &["credential", "password"]),
    ("school", &["school"]),
    ("teacher", &["teacher", "linked teacher"]),
    ("student", &["student", "linked student"]),
];

fn map_user_columns(headers: &[String]) -> HashMap<&'static str, usize> {
    let mut indices = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        let cleaned = clean_header(header).to_lowercase();
        for (field, spellings) in USER_HEADER_RULES {
            if spellings.iter().any(|s| *s == cleaned) {
                indices.entry(field).or_insert(i);
            }
        }
    }
    indices
}

fn optional_text(row: &[Data], idx: Option<&usize>) -> Option<String> {
    let text = cell_to_text(row.get(*idx?)?);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Read the credential table from the first sheet of the users workbook.
pub fn read_users_workbook(path: &Path) -> Result<UsersOutcome> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .context("users workbook has no sheets")?
        .clone();
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet {}", sheet_name))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_text).collect(),
        None => Vec::new(),
    };
    let cols = map_user_columns(&headers);

    let mut out = UsersOutcome::default();
    for row in rows {
        let role = cols
            .get("role")
            .and_then(|i| row.get(*i))
            .map(cell_to_text)
            .and_then(|t| Role::parse(t.trim()));
        let name = optional_text(row, cols.get("name"));
        let credential = optional_text(row, cols.get("credential"));

        let (Some(role), Some(name), Some(credential)) = (role, name, credential) else {
            out.skipped_rows += 1;
            continue;
        };

        out.users.push(UserRecord {
            role,
            name,
            credential,
            school: optional_text(row, cols.get("school")),
            linked_teacher: optional_text(row, cols.get("teacher")),
            linked_student: optional_text(row, cols.get("student")),
        });
    }
    Ok(out)
}
