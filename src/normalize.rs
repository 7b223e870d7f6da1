use calamine::Data;
use serde::{Deserialize, Serialize};

/// One tidy observation: a single (student, lesson, week) score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub student: String,
    pub lesson: String,
    pub week: String,
    pub score: i64,
}

/// One source sheet in its uploaded wide shape: a header row plus one row per
/// student, one column per week.
#[derive(Debug, Clone)]
pub struct WideTable {
    pub lesson: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<ScoreRecord>,
    /// Lesson names of sheets without a recognizable student-name column.
    pub skipped_sheets: Vec<String>,
    /// Rows lost to missing student names or non-numeric scores.
    pub dropped_rows: usize,
}

/// Accepted spellings of the student-name column, compared after cleanup.
const STUDENT_NAME_HEADERS: [&str; 2] = ["student name", "student"];

/// Ordinal-word rules mapping week headers onto the four canonical buckets.
/// Evaluated in order; the first hit wins.
const WEEK_RULES: [(&str, &str); 4] = [
    ("first", "week 1"),
    ("second", "week 2"),
    ("third", "week 3"),
    ("fourth", "week 4"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderTarget {
    StudentName,
    /// A canonical week bucket.
    Week(String),
    /// Melted under its own cleaned label.
    Unmapped(String),
}

/// Strip stray invisible characters that sneak into exported headers: zero
/// width non-joiners and non-breaking spaces become plain spaces, then the
/// header is trimmed.
pub fn clean_header(raw: &str) -> String {
    raw.replace('\u{200c}', " ")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

pub fn resolve_header(raw: &str) -> HeaderTarget {
    let cleaned = clean_header(raw);
    let lowered = cleaned.to_lowercase();

    if STUDENT_NAME_HEADERS
        .iter()
        .any(|h| lowered.eq_ignore_ascii_case(h))
    {
        return HeaderTarget::StudentName;
    }
    if lowered.contains("week") {
        for (ordinal, canonical) in WEEK_RULES {
            if lowered.contains(ordinal) {
                return HeaderTarget::Week(canonical.to_string());
            }
        }
    }
    HeaderTarget::Unmapped(cleaned)
}

fn cell_to_name(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Numeric coercion for a score cell. Fractions truncate toward zero after a
/// successful parse; anything non-numeric is rejected.
fn cell_to_score(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::Bool(b) => Some(i64::from(*b)),
        Data::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Wide-to-long melt of every source table into one tidy run.
///
/// Column order follows the source header order and row order follows the
/// source row order, so repeated runs over the same workbook produce the same
/// record sequence.
pub fn normalize_tables(tables: &[WideTable]) -> NormalizeOutcome {
    let mut out = NormalizeOutcome::default();

    for table in tables {
        let mut student_col: Option<usize> = None;
        let mut value_cols: Vec<(usize, String)> = Vec::new();

        for (idx, header) in table.headers.iter().enumerate() {
            match resolve_header(header) {
                HeaderTarget::StudentName => {
                    if student_col.is_none() {
                        student_col = Some(idx);
                    }
                }
                HeaderTarget::Week(label) => value_cols.push((idx, label)),
                HeaderTarget::Unmapped(label) => value_cols.push((idx, label)),
            }
        }

        let Some(student_col) = student_col else {
            tracing::warn!(sheet = %table.lesson, "no student-name column, sheet skipped");
            out.skipped_sheets.push(table.lesson.clone());
            continue;
        };

        for (col, week_label) in &value_cols {
            for row in &table.rows {
                let Some(student) = row.get(student_col).and_then(cell_to_name) else {
                    out.dropped_rows += 1;
                    continue;
                };
                let Some(score) = row.get(*col).and_then(cell_to_score) else {
                    out.dropped_rows += 1;
                    continue;
                };
                out.records.push(ScoreRecord {
                    student,
                    lesson: table.lesson.clone(),
                    week: week_label.clone(),
                    score,
                });
            }
        }
    }

    out
}
