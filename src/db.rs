use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::normalize::ScoreRecord;

pub const DB_FILE: &str = "gradebook.sqlite3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Teacher,
    Assistant,
    Principal,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Assistant => "assistant",
            Role::Principal => "principal",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "parent" => Some(Role::Parent),
            "teacher" => Some(Role::Teacher),
            "assistant" => Some(Role::Assistant),
            "principal" => Some(Role::Principal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub role: Role,
    pub name: String,
    pub credential: String,
    pub school: Option<String>,
    pub linked_teacher: Option<String>,
    pub linked_student: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub seq: i64,
    pub sender: String,
    pub recipient: String,
    pub sender_role: Role,
    pub recipient_role: Role,
    pub body: String,
    pub sent_at: String,
    pub seen: bool,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            name TEXT NOT NULL,
            credential TEXT NOT NULL,
            school TEXT,
            linked_teacher TEXT,
            linked_student TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role_credential ON users(role, credential)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS score_rows(
            id TEXT PRIMARY KEY,
            teacher TEXT NOT NULL,
            student TEXT NOT NULL,
            lesson TEXT NOT NULL,
            week TEXT NOT NULL,
            score INTEGER NOT NULL,
            seq INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_score_rows_teacher ON score_rows(teacher)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_score_rows_teacher_seq ON score_rows(teacher, seq)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notes(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            sender TEXT NOT NULL,
            recipient TEXT NOT NULL,
            sender_role TEXT NOT NULL,
            recipient_role TEXT NOT NULL,
            body TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            seen INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notes_recipient ON notes(recipient, recipient_role)",
        [],
    )?;

    Ok(conn)
}

/// Replace the whole credential table. Runs inside one transaction so a failed
/// import never leaves the table half-written.
pub fn replace_users(conn: &mut Connection, users: &[UserRecord]) -> anyhow::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM users", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO users(id, role, name, credential, school, linked_teacher, linked_student)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for u in users {
            stmt.execute((
                Uuid::new_v4().to_string(),
                u.role.as_str(),
                &u.name,
                &u.credential,
                &u.school,
                &u.linked_teacher,
                &u.linked_student,
            ))?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let role_text: String = row.get(0)?;
    Ok(UserRecord {
        // Unknown role strings never reach the table; parse defensively anyway.
        role: Role::parse(&role_text).unwrap_or(Role::Parent),
        name: row.get(1)?,
        credential: row.get(2)?,
        school: row.get(3)?,
        linked_teacher: row.get(4)?,
        linked_student: row.get(5)?,
    })
}

/// Exact-equality credential lookup. When a malformed users file holds several
/// matching rows, the first imported one wins.
pub fn find_login(
    conn: &Connection,
    role: Role,
    credential: &str,
) -> anyhow::Result<Option<UserRecord>> {
    let user = conn
        .query_row(
            "SELECT role, name, credential, school, linked_teacher, linked_student
             FROM users
             WHERE role = ? AND credential = ?
             ORDER BY rowid
             LIMIT 1",
            (role.as_str(), credential),
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_user(conn: &Connection, role: Role, name: &str) -> anyhow::Result<Option<UserRecord>> {
    let user = conn
        .query_row(
            "SELECT role, name, credential, school, linked_teacher, linked_student
             FROM users
             WHERE role = ? AND name = ?
             ORDER BY rowid
             LIMIT 1",
            (role.as_str(), name),
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Replace-on-write for one teacher's tidy store. The delete+insert pair runs
/// under an immediate transaction, so a concurrent writer to the same key
/// either sees the old rows or the new rows, never a mix.
pub fn replace_teacher_scores(
    conn: &mut Connection,
    teacher: &str,
    records: &[ScoreRecord],
) -> anyhow::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM score_rows WHERE teacher = ?", [teacher])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO score_rows(id, teacher, student, lesson, week, score, seq)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (seq, r) in records.iter().enumerate() {
            stmt.execute((
                Uuid::new_v4().to_string(),
                teacher,
                &r.student,
                &r.lesson,
                &r.week,
                r.score,
                seq as i64,
            ))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Load one teacher's tidy store in its original normalizer order.
pub fn load_teacher_scores(conn: &Connection, teacher: &str) -> anyhow::Result<Vec<ScoreRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student, lesson, week, score
         FROM score_rows
         WHERE teacher = ?
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([teacher], |r| {
            Ok(ScoreRecord {
                student: r.get(0)?,
                lesson: r.get(1)?,
                week: r.get(2)?,
                score: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn append_note(
    conn: &Connection,
    sender: &str,
    sender_role: Role,
    recipient: &str,
    recipient_role: Role,
    body: &str,
    sent_at: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO notes(sender, recipient, sender_role, recipient_role, body, sent_at, seen)
         VALUES (?, ?, ?, ?, ?, ?, 0)",
        (
            sender,
            recipient,
            sender_role.as_str(),
            recipient_role.as_str(),
            body,
            sent_at,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn notes_for(
    conn: &Connection,
    recipient: &str,
    recipient_role: Role,
) -> anyhow::Result<Vec<NoteRecord>> {
    let mut stmt = conn.prepare(
        "SELECT seq, sender, recipient, sender_role, recipient_role, body, sent_at, seen
         FROM notes
         WHERE recipient = ? AND recipient_role = ?
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map((recipient, recipient_role.as_str()), |r| {
            let sender_role: String = r.get(3)?;
            let recipient_role: String = r.get(4)?;
            Ok(NoteRecord {
                seq: r.get(0)?,
                sender: r.get(1)?,
                recipient: r.get(2)?,
                sender_role: Role::parse(&sender_role).unwrap_or(Role::Teacher),
                recipient_role: Role::parse(&recipient_role).unwrap_or(Role::Parent),
                body: r.get(5)?,
                sent_at: r.get(6)?,
                seen: r.get::<_, i64>(7)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Idempotent seen-flag flip, restricted to the addressed recipient.
/// Returns false when no such note exists for that recipient.
pub fn mark_note_seen(
    conn: &Connection,
    seq: i64,
    recipient: &str,
    recipient_role: Role,
) -> anyhow::Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT seq FROM notes WHERE seq = ? AND recipient = ? AND recipient_role = ?",
            (seq, recipient, recipient_role.as_str()),
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }
    conn.execute("UPDATE notes SET seen = 1 WHERE seq = ?", [seq])?;
    Ok(true)
}
