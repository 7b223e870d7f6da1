pub mod backup;
pub mod core;
pub mod notes;
pub mod reports;
pub mod scores;
pub mod session;
pub mod views;

use rusqlite::Connection;

use crate::db::{self, Role};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request, Session};
use crate::normalize::ScoreRecord;

pub(crate) fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub(crate) fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub(crate) fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub(crate) fn require_session<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Session, serde_json::Value> {
    state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_session", "log in first", None))
}

/// What an authenticated identity may look at: one teacher's dataset, and for
/// parents a single visible student within it.
pub(crate) struct Scope {
    pub teacher: String,
    pub student_filter: Option<String>,
}

pub(crate) fn resolve_scope(
    conn: &Connection,
    session: &Session,
    req: &Request,
) -> Result<Scope, serde_json::Value> {
    match session.role {
        Role::Parent => {
            let Some(teacher) = session.linked_teacher.clone() else {
                return Err(err(
                    &req.id,
                    "not_found",
                    "parent account has no linked teacher",
                    None,
                ));
            };
            if let Some(requested) = optional_str(req, "teacher") {
                if requested != teacher {
                    return Err(err(
                        &req.id,
                        "forbidden",
                        "parents may only view their own student's data",
                        None,
                    ));
                }
            }
            Ok(Scope {
                teacher,
                student_filter: Some(session.parent_student()),
            })
        }
        Role::Teacher => {
            if let Some(requested) = optional_str(req, "teacher") {
                if requested != session.name {
                    return Err(err(
                        &req.id,
                        "forbidden",
                        "teachers may only view their own dataset",
                        None,
                    ));
                }
            }
            Ok(Scope {
                teacher: session.name.clone(),
                student_filter: None,
            })
        }
        Role::Assistant | Role::Principal => {
            let teacher = required_str(req, "teacher")?;
            let target = match db::find_user(conn, Role::Teacher, &teacher) {
                Ok(v) => v,
                Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
            };
            let Some(target) = target else {
                return Err(err(&req.id, "not_found", "teacher not found", None));
            };
            // School boundary: both sides must name the same school.
            match (&session.school, &target.school) {
                (Some(a), Some(b)) if a == b => {}
                _ => {
                    return Err(err(
                        &req.id,
                        "forbidden",
                        "teacher is outside your school",
                        None,
                    ));
                }
            }
            Ok(Scope {
                teacher,
                student_filter: None,
            })
        }
    }
}

/// Load the scoped teacher's tidy table; an empty store halts every aggregate
/// view with `no_usable_data`.
pub(crate) fn load_scoped_records(
    conn: &Connection,
    req: &Request,
    scope: &Scope,
) -> Result<Vec<ScoreRecord>, serde_json::Value> {
    let records = match db::load_teacher_scores(conn, &scope.teacher) {
        Ok(v) => v,
        Err(e) => return Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    };
    if records.is_empty() {
        return Err(err(
            &req.id,
            "no_usable_data",
            format!("no score data for teacher {}", scope.teacher),
            None,
        ));
    }
    Ok(records)
}
