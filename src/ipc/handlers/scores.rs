use serde_json::json;
use std::path::PathBuf;

use crate::calc;
use crate::db::{self, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::normalize;
use crate::workbook;

use super::{db_conn, load_scoped_records, optional_str, require_session, required_str, resolve_scope};

/// One workbook upload: parse every sheet, melt to the tidy shape, and
/// replace this teacher's store. An upload that yields nothing leaves the
/// existing store untouched.
fn handle_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher = {
        let session = match require_session(state, req) {
            Ok(v) => v,
            Err(e) => return e,
        };
        if session.role != Role::Teacher {
            return err(
                &req.id,
                "forbidden",
                "only teachers may upload score tables",
                None,
            );
        }
        session.name.clone()
    };

    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if !path.exists() {
        return err(
            &req.id,
            "missing_input_file",
            format!("score file not found: {}", path.to_string_lossy()),
            None,
        );
    }

    let tables = match workbook::read_score_workbook(&path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "io_failed", e.to_string(), None),
    };
    let outcome = normalize::normalize_tables(&tables);
    if outcome.records.is_empty() {
        return err(
            &req.id,
            "no_usable_data",
            "no usable score rows in any sheet",
            Some(json!({ "skippedSheets": outcome.skipped_sheets })),
        );
    }

    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::replace_teacher_scores(conn, &teacher, &outcome.records) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(
        teacher = %teacher,
        imported = outcome.records.len(),
        dropped = outcome.dropped_rows,
        skipped_sheets = outcome.skipped_sheets.len(),
        "score store replaced"
    );
    ok(
        &req.id,
        json!({
            "teacher": teacher,
            "imported": outcome.records.len(),
            "droppedRows": outcome.dropped_rows,
            "skippedSheets": outcome.skipped_sheets,
        }),
    )
}

fn handle_lessons(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scope = match resolve_scope(conn, &session, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records = match load_scoped_records(conn, req, &scope) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let lessons = match &scope.student_filter {
        Some(student) => {
            let own: Vec<_> = records
                .iter()
                .filter(|r| &r.student == student)
                .cloned()
                .collect();
            calc::lessons(&own)
        }
        None => calc::lessons(&records),
    };
    ok(&req.id, json!({ "teacher": scope.teacher, "lessons": lessons }))
}

fn handle_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scope = match resolve_scope(conn, &session, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records = match load_scoped_records(conn, req, &scope) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let students = match &scope.student_filter {
        Some(student) => vec![student.clone()],
        None => {
            let lesson = optional_str(req, "lesson");
            calc::students(&records, lesson.as_deref())
        }
    };
    ok(
        &req.id,
        json!({ "teacher": scope.teacher, "students": students }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.upload" => Some(handle_upload(state, req)),
        "scores.lessons" => Some(handle_lessons(state, req)),
        "scores.students" => Some(handle_students(state, req)),
        _ => None,
    }
}
