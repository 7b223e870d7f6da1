use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::normalize::ScoreRecord;

use super::{db_conn, load_scoped_records, optional_str, require_session, required_str, resolve_scope, Scope};

fn lesson_exists(records: &[ScoreRecord], lesson: &str) -> bool {
    records.iter().any(|r| r.lesson == lesson)
}

/// A parent may look at a lesson only when their student has records in it.
fn check_lesson_access(
    req: &Request,
    scope: &Scope,
    records: &[ScoreRecord],
    lesson: &str,
) -> Result<(), serde_json::Value> {
    if !lesson_exists(records, lesson) {
        return Err(err(&req.id, "not_found", "lesson not found", None));
    }
    if let Some(student) = &scope.student_filter {
        let has = records
            .iter()
            .any(|r| &r.student == student && r.lesson == lesson);
        if !has {
            return Err(err(
                &req.id,
                "forbidden",
                "lesson not available for your student",
                None,
            ));
        }
    }
    Ok(())
}

fn scoped_records(
    state: &AppState,
    req: &Request,
) -> Result<(Scope, Vec<ScoreRecord>), serde_json::Value> {
    let session = require_session(state, req)?.clone();
    let conn = db_conn(state, req)?;
    let scope = resolve_scope(conn, &session, req)?;
    let records = load_scoped_records(conn, req, &scope)?;
    Ok((scope, records))
}

fn handle_lesson_breakdown(state: &mut AppState, req: &Request) -> serde_json::Value {
    let lesson = match required_str(req, "lesson") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (scope, records) = match scoped_records(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = check_lesson_access(req, &scope, &records, &lesson) {
        return e;
    }
    ok(&req.id, json!(calc::lesson_quality_breakdown(&records, &lesson)))
}

fn handle_lesson_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let lesson = match required_str(req, "lesson") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (scope, records) = match scoped_records(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = check_lesson_access(req, &scope, &records, &lesson) {
        return e;
    }

    let mut ranking = calc::lesson_ranking(&records, &lesson);
    if let Some(student) = &scope.student_filter {
        ranking.retain(|r| &r.student == student);
    }
    ok(&req.id, json!({ "lesson": lesson, "ranking": ranking }))
}

fn handle_overall_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (scope, records) = match scoped_records(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut ranking = calc::overall_ranking(&records);
    if let Some(student) = &scope.student_filter {
        ranking.retain(|r| &r.student == student);
    }
    ok(&req.id, json!({ "ranking": ranking }))
}

fn handle_report_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (scope, records) = match scoped_records(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = match resolve_card_student(req, &scope) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = calc::student_report_card(&records, &student);
    ok(&req.id, json!({ "student": student, "rows": rows }))
}

/// Parents get their own student implicitly; other roles name one.
pub(super) fn resolve_card_student(
    req: &Request,
    scope: &Scope,
) -> Result<String, serde_json::Value> {
    match &scope.student_filter {
        Some(own) => {
            if let Some(requested) = optional_str(req, "student") {
                if &requested != own {
                    return Err(err(
                        &req.id,
                        "forbidden",
                        "parents may only view their own student's report card",
                        None,
                    ));
                }
            }
            Ok(own.clone())
        }
        None => required_str(req, "student"),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "views.lessonBreakdown" => Some(handle_lesson_breakdown(state, req)),
        "views.lessonRanking" => Some(handle_lesson_ranking(state, req)),
        "views.overallRanking" => Some(handle_overall_ranking(state, req)),
        "views.reportCard" => Some(handle_report_card(state, req)),
        _ => None,
    }
}
