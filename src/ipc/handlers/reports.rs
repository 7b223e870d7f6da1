use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, ReportCardLine};

use super::{db_conn, load_scoped_records, require_session, resolve_scope};

/// Render the downloadable report-card PDF for one student.
fn handle_report_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
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
    let student = match super::views::resolve_card_student(req, &scope) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let lines: Vec<ReportCardLine> = calc::student_report_card(&records, &student)
        .into_iter()
        .map(|row| ReportCardLine {
            class_average: calc::lesson_mean(&records, &row.lesson),
            lesson: row.lesson,
            average: row.average,
            status: row.status,
        })
        .collect();
    let student_records: Vec<_> = records
        .iter()
        .filter(|r| r.student == student)
        .cloned()
        .collect();

    match report::render_report_card(&workspace, &student, &lines, &student_records) {
        Ok(summary) => {
            tracing::info!(
                student = %student,
                path = %summary.path.to_string_lossy(),
                "report card rendered"
            );
            ok(
                &req.id,
                json!({
                    "student": student,
                    "path": summary.path.to_string_lossy(),
                    "lessons": summary.lessons,
                    "charts": summary.charts,
                }),
            )
        }
        Err(e) => err(&req.id, "render_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.reportCard" => Some(handle_report_card(state, req)),
        _ => None,
    }
}
