use serde_json::json;
use std::path::PathBuf;

use crate::db::{self, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, Session};
use crate::workbook;

use super::required_str;

fn handle_users_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if !path.exists() {
        return err(
            &req.id,
            "missing_input_file",
            format!("users file not found: {}", path.to_string_lossy()),
            None,
        );
    }

    let outcome = match workbook::read_users_workbook(&path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "io_failed", e.to_string(), None),
    };
    if outcome.users.is_empty() {
        return err(
            &req.id,
            "no_usable_data",
            "users table holds no usable rows",
            None,
        );
    }

    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::replace_users(conn, &outcome.users) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }
    // Credentials changed under whoever was logged in.
    state.session = None;

    tracing::info!(
        imported = outcome.users.len(),
        skipped = outcome.skipped_rows,
        "users table replaced"
    );
    ok(
        &req.id,
        json!({
            "imported": outcome.users.len(),
            "skippedRows": outcome.skipped_rows,
        }),
    )
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role_text = match required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let credential = match required_str(req, "credential") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(role) = Role::parse(&role_text) else {
        return err(
            &req.id,
            "bad_params",
            "role must be one of: parent, teacher, assistant, principal",
            None,
        );
    };

    let found = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        match db::find_login(conn, role, &credential) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    };

    match found {
        Some(user) => {
            let session = Session {
                role: user.role,
                name: user.name.clone(),
                school: user.school.clone(),
                linked_teacher: user.linked_teacher.clone(),
                linked_student: user.linked_student.clone(),
            };
            let result = json!({
                "name": session.name,
                "role": session.role,
                "school": session.school,
                "linkedStudent": match session.role {
                    Role::Parent => Some(session.parent_student()),
                    _ => None,
                },
            });
            state.session = Some(session);
            ok(&req.id, result)
        }
        None => {
            // Stay unauthenticated; the caller may retry.
            state.session = None;
            tracing::warn!(role = role.as_str(), "login rejected");
            err(
                &req.id,
                "invalid_credential",
                "credential or role is incorrect",
                None,
            )
        }
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session = None;
    ok(&req.id, json!({}))
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(
            &req.id,
            json!({
                "name": s.name,
                "role": s.role,
                "school": s.school,
            }),
        ),
        None => ok(&req.id, json!(null)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.import" => Some(handle_users_import(state, req)),
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.current" => Some(handle_current(state, req)),
        _ => None,
    }
}
