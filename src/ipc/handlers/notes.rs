use serde_json::json;

use crate::db::{self, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

use super::{db_conn, require_session, required_str};

fn handle_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let recipient = match required_str(req, "recipient") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let recipient_role_text = match required_str(req, "recipientRole") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(recipient_role) = Role::parse(&recipient_role_text) else {
        return err(
            &req.id,
            "bad_params",
            "recipientRole must be one of: parent, teacher, assistant, principal",
            None,
        );
    };
    let body = match required_str(req, "body") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let body = body.trim();
    if body.is_empty() {
        return err(&req.id, "empty_note_body", "note body may not be empty", None);
    }

    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sent_at = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    match db::append_note(
        conn,
        &session.name,
        session.role,
        &recipient,
        recipient_role,
        body,
        &sent_at,
    ) {
        Ok(seq) => ok(&req.id, json!({ "seq": seq, "sentAt": sent_at })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_inbox(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::notes_for(conn, &session.name, session.role) {
        Ok(notes) => ok(&req.id, json!({ "notes": notes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_mark_seen(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(v) => v.clone(),
        Err(e) => return e,
    };
    let seq = match req.params.get("seq").and_then(|v| v.as_i64()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing seq", None),
    };
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Only the addressed recipient may flip the flag; the flip is idempotent.
    match db::mark_note_seen(conn, seq, &session.name, session.role) {
        Ok(true) => ok(&req.id, json!({ "seq": seq, "seen": true })),
        Ok(false) => err(&req.id, "not_found", "no such note in your inbox", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notes.send" => Some(handle_send(state, req)),
        "notes.inbox" => Some(handle_inbox(state, req)),
        "notes.markSeen" => Some(handle_mark_seen(state, req)),
        _ => None,
    }
}
