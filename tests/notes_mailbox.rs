mod support;

use serde_json::json;
use support::{write_users_xlsx, Daemon};

fn setup(dir: &std::path::Path) -> Daemon {
    let users = dir.join("users.xlsx");
    write_users_xlsx(
        &users,
        &[
            ["teacher", "Teacher X", "tx1", "North", "", ""],
            ["parent", "Parent A", "pw1", "North", "Teacher X", "Student1"],
        ],
    );
    let mut d = Daemon::spawn();
    d.select_workspace(dir);
    d.ok("users.import", json!({ "path": users.to_string_lossy() }));
    d
}

#[test]
fn send_read_and_mark_seen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut d = setup(dir.path());

    assert_eq!(
        d.err_code(
            "notes.send",
            json!({ "recipient": "Parent A", "recipientRole": "parent", "body": "hi" })
        ),
        "no_session"
    );

    d.login("teacher", "tx1");

    // Whitespace-only bodies are rejected before anything is written.
    assert_eq!(
        d.err_code(
            "notes.send",
            json!({ "recipient": "Parent A", "recipientRole": "parent", "body": "   " })
        ),
        "empty_note_body"
    );

    let sent = d.ok(
        "notes.send",
        json!({
            "recipient": "Parent A",
            "recipientRole": "parent",
            "body": "  Please check this week's homework.  "
        }),
    );
    let seq = sent.get("seq").and_then(|v| v.as_i64()).expect("seq");

    // The sender's own inbox stays empty; addressing is recipient+role.
    let own = d.ok("notes.inbox", json!({}));
    assert_eq!(own.get("notes"), Some(&json!([])));

    // Only the addressed recipient may flip the flag.
    assert_eq!(
        d.err_code("notes.markSeen", json!({ "seq": seq })),
        "not_found"
    );

    d.login("parent", "pw1");
    let inbox = d.ok("notes.inbox", json!({}));
    let notes = inbox.get("notes").and_then(|v| v.as_array()).expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].get("sender"), Some(&json!("Teacher X")));
    assert_eq!(notes[0].get("senderRole"), Some(&json!("teacher")));
    assert_eq!(
        notes[0].get("body"),
        Some(&json!("Please check this week's homework."))
    );
    assert_eq!(notes[0].get("seen"), Some(&json!(false)));

    // Marking seen is an idempotent false→true flip.
    d.ok("notes.markSeen", json!({ "seq": seq }));
    d.ok("notes.markSeen", json!({ "seq": seq }));
    let inbox = d.ok("notes.inbox", json!({}));
    let notes = inbox.get("notes").and_then(|v| v.as_array()).expect("notes");
    assert_eq!(notes[0].get("seen"), Some(&json!(true)));
}

#[test]
fn notes_append_in_order_and_are_never_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut d = setup(dir.path());

    d.login("teacher", "tx1");
    for body in ["first", "second", "third"] {
        d.ok(
            "notes.send",
            json!({ "recipient": "Parent A", "recipientRole": "parent", "body": body }),
        );
    }

    d.login("parent", "pw1");
    let inbox = d.ok("notes.inbox", json!({}));
    let bodies: Vec<&str> = inbox
        .get("notes")
        .and_then(|v| v.as_array())
        .expect("notes")
        .iter()
        .map(|n| n.get("body").and_then(|v| v.as_str()).expect("body"))
        .collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
}
