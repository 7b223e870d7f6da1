mod support;

use serde_json::json;
use support::{write_users_xlsx, write_xlsx, Cell, Daemon};

/// The full parent flow: gate, scoped views, and the rendered artifact.
#[test]
fn parent_login_views_and_downloads_the_report_card() {
    let dir = tempfile::tempdir().expect("tempdir");
    let users = dir.path().join("users.xlsx");
    write_users_xlsx(
        &users,
        &[
            ["parent", "Parent A", "pw1", "North", "Teacher X", "Student1"],
            ["teacher", "Teacher X", "pw2", "North", "", ""],
        ],
    );

    let mut d = Daemon::spawn();
    d.select_workspace(dir.path());
    d.ok("users.import", json!({ "path": users.to_string_lossy() }));

    // Before any upload the parent has no data to look at.
    d.login("parent", "pw1");
    assert_eq!(d.err_code("scores.lessons", json!({})), "no_usable_data");

    // The parent's credential under the teacher role is rejected.
    assert_eq!(
        d.err_code(
            "session.login",
            json!({ "role": "teacher", "credential": "pw1" })
        ),
        "invalid_credential"
    );

    d.login("teacher", "pw2");
    let scores = dir.path().join("scores.xlsx");
    write_xlsx(
        &scores,
        &[(
            "Math",
            vec![
                vec![
                    Cell::S("Student Name"),
                    Cell::S("first week"),
                    Cell::S("second week"),
                ],
                vec![Cell::S("Student1"), Cell::N(3.0), Cell::N(4.0)],
            ],
        )],
    );
    d.ok("scores.upload", json!({ "path": scores.to_string_lossy() }));

    d.login("parent", "pw1");
    let lessons = d.ok("scores.lessons", json!({}));
    assert_eq!(lessons.get("lessons"), Some(&json!(["Math"])));

    // The card shows Math with the 3.5 average, statused by the documented
    // rounding rule (half away from zero → very good).
    let card = d.ok("views.reportCard", json!({}));
    assert_eq!(
        card.get("student").and_then(|v| v.as_str()),
        Some("Student1")
    );
    let rows = card.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("lesson"), Some(&json!("Math")));
    assert_eq!(rows[0].get("average").and_then(|v| v.as_f64()), Some(3.5));
    assert_eq!(rows[0].get("status"), Some(&json!("very_good")));

    // Rankings reach the parent filtered to their own student.
    let ranking = d.ok("views.lessonRanking", json!({ "lesson": "Math" }));
    let rank_rows = ranking
        .get("ranking")
        .and_then(|v| v.as_array())
        .expect("ranking");
    assert_eq!(rank_rows.len(), 1);
    assert_eq!(rank_rows[0].get("student"), Some(&json!("Student1")));

    assert_eq!(
        d.err_code("views.reportCard", json!({ "student": "Other Kid" })),
        "forbidden"
    );

    // The artifact lands under reports/ with a name derived from the student.
    let rendered = d.ok("reports.reportCard", json!({}));
    let path = rendered
        .get("path")
        .and_then(|v| v.as_str())
        .expect("path")
        .to_string();
    assert!(path.ends_with("report_card_Student1.pdf"), "path: {}", path);
    assert_eq!(rendered.get("lessons").and_then(|v| v.as_u64()), Some(1));

    let bytes = std::fs::read(&path).expect("read pdf");
    assert!(bytes.starts_with(b"%PDF"), "not a pdf header");
    assert!(bytes.len() > 500);

    // Rendering again is deterministic in name and simply overwrites.
    let again = d.ok("reports.reportCard", json!({}));
    assert_eq!(again.get("path").and_then(|v| v.as_str()), Some(path.as_str()));
}

/// A student with no rows still gets a minimal document, never an error.
#[test]
fn empty_report_card_renders_a_minimal_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let users = dir.path().join("users.xlsx");
    write_users_xlsx(&users, &[["teacher", "Teacher X", "pw2", "North", "", ""]]);

    let mut d = Daemon::spawn();
    d.select_workspace(dir.path());
    d.ok("users.import", json!({ "path": users.to_string_lossy() }));
    d.login("teacher", "pw2");

    let scores = dir.path().join("scores.xlsx");
    write_xlsx(
        &scores,
        &[(
            "Math",
            vec![
                vec![Cell::S("student"), Cell::S("first week")],
                vec![Cell::S("Someone Else"), Cell::N(3.0)],
            ],
        )],
    );
    d.ok("scores.upload", json!({ "path": scores.to_string_lossy() }));

    let rendered = d.ok("reports.reportCard", json!({ "student": "Ghost" }));
    assert_eq!(rendered.get("lessons").and_then(|v| v.as_u64()), Some(0));
    let path = rendered
        .get("path")
        .and_then(|v| v.as_str())
        .expect("path")
        .to_string();
    let bytes = std::fs::read(&path).expect("read pdf");
    assert!(bytes.starts_with(b"%PDF"));
}
