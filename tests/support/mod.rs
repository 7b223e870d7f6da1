#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub enum Cell {
    S(&'static str),
    N(f64),
}

/// Write one workbook; each entry is (sheet name, rows), the first row being
/// the header row.
pub fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<Cell>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(*name).expect("sheet name");
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::S(s) => {
                        ws.write_string(r as u32, c as u16, *s).expect("write cell");
                    }
                    Cell::N(v) => {
                        ws.write_number(r as u32, c as u16, *v).expect("write cell");
                    }
                }
            }
        }
    }
    workbook.save(path).expect("save workbook");
}

/// Standard users table: role, name, credential, school, linked teacher,
/// linked student.
pub fn write_users_xlsx(path: &Path, rows: &[[&'static str; 6]]) {
    let mut all: Vec<Vec<Cell>> = vec![vec![
        Cell::S("Role"),
        Cell::S("Name"),
        Cell::S("Credential"),
        Cell::S("School"),
        Cell::S("Linked Teacher"),
        Cell::S("Linked Student"),
    ]];
    for row in rows {
        all.push(row.iter().map(|s| Cell::S(s)).collect());
    }
    write_xlsx(path, &[("users", all)]);
}

pub struct Daemon {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Daemon {
    pub fn spawn() -> Daemon {
        let exe = env!("CARGO_BIN_EXE_gradebookd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn gradebookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Daemon {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 1,
        }
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.next_id.to_string();
        self.next_id += 1;
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    /// Request that must succeed; returns the result payload.
    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "expected ok for {}: {}",
            method,
            resp
        );
        resp.get("result").cloned().unwrap_or(json!(null))
    }

    /// Request that must fail; returns the error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "expected error for {}: {}",
            method,
            resp
        );
        resp.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string()
    }

    pub fn select_workspace(&mut self, workspace: &Path) {
        self.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
    }

    pub fn login(&mut self, role: &str, credential: &str) -> serde_json::Value {
        self.ok(
            "session.login",
            json!({ "role": role, "credential": credential }),
        )
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
