use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::db::Role;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The authenticated identity. Carried explicitly on the state and consulted
/// by every scoped handler; there is no global current-user.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    pub name: String,
    pub school: Option<String>,
    pub linked_teacher: Option<String>,
    pub linked_student: Option<String>,
}

impl Session {
    /// The one student a parent account may see. Parent accounts without an
    /// explicit link are named after the child.
    pub fn parent_student(&self) -> String {
        self.linked_student
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}
