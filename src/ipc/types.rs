use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::schema::SchemaRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub schema: &'static SchemaRegistry,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new(schema: &'static SchemaRegistry) -> Self {
        AppState {
            schema,
            workspace: None,
            db: None,
        }
    }
}
