use serde_json::json;
use tracing::error;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;

fn handle_workload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match report::workload_report(conn) {
        Ok(rows) => {
            // Keyed on teacher name, as documented; a repeated name keeps
            // the last teacher's workload.
            let mut map = serde_json::Map::new();
            for (teacher, entries) in rows {
                map.insert(teacher, json!(entries));
            }
            ok(&req.id, json!({ "report": map }))
        }
        Err(e) => {
            error!(error = %e, "workload report failed");
            err(&req.id, "internal_error", "Internal Server Error", None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.workload" => Some(handle_workload(state, req)),
        _ => None,
    }
}
