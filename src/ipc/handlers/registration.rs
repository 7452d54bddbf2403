use serde_json::json;
use tracing::error;

use crate::ipc::error::{err, ok, register_error_response};
use crate::ipc::types::{AppState, Request};
use crate::registration;

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let body_is_empty = req
        .params
        .as_object()
        .map(|o| o.is_empty())
        .unwrap_or(true);
    if body_is_empty {
        return err(&req.id, "bad_request", "Request body cannot be empty!", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    match registration::register(&tx, state.schema, &req.params) {
        Ok(()) => match tx.commit() {
            Ok(()) => ok(&req.id, json!({})),
            Err(e) => err(&req.id, "db_commit_failed", e.to_string(), None),
        },
        Err(e) => {
            // No partial commit: the whole registration rolls back on any
            // step's failure.
            let _ = tx.rollback();
            error!(error = %e, "registration failed");
            register_error_response(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "register" => Some(handle_register(state, req)),
        _ => None,
    }
}
