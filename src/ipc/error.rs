use serde_json::json;

use crate::registration::RegisterError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Error envelope whose message is a list, for per-field violations.
pub fn err_messages(id: &str, code: &str, messages: &[String]) -> serde_json::Value {
    json!({
        "id": id,
        "ok": false,
        "error": {
            "code": code,
            "message": messages,
        },
    })
}

/// Map a registration failure onto the wire taxonomy: payload shape and
/// duplicate checks are `bad_request`, per-field messages are
/// `validation_failed`, store constraint rejections are
/// `constraint_violation`, and anything else from the store stays a
/// detail-free `internal_error`.
pub fn register_error_response(id: &str, e: &RegisterError) -> serde_json::Value {
    match e {
        RegisterError::Invalid(msg) => err(id, "bad_request", msg.clone(), None),
        RegisterError::RowValidation(msgs) => err_messages(id, "validation_failed", msgs),
        RegisterError::Db(db_err) => {
            if is_constraint_violation(db_err) {
                err_messages(id, "constraint_violation", &[db_err.to_string()])
            } else {
                err(id, "internal_error", "Internal Server Error", None)
            }
        }
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
