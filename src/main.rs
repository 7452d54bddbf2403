mod db;
mod ipc;
mod registration;
mod report;
mod schema;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout is the protocol channel; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ROSTERD_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut state = ipc::AppState::new(&schema::REGISTRY);

    if let Ok(path) = std::env::var("ROSTERD_WORKSPACE") {
        let path = PathBuf::from(path);
        match db::open_db(&path, state.schema) {
            Ok(conn) => {
                tracing::info!(path = %path.display(), "workspace opened from environment");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open ROSTERD_WORKSPACE");
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't address a reply without an id.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "malformed_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
