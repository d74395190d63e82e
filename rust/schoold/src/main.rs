mod calc;
mod config;
mod db;
mod engine;
mod error;
mod ipc;
mod model;
mod sections;
mod store;

use std::io::{self, BufRead, Write};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // stdout carries the IPC protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_env(config::ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    init_tracing();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        section_capacity = config.sections.capacity,
        "schoold starting"
    );

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            error!(workspace = %path.display(), "could not open workspace: {e:#}");
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
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
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
    info!("stdin closed, exiting");
}
