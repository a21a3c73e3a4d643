mod calc;
mod config;
mod course;
mod db;
mod eligibility;
mod error;
mod ipc;
mod ledger;
mod roster;
mod telemetry;
#[cfg(test)]
mod test_support;

use std::io::{self, BufRead, Write};

fn main() {
    if let Err(e) = run() {
        eprintln!("attendanced fatal: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let settings = config::Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let mut state = ipc::AppState::default();
    if let Some(path) = settings.workspace() {
        state.open_workspace(path)?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "attendanced started");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => ipc::bad_json(e.to_string()),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("attendanced stopped");
    Ok(())
}
