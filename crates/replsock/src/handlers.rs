use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::thread;

use replsock_common::is_socket;
use replsock_ipc::{ClientError, Endpoint, EndpointClient, Liveness, probe_endpoint};
use replsock_server::{Repl, ReplConfig, reclaim_stale_endpoints};
use serde::Serialize;
use tracing::debug;

use crate::commands::OutputFormat;
use crate::demo;

pub type HandlerResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Serialize)]
struct EndpointStatus {
    name: String,
    path: PathBuf,
    status: &'static str,
}

pub fn handle_attach(config: &ReplConfig, name: &str) -> HandlerResult {
    let endpoint = Endpoint::resolve(&config.base_dir(), name, config.socket_mode)
        .map_err(ClientError::from)?;
    let client = EndpointClient::connect(&endpoint.path)?;
    debug!(endpoint = name, path = %client.path().display(), "attached");
    client.attach(io::stdin(), io::stdout())?;
    Ok(())
}

pub fn handle_list(config: &ReplConfig, format: OutputFormat) -> HandlerResult {
    let statuses = scan(config)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        OutputFormat::Text => {
            if statuses.is_empty() {
                println!("No endpoints in {}", config.base_dir().display());
            }
            for status in &statuses {
                println!("{:<24} {:<8} {}", status.name, status.status, status.path.display());
            }
        }
    }
    Ok(())
}

fn scan(config: &ReplConfig) -> io::Result<Vec<EndpointStatus>> {
    let base_dir = config.base_dir();
    let entries = match std::fs::read_dir(&base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut statuses = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !is_socket(&path) {
            continue;
        }
        let status = match probe_endpoint(&path) {
            Liveness::Live => "live",
            Liveness::Stale => "stale",
            Liveness::Unknown(_) => "unknown",
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        statuses.push(EndpointStatus { name, path, status });
    }
    statuses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(statuses)
}

pub fn handle_clean(config: &ReplConfig, format: OutputFormat) -> HandlerResult {
    let base_dir = config.base_dir();
    let report = reclaim_stale_endpoints(&base_dir, None)?;

    match format {
        OutputFormat::Json => {
            let skipped: Vec<_> = report
                .skipped
                .iter()
                .map(|(path, reason)| serde_json::json!({ "path": path, "reason": reason }))
                .collect();
            let out = serde_json::json!({
                "removed": report.removed,
                "live": report.live,
                "skipped": skipped,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            for path in &report.removed {
                println!("removed {}", path.display());
            }
            for (path, reason) in &report.skipped {
                println!("skipped {} ({})", path.display(), reason);
            }
            println!(
                "{} removed, {} live, {} skipped",
                report.removed.len(),
                report.live.len(),
                report.skipped.len()
            );
        }
    }
    Ok(())
}

/// Serve until SIGINT or SIGHUP; the shutdown handlers unlink the socket
/// and exit.
pub fn handle_demo(config: ReplConfig, name: &str) -> HandlerResult {
    std::fs::create_dir_all(config.base_dir())?;
    let repl = Repl::new(config);
    let Some(handle) = repl.start(name, demo::evaluate)? else {
        println!("REPL disabled, nothing to serve");
        return Ok(());
    };

    println!("Serving '{}' at {}", handle.name(), handle.path().display());
    println!("Attach with: replsock attach {}", handle.name());

    loop {
        thread::park();
    }
}
