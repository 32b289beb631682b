//! Removal of socket files orphaned by a previous process.

use std::io;
use std::path::{Path, PathBuf};

use replsock_common::{is_socket, remove_socket_file};
use replsock_ipc::{Liveness, probe_endpoint};
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

#[derive(Debug, Default)]
pub struct ReclaimReport {
    /// Orphaned sockets that were unlinked.
    pub removed: Vec<PathBuf>,
    /// Sockets with a listener behind them; left alone.
    pub live: Vec<PathBuf>,
    /// Sockets whose state could not be determined; left alone.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Probe every socket entry directly under `base_dir` and unlink the ones
/// nobody is listening on.
///
/// Endpoints that `registry` says this process is serving are counted as
/// live without probing. Non-socket entries are never touched. A missing
/// directory yields an empty report.
pub fn reclaim_stale_endpoints(
    base_dir: &Path,
    registry: Option<&ConnectionRegistry>,
) -> io::Result<ReclaimReport> {
    let mut report = ReclaimReport::default();

    let entries = match std::fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %base_dir.display(), error = %e, "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();

        if !is_socket(&path) {
            continue;
        }

        if registry.is_some_and(|r| r.has_endpoint(&path)) {
            report.live.push(path);
            continue;
        }

        match probe_endpoint(&path) {
            Liveness::Live => {
                debug!(path = %path.display(), "socket is in use, keeping it");
                report.live.push(path);
            }
            Liveness::Stale => match remove_socket_file(&path) {
                Ok(_) => {
                    info!(path = %path.display(), "removed stale REPL socket");
                    report.removed.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove stale socket");
                    report.skipped.push((path, e.to_string()));
                }
            },
            Liveness::Unknown(e) => {
                warn!(path = %path.display(), error = %e, "could not probe socket, leaving it");
                report.skipped.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}
