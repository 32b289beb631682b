//! Best-effort memory snapshot hook reachable from a session.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::error::SnapshotError;

/// Something able to write a memory snapshot of the current process.
pub trait SnapshotProvider: Send + Sync {
    /// Write a snapshot to `target` and return the path actually written.
    fn write_snapshot(&self, target: &Path) -> Result<PathBuf, SnapshotError>;
}

/// The optional debug capabilities handed to every session.
#[derive(Clone, Default)]
pub struct DebugHooks {
    snapshot: Option<Arc<dyn SnapshotProvider>>,
}

impl std::fmt::Debug for DebugHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugHooks")
            .field("snapshot", &self.snapshot.is_some())
            .finish()
    }
}

impl DebugHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshot = Some(provider);
        self
    }

    /// Write a heap snapshot to `target`, or next to the endpoint socket
    /// under a timestamped name when no target is given.
    pub fn heap_snapshot(
        &self,
        target: Option<&Path>,
        endpoint_path: &Path,
    ) -> Result<PathBuf, SnapshotError> {
        let provider = self
            .snapshot
            .as_ref()
            .ok_or(SnapshotError::ProviderUnavailable)?;
        let target = match target {
            Some(path) => path.to_path_buf(),
            None => default_snapshot_path(endpoint_path),
        };
        let written = provider.write_snapshot(&target)?;
        info!(path = %written.display(), "heap snapshot written");
        Ok(written)
    }
}

pub fn default_snapshot_path(endpoint_path: &Path) -> PathBuf {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut name = endpoint_path.as_os_str().to_os_string();
    name.push(format!("-{stamp}"));
    PathBuf::from(name)
}

/// Snapshot provider backed by `/proc/self`: records the process status
/// and memory rollup. Linux only; elsewhere every call fails cleanly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcSnapshotProvider;

const PROC_SOURCES: [&str; 2] = ["/proc/self/status", "/proc/self/smaps_rollup"];

impl SnapshotProvider for ProcSnapshotProvider {
    fn write_snapshot(&self, target: &Path) -> Result<PathBuf, SnapshotError> {
        let mut out = String::new();
        let mut sections = 0;

        for source in PROC_SOURCES {
            let Ok(contents) = std::fs::read_to_string(source) else {
                continue;
            };
            let _ = writeln!(out, "== {source}");
            out.push_str(&contents);
            if !contents.ends_with('\n') {
                out.push('\n');
            }
            sections += 1;
        }

        if sections == 0 {
            return Err(SnapshotError::Provider(
                "/proc/self is not available on this platform".to_string(),
            ));
        }

        std::fs::write(target, out).map_err(|source| SnapshotError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        Ok(target.to_path_buf())
    }
}
