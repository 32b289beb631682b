//! Platforms without Unix domain sockets: every endpoint is unavailable,
//! the host keeps running.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::config::ReplConfig;
use crate::crash::CrashReporter;
use crate::error::{ReplError, SnapshotError};
use crate::eval::Evaluator;
use crate::snapshot::SnapshotProvider;

pub struct Repl {
    config: ReplConfig,
}

impl Repl {
    pub fn new(config: ReplConfig) -> Self {
        Self { config }
    }

    pub fn with_crash_reporter(self, _reporter: Arc<dyn CrashReporter>) -> Self {
        self
    }

    pub fn with_snapshot_provider(self, _provider: Arc<dyn SnapshotProvider>) -> Self {
        self
    }

    pub fn with_process_handlers(self, _install: bool) -> Self {
        self
    }

    pub fn config(&self) -> &ReplConfig {
        &self.config
    }

    pub fn start<E>(&self, name: &str, _evaluator: E) -> Result<Option<EndpointHandle>, ReplError>
    where
        E: Evaluator + 'static,
    {
        if self.config.enabled {
            warn!(
                "Could not start REPL server \"{}\": Unix sockets are not available on this platform (everything else will still work)",
                name
            );
        }
        Ok(None)
    }
}

/// Never constructed on this platform.
#[derive(Debug)]
pub struct EndpointHandle {
    name: String,
    path: PathBuf,
}

impl EndpointHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection_count(&self) -> usize {
        0
    }

    pub fn heap_snapshot(&self, _target: Option<&Path>) -> Result<PathBuf, SnapshotError> {
        Err(SnapshotError::ProviderUnavailable)
    }

    pub fn close(self) {}
}
