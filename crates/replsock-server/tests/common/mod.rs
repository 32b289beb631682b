#![allow(dead_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use replsock_server::{ConnectionRegistry, CrashReporter, Repl, ReplConfig};
use tempfile::TempDir;

/// Crash reporter that records what it was given.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }
}

impl CrashReporter for RecordingReporter {
    fn report(&self, error: &(dyn Error + 'static), context: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((error.to_string(), context.to_string()));
    }
}

/// A REPL rooted in a temp directory with its own registry, so tests do
/// not share state or install process handlers.
pub struct TestRepl {
    pub dir: TempDir,
    pub registry: Arc<ConnectionRegistry>,
    pub reporter: Arc<RecordingReporter>,
    pub repl: Repl,
}

impl TestRepl {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("repl")).unwrap();
        Self::in_dir(dir, |config| config)
    }

    pub fn in_dir(dir: TempDir, configure: impl FnOnce(ReplConfig) -> ReplConfig) -> Self {
        let config = configure(
            ReplConfig::default()
                .with_root(dir.path())
                .with_socket_prefix("repl"),
        );
        let registry = Arc::new(ConnectionRegistry::new());
        let reporter = Arc::new(RecordingReporter::default());
        let repl = Repl::new(config)
            .with_registry(Arc::clone(&registry))
            .with_crash_reporter(reporter.clone())
            .with_process_handlers(false);
        Self {
            dir,
            registry,
            reporter,
            repl,
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.dir.path().join("repl")
    }

    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.base_dir().join(name)
    }
}

/// Adds two integers written as `a+b`.
pub fn calc(input: &str) -> Result<i64, String> {
    let (a, b) = input
        .split_once('+')
        .ok_or_else(|| format!("cannot evaluate {input:?}"))?;
    let a: i64 = a.trim().parse().map_err(|e| format!("{e}"))?;
    let b: i64 = b.trim().parse().map_err(|e| format!("{e}"))?;
    Ok(a + b)
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Leave a socket file behind with nothing listening on it.
pub fn orphan_socket(path: &Path) {
    let listener = std::os::unix::net::UnixListener::bind(path).unwrap();
    drop(listener);
    assert!(path.exists());
}
