//! Liveness probing for socket files.
//!
//! A socket file on disk says nothing about whether a process still owns
//! it. Connecting as a client does: refused means orphaned.

use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum Liveness {
    /// A listener accepted the probe connection.
    Live,
    /// Connection refused: nobody is listening on the file.
    Stale,
    /// Anything else; the caller must not assume the file is orphaned.
    Unknown(io::Error),
}

impl Liveness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Liveness::Stale)
    }
}

impl From<io::Error> for Liveness {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Liveness::Stale,
            _ => Liveness::Unknown(err),
        }
    }
}

/// Connect to `path` and classify the outcome.
///
/// A successful probe half-closes and drops the connection so the peer sees
/// a clean EOF. The connect runs on a helper thread bounded by
/// [`PROBE_TIMEOUT`]; a connect stuck on a full backlog reports `Unknown`.
pub fn probe_endpoint(path: &Path) -> Liveness {
    probe_endpoint_with_timeout(path, PROBE_TIMEOUT)
}

pub fn probe_endpoint_with_timeout(path: &Path, timeout: Duration) -> Liveness {
    let (tx, rx) = mpsc::channel();
    let target: PathBuf = path.to_path_buf();

    let spawned = thread::Builder::new()
        .name("replsock-probe".to_string())
        .spawn(move || {
            let _ = tx.send(UnixStream::connect(&target));
        });
    if let Err(e) = spawned {
        return Liveness::Unknown(e);
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(stream)) => {
            let _ = stream.shutdown(Shutdown::Write);
            let _ = stream.shutdown(Shutdown::Both);
            debug!(path = %path.display(), "probe connected, endpoint is live");
            Liveness::Live
        }
        Ok(Err(e)) => {
            debug!(path = %path.display(), error = %e, "probe failed");
            Liveness::from(e)
        }
        Err(_) => Liveness::Unknown(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out probing socket",
        )),
    }
}
