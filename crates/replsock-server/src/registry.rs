//! Process-wide table of bound endpoints and attached connections.
//!
//! Session threads register on accept and unregister on teardown; the
//! shutdown path drains everything at once. All mutation goes through one
//! mutex, and close/unlink work happens after the lock is released.

use std::collections::HashMap;
use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use replsock_common::{mutex_lock_or_recover, remove_socket_file};
use tracing::{debug, warn};

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A live client attachment to an endpoint.
///
/// Holds its own handle to the socket so the registry can close it while a
/// session thread is blocked reading.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    endpoint_path: PathBuf,
    stream: UnixStream,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(endpoint_path: &Path, stream: &UnixStream) -> io::Result<Self> {
        Ok(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            endpoint_path: endpoint_path.to_path_buf(),
            stream: stream.try_clone()?,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint_path(&self) -> &Path {
        &self.endpoint_path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the transport. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.stream.shutdown(Shutdown::Both);
        true
    }

    /// Send EOF to the client, then close both directions.
    pub fn close_gracefully(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.stream.shutdown(Shutdown::Write);
        let _ = self.stream.shutdown(Shutdown::Both);
        true
    }
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub closed: usize,
    pub removed_files: Vec<PathBuf>,
    pub failed_unlinks: Vec<(PathBuf, io::Error)>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<PathBuf, HashMap<ConnectionId, Arc<Connection>>>,
    endpoints: HashMap<PathBuf, Arc<AtomicBool>>,
    sealed: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = mutex_lock_or_recover(&self.state);
        f.debug_struct("ConnectionRegistry")
            .field("endpoints", &state.endpoints.len())
            .field(
                "connections",
                &state.connections.values().map(HashMap::len).sum::<usize>(),
            )
            .field("sealed", &state.sealed)
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every endpoint that does not bring its own.
    pub fn global() -> &'static Arc<ConnectionRegistry> {
        static GLOBAL: OnceLock<Arc<ConnectionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ConnectionRegistry::new()))
    }

    /// Track a connection under its endpoint path.
    ///
    /// Returns false once the registry is sealed for shutdown; the caller
    /// must then close the connection itself.
    pub fn register(&self, connection: Arc<Connection>) -> bool {
        let mut state = mutex_lock_or_recover(&self.state);
        if state.sealed {
            return false;
        }
        state
            .connections
            .entry(connection.endpoint_path().to_path_buf())
            .or_default()
            .insert(connection.id(), connection);
        true
    }

    /// Remove a connection. A second call for the same entry is a no-op.
    pub fn unregister(&self, path: &Path, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut state = mutex_lock_or_recover(&self.state);
        let per_path = state.connections.get_mut(path)?;
        let removed = per_path.remove(&id);
        if per_path.is_empty() {
            state.connections.remove(path);
        }
        removed
    }

    pub fn connections(&self, path: &Path) -> Vec<Arc<Connection>> {
        let state = mutex_lock_or_recover(&self.state);
        state
            .connections
            .get(path)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        let state = mutex_lock_or_recover(&self.state);
        state.connections.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        let state = mutex_lock_or_recover(&self.state);
        state.connections.is_empty() && state.endpoints.is_empty()
    }

    /// Record a bound endpoint and the flag that stops its accept loop.
    ///
    /// Returns the stop flag of a previous listener at the same path, which
    /// can no longer be reached once the path was rebound. `Err` means the
    /// registry is sealed.
    pub fn register_endpoint(
        &self,
        path: &Path,
        stop: Arc<AtomicBool>,
    ) -> Result<Option<Arc<AtomicBool>>, Arc<AtomicBool>> {
        let mut state = mutex_lock_or_recover(&self.state);
        if state.sealed {
            return Err(stop);
        }
        Ok(state.endpoints.insert(path.to_path_buf(), stop))
    }

    /// Forget an endpoint if `stop` is still the flag registered for it.
    pub fn unregister_endpoint(&self, path: &Path, stop: &Arc<AtomicBool>) -> bool {
        let mut state = mutex_lock_or_recover(&self.state);
        match state.endpoints.get(path) {
            Some(current) if Arc::ptr_eq(current, stop) => {
                state.endpoints.remove(path);
                true
            }
            _ => false,
        }
    }

    pub fn has_endpoint(&self, path: &Path) -> bool {
        mutex_lock_or_recover(&self.state).endpoints.contains_key(path)
    }

    pub fn is_sealed(&self) -> bool {
        mutex_lock_or_recover(&self.state).sealed
    }

    /// Refuse further registrations. Used once the process is exiting.
    pub fn seal(&self) {
        mutex_lock_or_recover(&self.state).sealed = true;
    }

    /// Remove every entry, close every connection, stop every accept loop
    /// and unlink the socket files of endpoints still bound here.
    ///
    /// A connection outliving its endpoint does not own the path anymore;
    /// another listener may have bound it since.
    pub fn drain_all(&self) -> DrainReport {
        let (connections, endpoints) = {
            let mut state = mutex_lock_or_recover(&self.state);
            (
                std::mem::take(&mut state.connections),
                std::mem::take(&mut state.endpoints),
            )
        };

        let mut report = DrainReport::default();
        let mut socket_paths: Vec<PathBuf> = Vec::new();

        for (path, stop) in endpoints {
            stop.store(true, Ordering::SeqCst);
            socket_paths.push(path);
        }

        for conns in connections.into_values() {
            for conn in conns.into_values() {
                if conn.close_gracefully() {
                    report.closed += 1;
                }
            }
        }

        for path in socket_paths {
            match remove_socket_file(&path) {
                Ok(true) => {
                    debug!(path = %path.display(), "removed endpoint socket");
                    report.removed_files.push(path);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove endpoint socket");
                    report.failed_unlinks.push((path, e));
                }
            }
        }

        report
    }
}
