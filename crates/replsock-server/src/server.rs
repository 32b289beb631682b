//! Binding endpoints and serving their connections.

use std::io::{self, BufReader};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use replsock_common::remove_socket_file;
use replsock_ipc::{Endpoint, Liveness, probe_endpoint};
use tracing::{debug, error, info, warn};

use crate::config::ReplConfig;
use crate::crash::{CrashReporter, TracingCrashReporter, context_label};
use crate::error::{BindErrorKind, ReplError, SnapshotError};
use crate::eval::Evaluator;
use crate::reclaim::reclaim_stale_endpoints;
use crate::registry::{Connection, ConnectionRegistry};
use crate::session::Session;
use crate::shutdown::ShutdownCoordinator;
use crate::snapshot::{DebugHooks, SnapshotProvider};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

static UNSUPPORTED_LOGGED: AtomicBool = AtomicBool::new(false);

/// Entry point for embedding REPL endpoints in a process.
pub struct Repl {
    config: ReplConfig,
    registry: Arc<ConnectionRegistry>,
    reporter: Arc<dyn CrashReporter>,
    hooks: DebugHooks,
    process_handlers: bool,
}

impl Repl {
    pub fn new(config: ReplConfig) -> Self {
        Self {
            config,
            registry: Arc::clone(ConnectionRegistry::global()),
            reporter: Arc::new(TracingCrashReporter),
            hooks: DebugHooks::new(),
            process_handlers: true,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_crash_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.hooks = self.hooks.with_snapshot_provider(provider);
        self
    }

    /// Whether `start` installs the process exit hook and signal handlers.
    pub fn with_process_handlers(mut self, install: bool) -> Self {
        self.process_handlers = install;
        self
    }

    pub fn config(&self) -> &ReplConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Start serving endpoint `name`, evaluating each input line with
    /// `evaluator`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when the REPL is
    /// disabled. Errors only affect this endpoint; unexpected ones are also
    /// sent to the crash reporter.
    pub fn start<E>(&self, name: &str, evaluator: E) -> Result<Option<EndpointHandle>, ReplError>
    where
        E: Evaluator + 'static,
    {
        if !self.config.enabled {
            debug!(endpoint = name, "REPL disabled, not starting endpoint");
            return Ok(None);
        }

        let base_dir = self.config.base_dir();
        let endpoint = Endpoint::resolve(&base_dir, name, self.config.socket_mode)
            .inspect_err(|e| warn!(endpoint = name, error = %e, "invalid REPL endpoint"))?;

        if self.process_handlers {
            ShutdownCoordinator::install().watch(Arc::clone(&self.registry));
        }

        if name == self.config.reclaim_endpoint {
            match reclaim_stale_endpoints(&base_dir, Some(&self.registry)) {
                Ok(report) if !report.removed.is_empty() => {
                    info!(removed = report.removed.len(), dir = %base_dir.display(), "reclaimed stale REPL sockets");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(dir = %base_dir.display(), error = %e, "failed to scan for stale REPL sockets");
                }
            }
        }

        let listener = self.bind(&endpoint)?;

        let stop = Arc::new(AtomicBool::new(false));
        match self.registry.register_endpoint(&endpoint.path, Arc::clone(&stop)) {
            Ok(Some(previous)) => {
                warn!(endpoint = name, "replacing unreachable listener at the same path");
                previous.store(true, Ordering::SeqCst);
            }
            Ok(None) => {}
            Err(_) => {
                drop(listener);
                let _ = remove_socket_file(&endpoint.path);
                return Err(ReplError::ShuttingDown);
            }
        }

        let ctx = Arc::new(EndpointContext {
            endpoint: endpoint.clone(),
            evaluator: Arc::new(evaluator),
            registry: Arc::clone(&self.registry),
            hooks: self.hooks.clone(),
        });

        let loop_stop = Arc::clone(&stop);
        let accept = thread::Builder::new()
            .name(format!("replsock-accept-{}", name))
            .spawn(move || run_accept_loop(listener, ctx, loop_stop));
        let accept = match accept {
            Ok(handle) => handle,
            Err(source) => {
                self.registry.unregister_endpoint(&endpoint.path, &stop);
                let _ = remove_socket_file(&endpoint.path);
                let err = ReplError::Spawn {
                    name: name.to_string(),
                    source,
                };
                self.reporter.report(&err, &context_label(name));
                return Err(err);
            }
        };

        info!(endpoint = name, path = %endpoint.path.display(), "REPL endpoint listening");

        Ok(Some(EndpointHandle {
            endpoint,
            stop,
            registry: Arc::clone(&self.registry),
            hooks: self.hooks.clone(),
            accept: Some(accept),
        }))
    }

    fn bind(&self, endpoint: &Endpoint) -> Result<UnixListener, ReplError> {
        let name = endpoint.name.as_str();
        let label = context_label(name);

        let listener = match UnixListener::bind(&endpoint.path) {
            Ok(listener) => listener,
            Err(source) => {
                return Err(match BindErrorKind::classify(&source) {
                    BindErrorKind::AddressInUse => self.handle_address_in_use(endpoint),
                    BindErrorKind::Unsupported => {
                        if !UNSUPPORTED_LOGGED.swap(true, Ordering::Relaxed) {
                            warn!(
                                "Could not start REPL server \"{}\": Your filesystem doesn't support Unix sockets (everything else will still work)",
                                name
                            );
                        }
                        ReplError::Unsupported {
                            name: name.to_string(),
                            source,
                        }
                    }
                    BindErrorKind::Other => {
                        let err = ReplError::Bind {
                            name: name.to_string(),
                            path: endpoint.path.clone(),
                            source,
                        };
                        self.reporter.report(&err, &label);
                        err
                    }
                });
            }
        };

        let permissions = std::fs::Permissions::from_mode(endpoint.mode);
        if let Err(source) = std::fs::set_permissions(&endpoint.path, permissions) {
            drop(listener);
            let _ = remove_socket_file(&endpoint.path);
            let err = ReplError::Permissions {
                path: endpoint.path.clone(),
                source,
            };
            self.reporter.report(&err, &label);
            return Err(err);
        }

        if let Err(source) = listener.set_nonblocking(true) {
            drop(listener);
            let _ = remove_socket_file(&endpoint.path);
            let err = ReplError::Bind {
                name: name.to_string(),
                path: endpoint.path.clone(),
                source,
            };
            self.reporter.report(&err, &label);
            return Err(err);
        }

        Ok(listener)
    }

    /// The path is occupied. Unlink it only when nobody is listening, so a
    /// later `start` can bind; a live listener is never displaced.
    fn handle_address_in_use(&self, endpoint: &Endpoint) -> ReplError {
        let name = endpoint.name.as_str();
        let err = ReplError::AddressInUse {
            name: name.to_string(),
            path: endpoint.path.clone(),
        };

        if self.registry.has_endpoint(&endpoint.path) {
            warn!(endpoint = name, "REPL endpoint is already served by this process");
            return err;
        }

        match probe_endpoint(&endpoint.path) {
            Liveness::Live => {
                warn!(endpoint = name, path = %endpoint.path.display(), "REPL endpoint is in use by another process");
            }
            Liveness::Stale => match remove_socket_file(&endpoint.path) {
                Ok(_) => {
                    info!(endpoint = name, path = %endpoint.path.display(), "removed stale REPL socket, retry to bind");
                }
                Err(e) => {
                    self.reporter.report(&e, &context_label(name));
                }
            },
            Liveness::Unknown(e) => {
                warn!(endpoint = name, error = %e, "could not probe occupied REPL socket, leaving it");
            }
        }
        err
    }
}

struct EndpointContext {
    endpoint: Endpoint,
    evaluator: Arc<dyn Evaluator>,
    registry: Arc<ConnectionRegistry>,
    hooks: DebugHooks,
}

/// A running endpoint. Dropping the handle leaves the endpoint serving;
/// call [`EndpointHandle::close`] to stop it.
pub struct EndpointHandle {
    endpoint: Endpoint,
    stop: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    hooks: DebugHooks,
    accept: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for EndpointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("endpoint", &self.endpoint)
            .field("stopped", &self.stop.load(Ordering::Relaxed))
            .finish()
    }
}

impl EndpointHandle {
    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    pub fn path(&self) -> &Path {
        &self.endpoint.path
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connections(&self.endpoint.path).len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn heap_snapshot(&self, target: Option<&Path>) -> Result<PathBuf, SnapshotError> {
        self.hooks.heap_snapshot(target, &self.endpoint.path)
    }

    /// Stop accepting, release the listener and unlink the socket file.
    /// Sessions already attached keep running until they end.
    pub fn close(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
        if self.registry.unregister_endpoint(&self.endpoint.path, &self.stop) {
            if let Err(e) = remove_socket_file(&self.endpoint.path) {
                warn!(path = %self.endpoint.path.display(), error = %e, "failed to remove REPL socket");
            }
        }
        info!(endpoint = %self.endpoint.name, "REPL endpoint closed");
    }
}

fn run_accept_loop(listener: UnixListener, ctx: Arc<EndpointContext>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => spawn_session(&ctx, stream),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    error!(endpoint = %ctx.endpoint.name, error = %e, "error accepting REPL connection");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }
    debug!(endpoint = %ctx.endpoint.name, "accept loop stopped");
}

fn spawn_session(ctx: &Arc<EndpointContext>, stream: UnixStream) {
    let ctx = Arc::clone(ctx);
    let spawned = thread::Builder::new()
        .name(format!("replsock-session-{}", ctx.endpoint.name))
        .spawn(move || serve_connection(&ctx, stream));
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn REPL session thread, dropping connection");
    }
}

/// Unregisters and closes its connection when the session ends, whichever
/// way it ends.
struct ConnectionGuard<'a> {
    registry: &'a ConnectionRegistry,
    connection: Arc<Connection>,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .unregister(self.connection.endpoint_path(), self.connection.id());
        self.connection.close();
    }
}

fn serve_connection(ctx: &EndpointContext, stream: UnixStream) {
    if let Err(e) = stream.set_nonblocking(false) {
        warn!(endpoint = %ctx.endpoint.name, error = %e, "failed to make REPL connection blocking, dropping it");
        return;
    }

    let connection = match Connection::new(&ctx.endpoint.path, &stream) {
        Ok(connection) => Arc::new(connection),
        Err(e) => {
            warn!(endpoint = %ctx.endpoint.name, error = %e, "failed to track REPL connection");
            return;
        }
    };
    let _guard = ConnectionGuard {
        registry: &ctx.registry,
        connection: Arc::clone(&connection),
    };

    if !ctx.registry.register(Arc::clone(&connection)) {
        debug!(endpoint = %ctx.endpoint.name, "shutting down, refusing REPL connection");
        return;
    }
    debug!(endpoint = %ctx.endpoint.name, connection = connection.id(), "REPL client connected");

    let writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            warn!(error = %e, "failed to clone REPL stream");
            return;
        }
    };

    let session = Session::new(
        &ctx.endpoint.name,
        &ctx.endpoint.path,
        ctx.evaluator.as_ref(),
        &ctx.hooks,
    );
    match session.run(BufReader::new(stream), writer) {
        Ok(end) => {
            debug!(endpoint = %ctx.endpoint.name, connection = connection.id(), ?end, "REPL session ended");
        }
        Err(e) => {
            debug!(endpoint = %ctx.endpoint.name, connection = connection.id(), error = %e, "REPL connection closed");
        }
    }
}
