#![deny(clippy::all)]

//! Embeddable REPL endpoints served over Unix domain sockets.
//!
//! A host process calls [`Repl::start`] with an endpoint name and an
//! evaluator. Each client that connects gets a line-oriented session;
//! every connection is tracked so that process exit or SIGHUP/SIGINT
//! closes them and unlinks the socket files.

mod config;
mod crash;
mod error;
mod eval;
mod snapshot;

#[cfg(unix)]
mod reclaim;
#[cfg(unix)]
mod registry;
#[cfg(unix)]
mod server;
#[cfg(unix)]
mod session;
#[cfg(unix)]
mod shutdown;
#[cfg(not(unix))]
mod unsupported;

pub use config::{ReplConfig, parse_socket_mode};
pub use crash::{CrashReporter, TracingCrashReporter};
pub use error::{BindErrorKind, ReplError, SnapshotError};
pub use eval::{EvalError, Evaluator};
pub use snapshot::{DebugHooks, ProcSnapshotProvider, SnapshotProvider, default_snapshot_path};

#[cfg(unix)]
pub use reclaim::{ReclaimReport, reclaim_stale_endpoints};
#[cfg(unix)]
pub use registry::{Connection, ConnectionId, ConnectionRegistry, DrainReport};
#[cfg(unix)]
pub use server::{EndpointHandle, Repl};
#[cfg(unix)]
pub use shutdown::{
    SIGHUP_EXIT_CODE, SIGINT_EXIT_CODE, ShutdownCoordinator, normalize_exit_code,
};
#[cfg(not(unix))]
pub use unsupported::{EndpointHandle, Repl};

pub type Result<T> = std::result::Result<T, ReplError>;
