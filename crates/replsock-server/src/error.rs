//! Errors for endpoint startup, and the OS error taxonomy they are built on.

use std::io;
use std::path::PathBuf;

use replsock_ipc::EndpointError;
use thiserror::Error;

/// Classification of a failed bind, decided once at the OS boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindErrorKind {
    /// Something already occupies the socket path.
    AddressInUse,
    /// The filesystem or platform cannot host a Unix socket here.
    Unsupported,
    Other,
}

impl BindErrorKind {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => return BindErrorKind::AddressInUse,
            io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported => {
                return BindErrorKind::Unsupported;
            }
            _ => {}
        }

        if let Some(kind) = err.raw_os_error().and_then(classify_raw_os_error) {
            return kind;
        }

        BindErrorKind::Other
    }
}

#[cfg(unix)]
fn classify_raw_os_error(code: i32) -> Option<BindErrorKind> {
    match code {
        libc::EADDRINUSE => Some(BindErrorKind::AddressInUse),
        libc::EACCES | libc::EPERM | libc::EAFNOSUPPORT | libc::EPROTONOSUPPORT | libc::EOPNOTSUPP => {
            Some(BindErrorKind::Unsupported)
        }
        _ => None,
    }
}

#[cfg(not(unix))]
fn classify_raw_os_error(_code: i32) -> Option<BindErrorKind> {
    None
}

/// Failure of a single `Repl::start` call. Never fatal to the process.
#[derive(Error, Debug)]
pub enum ReplError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Endpoint '{name}' is already in use at {}", path.display())]
    AddressInUse { name: String, path: PathBuf },

    #[error("Could not start REPL endpoint '{name}': Unix sockets are not supported here ({source})")]
    Unsupported {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind endpoint '{name}' at {}: {source}", path.display())]
    Bind {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set permissions on {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn accept loop for '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Process is shutting down")]
    ShuttingDown,
}

impl ReplError {
    pub fn suggestion(&self) -> String {
        match self {
            ReplError::Endpoint(EndpointError::PathTooLong { .. }) => {
                "Use a shorter replsocketprefix or endpoint name.".to_string()
            }
            ReplError::Endpoint(_) => {
                "Endpoint names must be a single non-empty path component.".to_string()
            }
            ReplError::AddressInUse { .. } => {
                "Another listener owns this endpoint. Close it first, or retry once the stale socket has been removed.".to_string()
            }
            ReplError::Unsupported { .. } => {
                "Point replsocketprefix at a local filesystem that supports Unix sockets. Everything else keeps working.".to_string()
            }
            ReplError::Bind { .. } => {
                "Check that the socket directory exists and is writable.".to_string()
            }
            ReplError::Permissions { .. } => {
                "Check ownership of the socket directory.".to_string()
            }
            ReplError::Spawn { .. } | ReplError::ShuttingDown => {
                "Not recoverable in this process.".to_string()
            }
        }
    }

    /// Whether a later `start` with the same arguments may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplError::AddressInUse { .. })
    }
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(
        "heap snapshots are unavailable: no snapshot provider is installed. \
         Register one with Repl::with_snapshot_provider (for example ProcSnapshotProvider) and try again."
    )]
    ProviderUnavailable,

    #[error("failed to write snapshot to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot provider failed: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_addr_in_use() {
        let err = io::Error::new(io::ErrorKind::AddrInUse, "in use");
        assert_eq!(BindErrorKind::classify(&err), BindErrorKind::AddressInUse);
    }

    #[test]
    fn test_classify_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(BindErrorKind::classify(&err), BindErrorKind::Unsupported);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_raw_os_errors() {
        for (code, expected) in [
            (libc::EADDRINUSE, BindErrorKind::AddressInUse),
            (libc::EACCES, BindErrorKind::Unsupported),
            (libc::EPERM, BindErrorKind::Unsupported),
            (libc::EAFNOSUPPORT, BindErrorKind::Unsupported),
            (libc::ENOENT, BindErrorKind::Other),
            (libc::ENOTDIR, BindErrorKind::Other),
        ] {
            let err = io::Error::from_raw_os_error(code);
            assert_eq!(BindErrorKind::classify(&err), expected, "errno {}", code);
        }
    }

    #[test]
    fn test_classify_other() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing dir");
        assert_eq!(BindErrorKind::classify(&err), BindErrorKind::Other);
    }

    #[test]
    fn test_repl_error_display_and_retry() {
        let err = ReplError::AddressInUse {
            name: "app".to_string(),
            path: PathBuf::from("/tmp/logs/repl/app"),
        };
        assert_eq!(
            err.to_string(),
            "Endpoint 'app' is already in use at /tmp/logs/repl/app"
        );
        assert!(err.is_retryable());

        let err = ReplError::Bind {
            name: "app".to_string(),
            path: PathBuf::from("/tmp/x/app"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(!err.is_retryable());
        assert!(err.suggestion().contains("exists"));
    }

    #[test]
    fn test_snapshot_error_is_actionable() {
        let msg = SnapshotError::ProviderUnavailable.to_string();
        assert!(msg.contains("with_snapshot_provider"));
    }
}
