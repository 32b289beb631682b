use std::path::PathBuf;

use thiserror::Error;

/// Failures computing an endpoint's socket path.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Endpoint name must not be empty")]
    EmptyName,

    #[error("Invalid endpoint name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Socket path too long ({len} bytes, max {max}): {}", path.display())]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    #[error("Failed to determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to endpoint: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("No endpoint listening at {}", path.display())]
    EndpointNotRunning { path: PathBuf },

    #[error("Endpoint socket {} is stale (no process accepting)", path.display())]
    EndpointStale { path: PathBuf },

    #[error("Connection closed by endpoint")]
    ConnectionClosed,

    #[error("Timed out waiting for endpoint")]
    Timeout,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl ClientError {
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ClientError::EndpointNotRunning { .. } => {
                Some("Check that the process is running and that --root/--prefix match its config.")
            }
            ClientError::EndpointStale { .. } => {
                Some("The owning process exited without cleanup. Run 'replsock clean' to remove it.")
            }
            ClientError::Timeout => Some("The endpoint may be busy evaluating; try again."),
            ClientError::Endpoint(EndpointError::PathTooLong { .. }) => {
                Some("Use a shorter --root or --prefix.")
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_display() {
        let err = EndpointError::InvalidName {
            name: "a/b".to_string(),
            reason: "contains a path separator",
        };
        assert_eq!(
            err.to_string(),
            "Invalid endpoint name \"a/b\": contains a path separator"
        );

        let err = EndpointError::PathTooLong {
            path: PathBuf::from("/x"),
            len: 200,
            max: 107,
        };
        assert!(err.to_string().contains("200 bytes"));
    }

    #[test]
    fn test_client_error_suggestions() {
        let err = ClientError::EndpointStale {
            path: PathBuf::from("/tmp/app"),
        };
        assert!(err.suggestion().unwrap().contains("replsock clean"));
        assert!(!err.is_retryable());

        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.suggestion().is_none());
    }
}
