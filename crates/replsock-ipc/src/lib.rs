#![deny(clippy::all)]

#[cfg(unix)]
mod client;
mod endpoint;
mod error;
#[cfg(unix)]
mod probe;
pub mod protocol;

#[cfg(unix)]
pub use client::EndpointClient;
pub use endpoint::DEFAULT_SOCKET_MODE;
pub use endpoint::DEFAULT_SOCKET_PREFIX;
pub use endpoint::Endpoint;
pub use endpoint::MAX_SOCKET_PATH;
pub use endpoint::resolve_base_dir;
pub use endpoint::resolve_endpoint_path;
pub use endpoint::validate_endpoint_name;
pub use error::ClientError;
pub use error::EndpointError;
#[cfg(unix)]
pub use probe::Liveness;
#[cfg(unix)]
pub use probe::PROBE_TIMEOUT;
#[cfg(unix)]
pub use probe::probe_endpoint;
#[cfg(unix)]
pub use probe::probe_endpoint_with_timeout;

pub type Result<T> = std::result::Result<T, ClientError>;
