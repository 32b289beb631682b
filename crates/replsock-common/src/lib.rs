#![deny(clippy::all)]

mod fs;
mod sync;

pub use fs::is_socket;
pub use fs::remove_socket_file;
pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
