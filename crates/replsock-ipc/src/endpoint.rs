//! Endpoint addressing.
//!
//! An endpoint's socket lives at `<base dir>/<name>`. The base directory is
//! the configured prefix resolved against the process root; the name is a
//! single path component so it can never escape the base directory.

use std::path::{Component, Path, PathBuf};

use crate::error::EndpointError;

pub const DEFAULT_SOCKET_PREFIX: &str = "logs/repl";
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// Longest socket path accepted, excluding the trailing NUL of `sun_path`.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub const MAX_SOCKET_PATH: usize = 103;
#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd")))]
pub const MAX_SOCKET_PATH: usize = 107;

/// A named debug access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub path: PathBuf,
    pub mode: u32,
}

impl Endpoint {
    pub fn resolve(base_dir: &Path, name: &str, mode: u32) -> Result<Self, EndpointError> {
        Ok(Self {
            name: name.to_string(),
            path: resolve_endpoint_path(base_dir, name)?,
            mode,
        })
    }
}

/// Join `prefix` onto `root`. An absolute prefix replaces the root.
pub fn resolve_base_dir(root: &Path, prefix: &Path) -> PathBuf {
    root.join(prefix)
}

pub fn validate_endpoint_name(name: &str) -> Result<(), EndpointError> {
    if name.is_empty() {
        return Err(EndpointError::EmptyName);
    }
    let invalid = |reason| EndpointError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(invalid("contains a path separator"));
    }
    match Path::new(name).components().next() {
        Some(Component::Normal(_)) => Ok(()),
        _ => Err(invalid("is not a plain file name")),
    }
}

/// Absolute socket path for endpoint `name` under `base_dir`.
///
/// A relative `base_dir` is taken relative to the current directory.
pub fn resolve_endpoint_path(base_dir: &Path, name: &str) -> Result<PathBuf, EndpointError> {
    validate_endpoint_name(name)?;

    let base_dir = if base_dir.is_absolute() {
        base_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(EndpointError::CurrentDir)?
            .join(base_dir)
    };

    let path = base_dir.join(name);
    let len = path.as_os_str().len();
    if len > MAX_SOCKET_PATH {
        return Err(EndpointError::PathTooLong {
            path,
            len,
            max: MAX_SOCKET_PATH,
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_joins_name() {
        let path = resolve_endpoint_path(Path::new("/srv/app/logs/repl"), "app").unwrap();
        assert_eq!(path, PathBuf::from("/srv/app/logs/repl/app"));
    }

    #[test]
    fn test_resolve_handles_trailing_separator() {
        let path = resolve_endpoint_path(Path::new("/srv/logs/repl/"), "chat").unwrap();
        assert_eq!(path, PathBuf::from("/srv/logs/repl/chat"));
    }

    #[test]
    fn test_resolve_relative_base_is_absolute() {
        let path = resolve_endpoint_path(Path::new("logs/repl"), "app").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("logs/repl/app"));
    }

    #[test]
    fn test_resolve_rejects_empty_name() {
        assert!(matches!(
            resolve_endpoint_path(Path::new("/tmp"), ""),
            Err(EndpointError::EmptyName)
        ));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        for name in ["..", ".", "a/b", "../app", "a\0b"] {
            assert!(
                matches!(
                    resolve_endpoint_path(Path::new("/tmp"), name),
                    Err(EndpointError::InvalidName { .. })
                ),
                "expected {:?} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_resolve_rejects_long_path() {
        let name = "x".repeat(MAX_SOCKET_PATH);
        assert!(matches!(
            resolve_endpoint_path(Path::new("/tmp"), &name),
            Err(EndpointError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_base_dir_absolute_prefix_wins() {
        assert_eq!(
            resolve_base_dir(Path::new("/srv"), Path::new("/var/run/repl")),
            PathBuf::from("/var/run/repl")
        );
        assert_eq!(
            resolve_base_dir(Path::new("/srv"), Path::new(DEFAULT_SOCKET_PREFIX)),
            PathBuf::from("/srv/logs/repl")
        );
    }

    #[test]
    fn test_endpoint_resolve_keeps_mode() {
        let endpoint = Endpoint::resolve(Path::new("/tmp/repl"), "app", 0o660).unwrap();
        assert_eq!(endpoint.name, "app");
        assert_eq!(endpoint.path, PathBuf::from("/tmp/repl/app"));
        assert_eq!(endpoint.mode, 0o660);
    }

    proptest! {
        #[test]
        fn prop_resolved_path_is_child_of_base(name in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,30}") {
            let base = Path::new("/tmp/replsock-prop");
            let path = resolve_endpoint_path(base, &name).unwrap();
            prop_assert_eq!(path.parent(), Some(base));
            prop_assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(name.as_str()));
        }
    }
}
