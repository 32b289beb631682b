use std::io;
use std::path::Path;

/// Unlink a socket file, treating an already-missing file as success.
///
/// Returns `Ok(true)` when a file was removed and `Ok(false)` when there
/// was nothing to remove.
pub fn remove_socket_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` currently names a socket-type filesystem entry.
///
/// Symlinks are not followed.
#[cfg(unix)]
pub fn is_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_socket(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, "x").unwrap();

        assert!(remove_socket_file(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing");
        assert!(!remove_socket_file(&path).unwrap());
    }

    #[test]
    fn test_remove_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested");
        std::fs::create_dir(&path).unwrap();
        assert!(remove_socket_file(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_is_socket() {
        use std::os::unix::net::UnixListener;

        let dir = TempDir::new().unwrap();
        let sock = dir.path().join("live");
        let plain = dir.path().join("plain");
        let _listener = UnixListener::bind(&sock).unwrap();
        std::fs::write(&plain, "x").unwrap();

        assert!(is_socket(&sock));
        assert!(!is_socket(&plain));
        assert!(!is_socket(&dir.path().join("missing")));
    }
}
