use std::env;
use std::path::{Path, PathBuf};

use replsock_ipc::{DEFAULT_SOCKET_MODE, DEFAULT_SOCKET_PREFIX, resolve_base_dir};
use serde::Deserialize;

const DEFAULT_RECLAIM_ENDPOINT: &str = "app";

/// REPL settings, resolved by the embedding process before any endpoint
/// starts. Field names on the wire follow the host config keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// When false, `Repl::start` does nothing.
    #[serde(rename = "repl")]
    pub enabled: bool,
    #[serde(rename = "replsocketprefix")]
    pub socket_prefix: PathBuf,
    #[serde(rename = "replsocketmode")]
    pub socket_mode: u32,
    /// Directory a relative prefix is resolved against. Empty means the
    /// current directory.
    pub root: PathBuf,
    /// Starting this endpoint first sweeps the socket directory for stale
    /// sockets.
    pub reclaim_endpoint: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_prefix: PathBuf::from(DEFAULT_SOCKET_PREFIX),
            socket_mode: DEFAULT_SOCKET_MODE,
            root: PathBuf::new(),
            reclaim_endpoint: DEFAULT_RECLAIM_ENDPOINT.to_string(),
        }
    }
}

impl ReplConfig {
    /// Defaults overlaid with `REPL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env::var("REPL_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.enabled),
            socket_prefix: env::var_os("REPL_SOCKET_PREFIX")
                .map(PathBuf::from)
                .unwrap_or(defaults.socket_prefix),
            socket_mode: env::var("REPL_SOCKET_MODE")
                .ok()
                .and_then(|v| parse_socket_mode(&v))
                .unwrap_or(defaults.socket_mode),
            root: env::var_os("REPL_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            reclaim_endpoint: env::var("REPL_RECLAIM_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.reclaim_endpoint),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_socket_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.socket_prefix = prefix.into();
        self
    }

    pub fn with_socket_mode(mut self, mode: u32) -> Self {
        self.socket_mode = mode;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_reclaim_endpoint(mut self, name: impl Into<String>) -> Self {
        self.reclaim_endpoint = name.into();
        self
    }

    /// Directory holding every endpoint socket.
    pub fn base_dir(&self) -> PathBuf {
        resolve_base_dir(Path::new(&self.root), &self.socket_prefix)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a permission mode written in octal, with or without `0o`/`0`.
pub fn parse_socket_mode(value: &str) -> Option<u32> {
    let digits = value.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let mode = u32::from_str_radix(digits, 8).ok()?;
    (mode <= 0o7777).then_some(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReplConfig::default();
        assert!(config.enabled);
        assert_eq!(config.socket_prefix, PathBuf::from("logs/repl"));
        assert_eq!(config.socket_mode, 0o600);
        assert_eq!(config.reclaim_endpoint, "app");
        assert_eq!(config.base_dir(), PathBuf::from("logs/repl"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ReplConfig::default()
            .with_enabled(false)
            .with_socket_prefix("run/repl")
            .with_socket_mode(0o660)
            .with_root("/srv/app")
            .with_reclaim_endpoint("main");

        assert!(!config.enabled);
        assert_eq!(config.socket_mode, 0o660);
        assert_eq!(config.reclaim_endpoint, "main");
        assert_eq!(config.base_dir(), PathBuf::from("/srv/app/run/repl"));
    }

    #[test]
    fn test_from_json_uses_host_keys() {
        let config =
            ReplConfig::from_json(r#"{"repl": false, "replsocketprefix": "/tmp/r", "replsocketmode": 432}"#)
                .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.socket_prefix, PathBuf::from("/tmp/r"));
        assert_eq!(config.socket_mode, 0o660);
        assert_eq!(config.reclaim_endpoint, "app");
    }

    #[test]
    fn test_from_json_empty_object_is_default() {
        assert_eq!(ReplConfig::from_json("{}").unwrap(), ReplConfig::default());
    }

    #[test]
    fn test_parse_socket_mode() {
        assert_eq!(parse_socket_mode("600"), Some(0o600));
        assert_eq!(parse_socket_mode("0600"), Some(0o600));
        assert_eq!(parse_socket_mode("0o660"), Some(0o660));
        assert_eq!(parse_socket_mode("999"), None);
        assert_eq!(parse_socket_mode("77777"), None);
        assert_eq!(parse_socket_mode(""), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
