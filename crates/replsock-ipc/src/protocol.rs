//! Line protocol spoken by an endpoint session.
//!
//! The server writes a banner and then [`PROMPT`]. Each input line gets
//! exactly one response followed by a fresh prompt. Failed evaluations are
//! prefixed with [`ERROR_PREFIX`].

pub const PROMPT: &str = "> ";
pub const ERROR_PREFIX: &str = "Uncaught ";

pub const EXIT_COMMAND: &str = ".exit";
pub const HELP_COMMAND: &str = ".help";
pub const HEAPDUMP_COMMAND: &str = ".heapdump";

/// Upper bound on a single input line.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

pub fn banner(endpoint: &str) -> String {
    format!("replsock: connected to {endpoint} (.help for commands)\n")
}

pub fn help_text() -> String {
    format!(
        "{EXIT_COMMAND}              close this session\n\
         {HELP_COMMAND}              show this help\n\
         {HEAPDUMP_COMMAND} [path]   write a memory snapshot of the process\n"
    )
}

pub fn format_error(message: &str) -> String {
    format!("{ERROR_PREFIX}{message}")
}

pub fn is_error_response(response: &str) -> bool {
    response.starts_with(ERROR_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_names_endpoint() {
        assert!(banner("app").contains("connected to app"));
    }

    #[test]
    fn test_error_response_roundtrip() {
        let response = format_error("division by zero");
        assert!(is_error_response(&response));
        assert!(!is_error_response("4"));
    }

    #[test]
    fn test_help_lists_commands() {
        let help = help_text();
        for cmd in [EXIT_COMMAND, HELP_COMMAND, HEAPDUMP_COMMAND] {
            assert!(help.contains(cmd));
        }
    }
}
