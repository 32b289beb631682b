use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use replsock_server::{ReplConfig, parse_socket_mode};

const LONG_ABOUT: &str = r#"replsock talks to REPL endpoints that a running process serves over
Unix domain sockets.

Each endpoint is a socket file named after the endpoint, inside the
socket directory (<root>/<prefix>, default ./logs/repl). Connecting opens
a line-oriented session evaluated inside the serving process.

EXAMPLES:
    # Serve a demo endpoint, then attach to it from another terminal
    replsock demo calc
    replsock attach calc

    # See which endpoints are alive, then remove the dead ones
    replsock list
    replsock clean"#;

#[derive(Parser, Debug)]
#[command(name = "replsock")]
#[command(author, version)]
#[command(about = "Attach to REPL endpoints served over Unix sockets")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory a relative socket prefix is resolved against
    #[arg(long, global = true, env = "REPL_ROOT")]
    pub root: Option<PathBuf>,

    /// Socket directory, relative to the root unless absolute
    #[arg(long, global = true, env = "REPL_SOCKET_PREFIX")]
    pub prefix: Option<PathBuf>,

    /// Socket file mode in octal (demo only)
    #[arg(long, global = true, value_parser = parse_mode_arg)]
    pub mode: Option<u32>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to an endpoint and pipe stdin/stdout through it
    Attach {
        /// Endpoint name
        name: String,
    },

    /// List endpoint sockets and whether anything is listening
    #[command(alias = "ls")]
    List,

    /// Remove sockets nobody is listening on
    Clean,

    /// Serve a demo endpoint that evaluates integer arithmetic
    Demo {
        /// Endpoint name
        #[arg(default_value = "app")]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Environment configuration with command line flags applied on top.
    pub fn config(&self) -> ReplConfig {
        let mut config = ReplConfig::from_env();
        if let Some(root) = &self.root {
            config = config.with_root(root);
        }
        if let Some(prefix) = &self.prefix {
            config = config.with_socket_prefix(prefix);
        }
        if let Some(mode) = self.mode {
            config = config.with_socket_mode(mode);
        }
        config
    }
}

fn parse_mode_arg(value: &str) -> Result<u32, String> {
    parse_socket_mode(value).ok_or_else(|| format!("'{value}' is not an octal file mode"))
}
