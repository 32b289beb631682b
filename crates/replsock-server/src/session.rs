//! The per-connection read-evaluate-respond loop.

use std::io::{self, BufRead, Read, Write};
use std::path::Path;

use replsock_ipc::protocol::{
    self, EXIT_COMMAND, HEAPDUMP_COMMAND, HELP_COMMAND, MAX_LINE_BYTES, PROMPT,
};
use tracing::debug;

use crate::eval::{Evaluator, evaluate_guarded};
use crate::snapshot::DebugHooks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    ExitCommand,
    ClientClosed,
    LineTooLong,
}

enum Line {
    Text(String),
    TooLong,
    Eof,
}

enum Reply {
    Text(String),
    Exit,
}

pub(crate) struct Session<'a> {
    endpoint_name: &'a str,
    endpoint_path: &'a Path,
    evaluator: &'a dyn Evaluator,
    hooks: &'a DebugHooks,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        endpoint_name: &'a str,
        endpoint_path: &'a Path,
        evaluator: &'a dyn Evaluator,
        hooks: &'a DebugHooks,
    ) -> Self {
        Self {
            endpoint_name,
            endpoint_path,
            evaluator,
            hooks,
        }
    }

    /// Serve one client until it exits, disconnects or the transport fails.
    ///
    /// Lines are evaluated strictly one at a time, in arrival order.
    pub(crate) fn run<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> io::Result<SessionEnd> {
        writer.write_all(protocol::banner(self.endpoint_name).as_bytes())?;
        writer.write_all(PROMPT.as_bytes())?;
        writer.flush()?;

        loop {
            let line = match read_line(&mut reader)? {
                Line::Text(line) => line,
                Line::Eof => return Ok(SessionEnd::ClientClosed),
                Line::TooLong => {
                    let msg = protocol::format_error(&format!(
                        "input line exceeds {} bytes, closing session",
                        MAX_LINE_BYTES
                    ));
                    writeln!(writer, "{}", msg)?;
                    writer.flush()?;
                    return Ok(SessionEnd::LineTooLong);
                }
            };

            let input = line.trim();
            if !input.is_empty() {
                match self.respond(input) {
                    Reply::Exit => return Ok(SessionEnd::ExitCommand),
                    Reply::Text(text) => {
                        writer.write_all(text.as_bytes())?;
                        if !text.is_empty() && !text.ends_with('\n') {
                            writer.write_all(b"\n")?;
                        }
                    }
                }
            }

            writer.write_all(PROMPT.as_bytes())?;
            writer.flush()?;
        }
    }

    fn respond(&self, input: &str) -> Reply {
        let (command, arg) = match input.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (input, ""),
        };

        match command {
            EXIT_COMMAND => Reply::Exit,
            HELP_COMMAND => Reply::Text(protocol::help_text()),
            HEAPDUMP_COMMAND => {
                let target = (!arg.is_empty()).then(|| Path::new(arg));
                match self.hooks.heap_snapshot(target, self.endpoint_path) {
                    Ok(path) => Reply::Text(format!("Heap snapshot written to {}", path.display())),
                    Err(e) => Reply::Text(protocol::format_error(&e.to_string())),
                }
            }
            _ => match evaluate_guarded(self.evaluator, input) {
                Ok(value) => Reply::Text(value),
                Err(e) => {
                    debug!(endpoint = self.endpoint_name, error = %e, "evaluation failed");
                    Reply::Text(protocol::format_error(e.message()))
                }
            },
        }
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Line> {
    let mut buf = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_BYTES as u64 + 2)
        .read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_LINE_BYTES {
        return Ok(Line::TooLong);
    }
    Ok(Line::Text(String::from_utf8_lossy(&buf).into_owned()))
}
