use std::io;
use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::error::ClientError;
use crate::protocol::PROMPT;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// A client connection to one endpoint session.
pub struct EndpointClient {
    path: PathBuf,
    stream: UnixStream,
    pending: Vec<u8>,
}

impl EndpointClient {
    pub fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ClientError::EndpointNotRunning {
                path: path.to_path_buf(),
            },
            io::ErrorKind::ConnectionRefused => ClientError::EndpointStale {
                path: path.to_path_buf(),
            },
            _ => ClientError::ConnectionFailed(e),
        })?;

        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        stream.set_write_timeout(Some(DEFAULT_WRITE_TIMEOUT))?;

        Ok(Self {
            path: path.to_path_buf(),
            stream,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read output up to the next prompt, returning it without the prompt.
    ///
    /// Used right after connecting to consume the banner.
    pub fn read_prompt(&mut self) -> Result<String, ClientError> {
        loop {
            if let Some(pos) = find_prompt(&self.pending) {
                let text: Vec<u8> = self.pending.drain(..pos + PROMPT.len()).collect();
                let text = String::from_utf8_lossy(&text[..pos]).into_owned();
                return Ok(text);
            }

            let mut chunk = [0u8; 4096];
            let n = match self.stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(ClientError::Timeout);
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Send one input line and return the session's response.
    pub fn eval(&mut self, input: &str) -> Result<String, ClientError> {
        self.send_line(input)?;
        let response = self.read_prompt()?;
        Ok(response.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn send_line(&mut self, input: &str) -> Result<(), ClientError> {
        writeln!(self.stream, "{}", input)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read until the endpoint closes the connection.
    pub fn read_to_close(&mut self) -> Result<String, ClientError> {
        let mut rest = Vec::new();
        self.stream.read_to_end(&mut rest)?;
        let mut out = std::mem::take(&mut self.pending);
        out.extend_from_slice(&rest);
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Pipe `input` to the endpoint and endpoint output to `output`.
    ///
    /// Returns once the endpoint closes its side. Reaching the end of
    /// `input` half-closes the connection so the session sees EOF.
    pub fn attach<R, W>(self, mut input: R, mut output: W) -> Result<(), ClientError>
    where
        R: Read + Send + 'static,
        W: Write,
    {
        let mut stream = self.stream;
        stream.set_read_timeout(None)?;
        let mut upstream = stream.try_clone()?;

        thread::Builder::new()
            .name("replsock-attach-input".to_string())
            .spawn(move || {
                let _ = io::copy(&mut input, &mut upstream);
                let _ = upstream.shutdown(Shutdown::Write);
            })?;

        if !self.pending.is_empty() {
            output.write_all(&self.pending)?;
        }

        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            output.write_all(&chunk[..n])?;
            output.flush()?;
        }
        Ok(())
    }

    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// A prompt is only recognized at the start of a line: either the buffer is
/// exactly the prompt, or it ends with a newline followed by the prompt.
fn find_prompt(buf: &[u8]) -> Option<usize> {
    let prompt = PROMPT.as_bytes();
    if buf == prompt {
        return Some(0);
    }
    let start = buf.len().checked_sub(prompt.len())?;
    (start > 0 && buf.ends_with(prompt) && buf[start - 1] == b'\n').then_some(start)
}
