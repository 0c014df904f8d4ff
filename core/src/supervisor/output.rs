//! Draining the child's stdout/stderr into log sinks
//!
//! Each stream gets its own background task reading through a buffered
//! reader, so the child never stalls on a full pipe while the supervisor is
//! busy elsewhere. Lines are decoded lossily; a final chunk without a
//! trailing newline is still delivered.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Which of the child's output streams a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl OutputStream {
    /// Stream name as used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Receives the child's output one line at a time
pub trait LineSink: Send + Sync {
    /// Handle a single line, without its line terminator
    fn line(&self, line: &str);
}

/// Emits each line as a `tracing` event: stdout at `info`, stderr at `error`
#[derive(Debug, Clone)]
pub struct TracingSink {
    app: String,
    stream: OutputStream,
}

impl TracingSink {
    /// Create a sink for `stream` of application `app`
    pub fn new(app: impl Into<String>, stream: OutputStream) -> Self {
        Self {
            app: app.into(),
            stream,
        }
    }
}

impl LineSink for TracingSink {
    fn line(&self, line: &str) {
        match self.stream {
            OutputStream::Stdout => {
                info!(target: "launch::child", app = %self.app, stream = "stdout", "{}", line)
            }
            OutputStream::Stderr => {
                error!(target: "launch::child", app = %self.app, stream = "stderr", "{}", line)
            }
        }
    }
}

/// Collects lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LineSink for MemorySink {
    fn line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// The pair of sinks wired to a child's output streams
#[derive(Clone)]
pub struct OutputSinks {
    /// Receives stdout lines
    pub stdout: Arc<dyn LineSink>,
    /// Receives stderr lines
    pub stderr: Arc<dyn LineSink>,
}

impl OutputSinks {
    /// Route stdout to `info` and stderr to `error`, tagged with the application name
    pub fn tracing(app: &str) -> Self {
        Self {
            stdout: Arc::new(TracingSink::new(app, OutputStream::Stdout)),
            stderr: Arc::new(TracingSink::new(app, OutputStream::Stderr)),
        }
    }
}

impl std::fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}

/// Spawn a background task copying `reader` into `sink` line by line until EOF
pub fn spawn_drain<R>(reader: R, stream: OutputStream, sink: Arc<dyn LineSink>) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_line_ending(&buf));
                    sink.line(&line);
                }
                Err(e) => {
                    warn!("Error reading {} of executable: {}", stream.as_str(), e);
                    break;
                }
            }
        }
    })
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
        assert_eq!(trim_line_ending(b"\n"), b"");
    }

    #[tokio::test]
    async fn test_drain_splits_lines_and_keeps_tail() {
        let sink = MemorySink::new();
        let input: &[u8] = b"first\r\nsecond\n\nlast-without-newline";

        spawn_drain(input, OutputStream::Stdout, Arc::new(sink.clone()))
            .await
            .unwrap();

        assert_eq!(
            sink.lines(),
            vec!["first", "second", "", "last-without-newline"]
        );
    }

    #[tokio::test]
    async fn test_drain_replaces_invalid_utf8() {
        let sink = MemorySink::new();
        let input: &[u8] = b"ok \xff\xfe bytes\n";

        spawn_drain(input, OutputStream::Stderr, Arc::new(sink.clone()))
            .await
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
        assert!(lines[0].contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_drain_does_not_block_writer() {
        // A writer producing more than a pipe buffer's worth must not stall
        let (mut writer, reader) = tokio::io::duplex(64);
        let sink = MemorySink::new();
        let task = spawn_drain(reader, OutputStream::Stdout, Arc::new(sink.clone()));

        use tokio::io::AsyncWriteExt;
        for i in 0..1000 {
            writer.write_all(format!("line {}\n", i).as_bytes()).await.unwrap();
        }
        drop(writer);
        task.await.unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1000);
        assert_eq!(lines[999], "line 999");
    }
}
