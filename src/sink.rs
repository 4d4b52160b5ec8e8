//! Output sinks for rendered traces and log records.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

/// A shareable, line-oriented output stream.
///
/// Clones write to the same underlying stream. Lines are written under a
/// single lock so traces from concurrent reporters do not interleave.
///
/// # Examples
///
/// ```
/// use compliant_logging::{MemorySink, SharedSink};
///
/// let memory = MemorySink::new();
/// let sink = SharedSink::from(memory.clone());
///
/// sink.write_lines(["SystemLog: first", "SystemLog: second"]).unwrap();
/// assert_eq!(memory.lines(), vec!["SystemLog: first", "SystemLog: second"]);
/// ```
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl SharedSink {
    /// Wraps an arbitrary writer.
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// The process's standard error stream.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// The process's standard output stream.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes each line followed by a newline, then flushes.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error. Lines before it may already have been
    /// written.
    pub fn write_lines<I, S>(&self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut writer = self.lock();
        for line in lines {
            writer.write_all(line.as_ref().as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    fn lock(&self) -> MutexGuard<'_, dyn Write + Send + 'static> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SharedSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSink").finish_non_exhaustive()
    }
}

impl From<MemorySink> for SharedSink {
    fn from(sink: MemorySink) -> Self {
        Self::new(sink)
    }
}

/// In-memory sink for capturing output.
///
/// Clones share the same buffer, so one clone can be handed to a
/// [`SharedSink`] or a `tracing` subscriber while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discards the captured output.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemorySink {
    type Writer = MemorySink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
