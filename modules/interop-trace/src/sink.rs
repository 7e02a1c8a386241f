//! Size-bounded, append-only output for trace records.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

/// Outcome of handing one record to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkWrite {
    Written,
    /// Over budget. The record was discarded and the budget is now exhausted.
    Dropped,
    /// No backing writer (it could not be opened, or was already closed).
    Detached,
}

/// Append-only writer with a fixed byte budget.
///
/// Records are accepted whole or not at all. Once a record would cross the
/// budget the counter is pinned at `max_size` and every later record is
/// dropped, even ones that would individually fit.
pub struct BoundedSink {
    writer: Option<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
    bytes_written: u64,
    max_size: u64,
    exhausted_logged: bool,
}

impl BoundedSink {
    pub fn new(writer: impl Write + Send + 'static, max_size: u64) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            path: None,
            bytes_written: 0,
            max_size,
            exhausted_logged: false,
        }
    }

    /// A sink that accepts nothing.
    pub fn detached(max_size: u64) -> Self {
        Self {
            writer: None,
            path: None,
            bytes_written: 0,
            max_size,
            exhausted_logged: false,
        }
    }

    /// Open `dir/file_name` for writing, creating `dir` if needed.
    ///
    /// Failure degrades to a detached sink: tracing carries on, nothing is
    /// persisted.
    pub fn open_file(dir: &Path, file_name: &str, max_size: u64) -> Self {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "Could not create trace directory, trace will not be persisted");
            return Self::detached(max_size);
        }

        let path = dir.join(file_name);
        match File::create(&path) {
            Ok(file) => {
                info!(path = %path.display(), "Capturing trace");
                let mut sink = Self::new(BufWriter::new(file), max_size);
                sink.path = Some(path);
                sink
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open trace file, trace will not be persisted");
                Self::detached(max_size)
            }
        }
    }

    pub fn write_record(&mut self, record: &[u8]) -> SinkWrite {
        let Some(writer) = self.writer.as_mut() else {
            return SinkWrite::Detached;
        };

        let size = record.len() as u64;
        match self.bytes_written.checked_add(size) {
            Some(total) if total <= self.max_size => {
                self.bytes_written = total;
                if let Err(e) = writer.write_all(record) {
                    error!(error = %e, size, "Failed to serialize trace record");
                }
                SinkWrite::Written
            }
            _ => {
                self.bytes_written = self.max_size;
                if !self.exhausted_logged {
                    self.exhausted_logged = true;
                    warn!(max_size = self.max_size, "Trace byte budget exhausted, dropping further records");
                }
                SinkWrite::Dropped
            }
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.bytes_written >= self.max_size
    }

    pub fn is_attached(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the backing file, if this sink writes to one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                error!(error = %e, "Failed to flush trace sink");
            }
        }
    }

    /// Flush and release the writer. Later calls are no-ops.
    pub fn close(&mut self) {
        self.flush();
        self.writer = None;
    }
}

impl Drop for BoundedSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for BoundedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedSink")
            .field("path", &self.path)
            .field("attached", &self.writer.is_some())
            .field("bytes_written", &self.bytes_written)
            .field("max_size", &self.max_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryBuffer (tests, in-process inspection)
// ---------------------------------------------------------------------------

/// Shared in-memory writer. Clones see the same bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
