//! Per-request log buffers and the shared sink they are flushed to.
//!
//! A [`ScopedLogger`] is owned by exactly one request. Lines are appended in
//! memory while the request is processed and written to the [`LogSink`] as one
//! block when it finishes:
//!
//! ```text
//! ====
//! [GET] 203.0.113.7:51234 /
//! Rendering s396-2009: 100 voters, 3 options
//! FINISHED IN 1.52ms
//! ```
//!
//! # Locking
//!
//! Appending needs no shared lock. The sink holds a single mutex that is taken
//! for the duration of one block write only, so blocks from concurrent
//! requests never interleave.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// First line of every request block.
pub const BLOCK_DELIMITER: &str = "====";

/// Prefix of the last line of every request block.
pub const FINISHED_PREFIX: &str = "FINISHED IN";

/// Last line of a block whose request was dropped before it finished.
pub const CANCELLED_PREFIX: &str = "CANCELLED AFTER";

/// In-memory log buffer for a single request.
#[derive(Debug)]
pub struct ScopedLogger {
    lines: Vec<String>,
    started_at: Instant,
}

impl ScopedLogger {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Append one line. A trailing newline is dropped; the block renderer
    /// terminates every line itself.
    pub fn write(&mut self, text: impl Into<String>) {
        let mut line = text.into();
        if line.ends_with('\n') {
            line.pop();
        }
        self.lines.push(line);
    }

    /// Append one formatted line.
    ///
    /// ```rust,ignore
    /// logger.printf(format_args!("[{}] {}", method, uri));
    /// ```
    pub fn printf(&mut self, args: fmt::Arguments<'_>) {
        self.write(fmt::format(args));
    }

    /// Time since the logger was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Append the closing `FINISHED IN <elapsed>` line and return the elapsed time.
    pub fn finish(&mut self) -> Duration {
        let elapsed = self.elapsed();
        self.printf(format_args!("{FINISHED_PREFIX} {elapsed:?}"));
        elapsed
    }

    /// Render the buffer as one newline-terminated block.
    pub fn render(&self) -> String {
        let capacity = self.lines.iter().map(|l| l.len() + 1).sum();
        let mut block = String::with_capacity(capacity);
        for line in &self.lines {
            block.push_str(line);
            block.push('\n');
        }
        block
    }

    /// Write the whole buffer to `sink` as one contiguous block.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error; the buffer is left untouched.
    pub fn flush_to(&self, sink: &LogSink) -> io::Result<usize> {
        sink.write_block(self.render().as_bytes())
    }
}

impl Default for ScopedLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide append target for request blocks.
///
/// Cloning is cheap; all clones share the same writer and lock.
#[derive(Clone)]
pub struct LogSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    /// Sink writing to the process's standard error.
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    /// Create (or truncate) the file at `path` and write to it.
    ///
    /// # Errors
    ///
    /// Returns the error from creating the file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write `block` atomically with respect to other blocks.
    ///
    /// The lock is held for the write and flush only. The write is blocking
    /// and runs on the calling tokio worker: a slow file or stderr stalls that
    /// worker, and every other request waiting for the sink lock with it.
    pub fn write_block(&self, block: &[u8]) -> io::Result<usize> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(block)?;
        out.flush()?;
        Ok(block.len())
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_and_printf_append_lines() {
        let mut logger = ScopedLogger::new();
        logger.write("first");
        logger.printf(format_args!("second {}", 2));
        logger.write("third\n");

        assert_eq!(logger.lines(), ["first", "second 2", "third"]);
    }

    #[test]
    fn test_render_terminates_every_line() {
        let mut logger = ScopedLogger::new();
        logger.write(BLOCK_DELIMITER);
        logger.write("line");

        assert_eq!(logger.render(), "====\nline\n");
    }

    #[test]
    fn test_finish_appends_duration_line() {
        let mut logger = ScopedLogger::new();
        std::thread::sleep(Duration::from_millis(2));
        let elapsed = logger.finish();

        assert!(elapsed >= Duration::from_millis(2));
        let last = logger.lines().last().unwrap();
        assert!(last.starts_with("FINISHED IN "), "got {last}");
    }

    #[test]
    fn test_flush_writes_block_and_reports_bytes() {
        let buffer = Buffer::default();
        let sink = LogSink::from_writer(buffer.clone());

        let mut logger = ScopedLogger::new();
        logger.write("hello");
        let written = logger.flush_to(&sink).unwrap();

        assert_eq!(written, "hello\n".len());
        assert_eq!(buffer.contents(), "hello\n");
    }

    #[test]
    fn test_flush_error_propagates() {
        let sink = LogSink::from_writer(Broken);
        let mut logger = ScopedLogger::new();
        logger.write("lost");

        let err = logger.flush_to(&sink).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_concurrent_flushes_do_not_interleave() {
        let buffer = Buffer::default();
        let sink = LogSink::from_writer(buffer.clone());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for round in 0..25 {
                        let mut logger = ScopedLogger::new();
                        logger.write(BLOCK_DELIMITER);
                        for step in 0..5 {
                            logger.printf(format_args!("worker={worker} round={round} step={step}"));
                        }
                        logger.flush_to(&sink).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = buffer.contents();
        let blocks: Vec<&str> = contents.split("====\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(blocks.len(), 8 * 25);
        for block in blocks {
            let owners: std::collections::HashSet<&str> = block
                .lines()
                .map(|l| l.split(" step=").next().unwrap())
                .collect();
            assert_eq!(owners.len(), 1, "interleaved block: {block}");
        }
    }

    #[test]
    fn test_create_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.log");
        let sink = LogSink::create(&path).unwrap();

        sink.write_block(b"====\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "====\n");
    }
}
