//! Leveled output for commands and the engine.
//!
//! [`OutputChannel`] is a cheap, cloneable handle over one shared writer and
//! one shared verbosity level. The engine, every runtime handle and the task
//! supervisor hold clones of the same channel, so swapping the writer or the
//! level through any of them is seen by all.
//!
//! # Levels
//!
//! | Call          | Written when            |
//! |---------------|-------------------------|
//! | `info`/`warn` | always                  |
//! | `error`       | always                  |
//! | `debug`       | level is `Debug`        |
//! | `write_json`  | level is `Normal` or up |
//! | `write_table` | level is `Normal` or up |

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// A writer shared between clones of an [`OutputChannel`].
pub type SharedWriter = Box<dyn Write + Send>;

/// Output verbosity, ordered from least to most chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputLevel::Quiet => "quiet",
            OutputLevel::Normal => "normal",
            OutputLevel::Verbose => "verbose",
            OutputLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Returned when a string names no [`OutputLevel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output level: {0} (expected quiet, normal, verbose or debug)")]
pub struct ParseLevelError(pub String);

impl FromStr for OutputLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" => Ok(OutputLevel::Quiet),
            "normal" => Ok(OutputLevel::Normal),
            "verbose" => Ok(OutputLevel::Verbose),
            "debug" => Ok(OutputLevel::Debug),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Severity of a queued [`OutputMessage`]. Ordering is info < warning < error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// A message queued on a command result, rendered after execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMessage {
    pub level: Severity,
    pub content: String,
}

impl OutputMessage {
    pub fn new(level: Severity, content: impl Into<String>) -> Self {
        Self {
            level,
            content: content.into(),
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(Severity::Info, content)
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self::new(Severity::Warning, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Severity::Error, content)
    }
}

/// Leveled writer handle.
#[derive(Clone)]
pub struct OutputChannel {
    writer: Arc<Mutex<SharedWriter>>,
    level: Arc<RwLock<OutputLevel>>,
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChannel")
            .field("level", &self.level())
            .finish_non_exhaustive()
    }
}

impl Default for OutputChannel {
    fn default() -> Self {
        Self::stdout()
    }
}

impl OutputChannel {
    pub fn new(writer: SharedWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            level: Arc::new(RwLock::new(OutputLevel::Normal)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn level(&self) -> OutputLevel {
        *self.level.read()
    }

    pub fn set_level(&self, level: OutputLevel) {
        *self.level.write() = level;
    }

    /// Replaces the underlying writer, returning the previous one.
    pub fn replace_writer(&self, writer: SharedWriter) -> SharedWriter {
        std::mem::replace(&mut *self.writer.lock(), writer)
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.line(msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.line(&format!("WARNING: {}", msg.as_ref()));
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.line(&format!("ERROR: {}", msg.as_ref()));
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        if self.level() >= OutputLevel::Debug {
            self.line(msg.as_ref());
        }
    }

    /// Writes `value` as indented JSON.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) {
        if self.level() < OutputLevel::Normal {
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(text) => self.line(&text),
            Err(e) => self.error(format!("failed to encode json: {}", e)),
        }
    }

    /// Writes a borderless table. Does nothing without headers.
    pub fn write_table<H, R, C>(&self, headers: &[H], rows: &[R])
    where
        H: AsRef<str>,
        R: AsRef<[C]>,
        C: AsRef<str>,
    {
        if self.level() < OutputLevel::Normal || headers.is_empty() {
            return;
        }
        let headers: Vec<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();
        let rows: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.as_ref().iter().map(AsRef::as_ref).collect())
            .collect();
        self.line(&format_table(&headers, &rows));
    }

    /// Renders queued messages ordered by severity. The sort is stable.
    pub fn aggregate_messages(&self, messages: &[OutputMessage]) {
        let mut ordered: Vec<&OutputMessage> = messages.iter().collect();
        ordered.sort_by_key(|m| m.level);
        for msg in ordered {
            match msg.level {
                Severity::Info => self.info(&msg.content),
                Severity::Warning => self.warn(&msg.content),
                Severity::Error => self.error(&msg.content),
            }
        }
    }

    fn line(&self, text: &str) {
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", text).and_then(|_| writer.flush()) {
            warn!(error = %e, "failed to write output");
        }
    }
}

fn format_table(headers: &[&str], rows: &[Vec<&str>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| format!(" {:<w$} ", headers.get(i).copied().unwrap_or(""), w = *w))
        .collect();
    let mut out = format!("|{}|", header_cells.join("|"));

    for row in rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:<w$}", row.get(i).copied().unwrap_or(""), w = *w))
            .collect();
        out.push_str("\n  ");
        out.push_str(&cells.join("   "));
    }
    out
}

/// In-memory writer whose clones share one buffer. Handy in tests.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }

    /// A boxed clone suitable for [`OutputChannel::new`].
    pub fn writer(&self) -> SharedWriter {
        Box::new(self.clone())
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn capture() -> (OutputChannel, CaptureBuffer) {
        let buf = CaptureBuffer::new();
        (OutputChannel::new(buf.writer()), buf)
    }

    #[test]
    fn test_prefixes() {
        let (out, buf) = capture();
        out.info("hello");
        out.warn("careful");
        out.error("broken");
        assert_eq!(buf.contents(), "hello\nWARNING: careful\nERROR: broken\n");
    }

    #[test]
    fn test_debug_needs_debug_level() {
        let (out, buf) = capture();
        out.debug("hidden");
        assert_eq!(buf.contents(), "");
        out.set_level(OutputLevel::Debug);
        out.debug("shown");
        assert_eq!(buf.contents(), "shown\n");
    }

    #[test]
    fn test_quiet_suppresses_structured_output() {
        let (out, buf) = capture();
        out.set_level(OutputLevel::Quiet);
        out.write_json(&json!({"a": 1}));
        out.write_table(&["A"], &[vec!["1"]]);
        out.error("still here");
        assert_eq!(buf.contents(), "ERROR: still here\n");
    }

    #[test]
    fn test_write_json_pretty() {
        let (out, buf) = capture();
        out.write_json(&json!({"name": "web"}));
        assert_eq!(buf.contents(), "{\n  \"name\": \"web\"\n}\n");
    }

    #[test]
    fn test_write_table_layout() {
        let (out, buf) = capture();
        out.write_table(
            &["Name", "Port"],
            &[vec!["alpha", "80"], vec!["b", "8080"]],
        );
        assert_eq!(
            buf.contents(),
            "| Name  | Port |\n  alpha   80  \n  b       8080\n"
        );
    }

    #[test]
    fn test_write_table_without_headers() {
        let (out, buf) = capture();
        let rows: Vec<Vec<&str>> = vec![vec!["x"]];
        out.write_table::<&str, _, _>(&[], &rows);
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_aggregate_orders_by_severity() {
        let (out, buf) = capture();
        out.aggregate_messages(&[
            OutputMessage::error("e1"),
            OutputMessage::info("i1"),
            OutputMessage::warning("w1"),
            OutputMessage::info("i2"),
        ]);
        assert_eq!(buf.contents(), "i1\ni2\nWARNING: w1\nERROR: e1\n");
    }

    #[test]
    fn test_replace_writer() {
        let (out, first) = capture();
        let second = CaptureBuffer::new();
        let clone = out.clone();
        let _previous = out.replace_writer(second.writer());
        clone.info("routed");
        assert_eq!(first.contents(), "");
        assert_eq!(second.contents(), "routed\n");
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("Verbose".parse::<OutputLevel>(), Ok(OutputLevel::Verbose));
        let err = "loud".parse::<OutputLevel>().unwrap_err();
        assert_eq!(err, ParseLevelError("loud".into()));
        assert!(err.to_string().starts_with("unknown output level: loud"));
        assert!(OutputLevel::Quiet < OutputLevel::Debug);
    }
}
