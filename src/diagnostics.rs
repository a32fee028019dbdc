use chrono::Local;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sink for recoverable per-file problems (unreadable images, walk errors).
///
/// The ranker owns one of these instead of writing to a process-wide logger,
/// so each search decides where its warnings go.
pub trait Diagnostics {
    fn warn(&self, message: &str);
}

impl<T: Diagnostics + ?Sized> Diagnostics for &T {
    fn warn(&self, message: &str) {
        (**self).warn(message)
    }
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Append-only warning log on disk, one `<timestamp> - WARNING - <message>`
/// line per warning. The file is opened per write and closed straight away.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub const DEFAULT_FILE: &'static str = "errors_log.txt";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            out,
            "{} - WARNING - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            message
        )
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FILE)
    }
}

impl Diagnostics for ErrorLog {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
        if let Err(e) = self.append(message) {
            log::error!("Failed to append to {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps warnings in memory. Handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    warnings: RefCell<Vec<String>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.borrow().is_empty()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn error_log_appends_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("errors_log.txt");

        ErrorLog::new(&path).warn("first problem");
        ErrorLog::new(&path).warn("second problem");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - WARNING - first problem"));
        assert!(lines[1].ends_with(" - WARNING - second problem"));
    }

    #[test]
    fn error_log_lines_start_with_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let log = ErrorLog::new(temp_dir.path().join("log.txt"));
        log.warn("oops");

        let content = fs::read_to_string(log.path()).unwrap();
        let stamp = content.split(" - ").next().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S,%3f").is_ok());
    }

    #[test]
    fn recording_diagnostics_through_reference() {
        fn emit(sink: impl Diagnostics) {
            sink.warn("borrowed");
        }

        let recorder = RecordingDiagnostics::new();
        emit(&recorder);

        assert_eq!(recorder.warnings(), vec!["borrowed".to_string()]);
    }
}
