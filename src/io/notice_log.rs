//! Local notice journal
//!
//! Appends every notice the node publishes to a dated local file, one
//! tab-separated line per notice: timestamp, topic, payload. Survives
//! coordinator outages; useful when reconstructing what the node reported.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Appends notice lines to `<dir>/notices-YYYYMMDD.log`, rolling the file
/// at midnight UTC.
pub struct NoticeJournal {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
    current_date: String,
}

impl NoticeJournal {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        info!(dir = %dir.display(), "notice_journal_initialized");
        Self { dir, writer: None, current_date: String::new() }
    }

    /// Append one notice line. IO failures are logged and swallowed; the
    /// journal never blocks publishing.
    pub fn append(&mut self, topic: &str, payload: &str) {
        let now = Utc::now();
        let date = now.format("%Y%m%d").to_string();

        if self.writer.is_none() || date != self.current_date {
            self.writer = self.open_for_date(&date);
            self.current_date = date;
        }

        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let line = format!("{}\t{}\t{}\n", now.to_rfc3339(), topic, payload);
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            warn!(error = %e, "notice_journal_write_failed");
            // Drop the writer; reopen on next append
            self.writer = None;
        }
    }

    fn open_for_date(&self, date: &str) -> Option<BufWriter<File>> {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(error = %e, dir = %self.dir.display(), "notice_journal_dir_failed");
            return None;
        }
        let path = self.dir.join(format!("notices-{date}.log"));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "notice_journal_open_failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_writes_tab_separated_line() {
        let dir = tempdir().unwrap();
        let mut journal = NoticeJournal::new(dir.path());

        journal.append("arduino/notice/occ_change", "1");
        journal.append("arduino/notice/log", "hello");

        let date = Utc::now().format("%Y%m%d").to_string();
        let path = dir.path().join(format!("notices-{date}.log"));
        let content = fs::read_to_string(path).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("arduino/notice/occ_change\t1"));
        assert!(lines[1].ends_with("arduino/notice/log\thello"));
    }

    #[test]
    fn test_append_to_unwritable_dir_does_not_panic() {
        let mut journal = NoticeJournal::new("/proc/acnode-nonexistent");
        journal.append("arduino/notice/log", "dropped");
    }
}
