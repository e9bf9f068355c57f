//! Append-only event journal stored as JSON lines.
//!
//! One [`SchedulerEvent`] per line, in the order the scheduler emitted
//! them. Loading the file and replaying it rebuilds the queue and history.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::core::{EventSink, SchedulerError, SchedulerEvent};

/// File-backed event journal using JSON lines for durability.
pub struct FileJournal {
    path: PathBuf,
    file: File,
    written: u64,
}

impl FileJournal {
    /// Open (or create) the journal at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| backend(&path, &e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| backend(&path, &e))?;
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    /// Journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events appended through this handle.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Append one event.
    pub fn append(&mut self, event: &SchedulerEvent) -> Result<(), SchedulerError> {
        let line =
            serde_json::to_string(event).map_err(|e| SchedulerError::Backend(e.to_string()))?;
        writeln!(self.file, "{line}").map_err(|e| backend(&self.path, &e))?;
        self.written += 1;
        Ok(())
    }

    /// Read every event in the journal at `path`. A missing file is empty.
    /// Blank lines are skipped; a malformed line fails the whole load.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<SchedulerEvent>, SchedulerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|e| backend(path, &e))?;
        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| backend(path, &e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: SchedulerEvent = serde_json::from_str(&line).map_err(|e| {
                SchedulerError::Backend(format!("{}:{}: {e}", path.display(), n + 1))
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

impl EventSink for FileJournal {
    fn record(&mut self, event: &SchedulerEvent) {
        if let Err(e) = self.append(event) {
            tracing::error!("failed to append {} event to journal: {}", event.job_id(), e);
        }
    }
}

fn backend(path: &Path, e: &std::io::Error) -> SchedulerError {
    SchedulerError::Backend(format!("{}: {e}", path.display()))
}
