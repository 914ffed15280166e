//! Human-readable journey and machine-readable event records of a run.
//!
//! Components receive a [`RunJournal`] at construction instead of reaching
//! for a global logger.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Action {
        action: String,
        success: bool,
        message: String,
        x: Option<i32>,
        y: Option<i32>,
    },
    StateChange {
        subject: String,
        from: String,
        to: String,
    },
    Prediction {
        prediction_id: String,
        action: String,
        result: String,
    },
}

#[derive(Debug, Serialize)]
struct Stamped<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    entry: &'a JournalEntry,
}

pub trait RunJournal: Send + Sync {
    fn narrative(&self, line: &str);
    fn record(&self, entry: JournalEntry);
}

/// Sends everything through the `log` facade.
#[derive(Debug, Default)]
pub struct LogJournal;

impl RunJournal for LogJournal {
    fn narrative(&self, line: &str) {
        log::info!("{line}");
    }

    fn record(&self, entry: JournalEntry) {
        match serde_json::to_string(&entry) {
            Ok(json) => log::debug!("{json}"),
            Err(err) => log::warn!("failed to serialize journal entry: {err}"),
        }
    }
}

/// Appends `journey.log` (one sentence per line) and `events.jsonl`.
pub struct FileJournal {
    narrative: Mutex<File>,
    events: Mutex<File>,
}

impl FileJournal {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create journal directory {}", dir.display()))?;
        Ok(Self {
            narrative: Mutex::new(open_append(&dir.join("journey.log"))?),
            events: Mutex::new(open_append(&dir.join("events.jsonl"))?),
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open journal file {}", path.display()))
}

fn append_line(file: &Mutex<File>, line: &str) {
    let mut guard = match file.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(err) = writeln!(guard, "{line}") {
        log::warn!("failed to append journal line: {err}");
    }
}

impl RunJournal for FileJournal {
    fn narrative(&self, line: &str) {
        let stamped = format!("[{}] {line}", Utc::now().format("%H:%M:%S%.3f"));
        append_line(&self.narrative, &stamped);
    }

    fn record(&self, entry: JournalEntry) {
        let stamped = Stamped {
            timestamp: Utc::now(),
            entry: &entry,
        };
        match serde_json::to_string(&stamped) {
            Ok(json) => append_line(&self.events, &json),
            Err(err) => log::warn!("failed to serialize journal entry: {err}"),
        }
    }
}
