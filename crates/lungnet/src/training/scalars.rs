//! Run artifacts: an append-only JSONL scalar store and a timestamped,
//! human-readable epoch log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde::Serialize;

/// One observation in a scalar time series.
#[derive(Debug, Serialize)]
struct ScalarPoint<'a> {
    tag: &'a str,
    step: usize,
    value: f64,
    unix_ms: i64,
}

/// Append-only JSONL store for scalar metric time series.
///
/// Each line is one JSON object: `{"tag", "step", "value", "unix_ms"}`.
/// Tags are slash-separated, e.g. `train/loss_ce` or
/// `internal_test/accuracy`.
pub struct ScalarLogger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ScalarLogger {
    /// Open (or create) `scalars.jsonl` inside `run_dir`.
    pub fn create(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join("scalars.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open scalar log at {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Append one observation for `tag` at `step`.
    pub fn log(&mut self, tag: &str, step: usize, value: f64) -> Result<()> {
        let point = ScalarPoint {
            tag,
            step,
            value,
            unix_ms: Utc::now().timestamp_millis(),
        };
        serde_json::to_writer(&mut self.writer, &point)
            .context("Failed to serialize scalar observation")?;
        self.writer
            .write_all(b"\n")
            .with_context(|| format!("Failed to append to scalar log at {}", self.path.display()))
    }

    /// Flush buffered observations to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush scalar log at {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Human-readable text log named `<YYYY-MM-DD-HH-MM-SS>_train.txt` after
/// the run start time. Lines are flushed as written so earlier epochs
/// survive a mid-run crash.
pub struct EpochLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl EpochLog {
    /// Create the log file inside `run_dir`, stamped with the current time.
    pub fn create(run_dir: &Path) -> Result<Self> {
        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let path = run_dir.join(format!("{stamp}_train.txt"));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create epoch log at {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Append one line prefixed with the wall-clock time, `[HH:MM:SS.mmm]`.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let stamp = Local::now().format("%H:%M:%S%.3f");
        writeln!(self.writer, "[{stamp}] {line}")
            .with_context(|| format!("Failed to append to epoch log at {}", self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush epoch log at {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
