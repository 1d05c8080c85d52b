//! Local log files kept next to the data directory. Diagnostics that must
//! never reach the notification channel end up here.

use crate::error::Result;

use chrono::{DateTime, Local};
use log::warn;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append(&self, file: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        f.write_all(text.as_bytes())?;
        Ok(())
    }

    /// One timestamped line in `changes.log`.
    pub fn entry(&self, msg: &str) -> Result<()> {
        self.entry_at(Local::now(), msg)
    }

    /// Like `entry`, but a failure to write is only logged.
    pub fn note(&self, msg: &str) {
        if let Err(err) = self.entry(msg) {
            warn!("could not write to {}: {err}", self.dir.join("changes.log").display());
        }
    }

    fn entry_at(&self, now: DateTime<Local>, msg: &str) -> Result<()> {
        let line = format!("{}: {}\n", now.format("%Y-%m-%d-%H:%M"), msg);
        self.append("changes.log", &line)
    }

    /// Keeps an unreadable payload for later, in `<date>_error.log`.
    pub fn parse_failure(&self, payload: &str) -> Result<PathBuf> {
        let now = Local::now();
        let file = format!("{}_error.log", now.format("%Y-%m-%d"));
        let text = format!("{}\n{}\n\n", now.format("### %Y-%m-%d : %H:%M"), payload);
        self.append(&file, &text)?;
        Ok(self.dir.join(file))
    }

    /// Overwrites `<name>_dump.json` with the latest payload.
    pub fn dump(&self, name: &str, payload: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let name = name.trim().replace(' ', "_").to_lowercase();
        let path = self.dir.join(format!("{name}_dump.json"));
        fs::write(&path, payload)?;
        Ok(path)
    }
}
