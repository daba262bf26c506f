//! Append-only bank of queries that should have routed to Heavy

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::CalibrationError;

pub const FILE_NAME: &str = "hard_negatives.txt";

/// Deduplicated, never pruned; one normalized query per line on disk
#[derive(Debug)]
pub struct HardNegativeBank {
    path: PathBuf,
    entries: Vec<String>,
    seen: HashSet<String>,
    /// Index of the first entry not yet on disk
    flushed: usize,
    /// File ends in a torn line without its newline
    needs_separator: bool,
}

impl HardNegativeBank {
    /// Load `hard_negatives.txt` from `dir`; a missing file is an empty bank
    pub fn load(dir: &Path) -> Result<Self, CalibrationError> {
        let path = dir.join(FILE_NAME);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(CalibrationError::read(path, e)),
        };

        let mut bank = Self {
            path,
            entries: Vec::new(),
            seen: HashSet::new(),
            flushed: 0,
            needs_separator: !raw.is_empty() && !raw.ends_with('\n'),
        };
        bank.extend(raw.lines());
        bank.flushed = bank.entries.len();

        tracing::debug!(entries = bank.entries.len(), path = %bank.path.display(), "hard negative bank loaded");
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, query: &str) -> bool {
        self.seen.contains(&normalize(query))
    }

    /// Entries added but not yet written
    pub fn unflushed(&self) -> usize {
        self.entries.len() - self.flushed
    }

    /// Add queries not seen before; returns how many were new
    pub fn extend<'a>(&mut self, queries: impl IntoIterator<Item = &'a str>) -> usize {
        let before = self.entries.len();

        for query in queries {
            let query = normalize(query);
            if !query.is_empty() && self.seen.insert(query.clone()) {
                self.entries.push(query);
            }
        }

        self.entries.len() - before
    }

    /// Append unwritten entries to the file
    ///
    /// On failure the entries stay queued and the next flush retries them.
    pub fn flush(&mut self) -> Result<(), CalibrationError> {
        if self.flushed == self.entries.len() {
            return Ok(());
        }

        let mut lines = String::new();
        if self.needs_separator {
            lines.push('\n');
        }
        for entry in &self.entries[self.flushed..] {
            lines.push_str(entry);
            lines.push('\n');
        }

        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            file.write_all(lines.as_bytes())?;
            file.sync_data()
        };
        write().map_err(|e| CalibrationError::persistence(&self.path, e))?;

        self.flushed = self.entries.len();
        self.needs_separator = false;
        Ok(())
    }
}

/// Single line with collapsed whitespace
pub fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
