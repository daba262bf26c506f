//! Atomic persistence of cycle records and the rolling summary

use std::collections::{BTreeMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use superhelfer_routing::Tier;
use tempfile::NamedTempFile;

use crate::CalibrationError;
use crate::corpus::Category;
use crate::kpi::{ConfusionMatrix, Kpis, Misroute};

pub const LATEST_FILE: &str = "latest.json";

/// Record of one calibration pass; never rewritten once persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCycle {
    pub cycle_id: u64,
    pub timestamp: Timestamp,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub cost_score: f64,
    pub heavy_recall: Option<f64>,
    pub expected_counts: BTreeMap<Tier, usize>,
    pub routed_counts: BTreeMap<Tier, usize>,
    pub confusion: ConfusionMatrix,
    pub category_accuracy: BTreeMap<Category, f64>,
    pub top_misroutes: Vec<Misroute>,
    /// Hard negatives first seen in this cycle
    pub new_hard_negatives: usize,
    pub hard_negative_total: usize,
}

impl CalibrationCycle {
    pub fn new(cycle_id: u64, timestamp: Timestamp, kpis: Kpis, new_hard_negatives: usize, hard_negative_total: usize) -> Self {
        Self {
            cycle_id,
            timestamp,
            total: kpis.total,
            correct: kpis.correct,
            accuracy: kpis.accuracy,
            cost_score: kpis.cost_score,
            heavy_recall: kpis.heavy_recall,
            expected_counts: kpis.expected_counts,
            routed_counts: kpis.routed_counts,
            confusion: kpis.confusion,
            category_accuracy: kpis.category_accuracy,
            top_misroutes: kpis.top_misroutes,
            new_hard_negatives,
            hard_negative_total,
        }
    }

    pub fn file_name(cycle_id: u64) -> String {
        format!("cycle_{cycle_id}.json")
    }
}

/// Contents of `latest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSummary {
    pub updated_at: Timestamp,
    pub window: usize,
    pub mean_accuracy: f64,
    pub mean_cost_score: f64,
    /// Mean over the cycles that expected Heavy queries
    pub mean_heavy_recall: Option<f64>,
    /// Oldest first
    pub cycles: Vec<CalibrationCycle>,
}

impl RollingSummary {
    pub fn from_cycles(updated_at: Timestamp, window: usize, cycles: Vec<CalibrationCycle>) -> Self {
        let mean = |values: Vec<f64>| (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);

        Self {
            updated_at,
            window,
            mean_accuracy: mean(cycles.iter().map(|c| c.accuracy).collect()).unwrap_or(0.0),
            mean_cost_score: mean(cycles.iter().map(|c| c.cost_score).collect()).unwrap_or(0.0),
            mean_heavy_recall: mean(cycles.iter().filter_map(|c| c.heavy_recall).collect()),
            cycles,
        }
    }
}

#[derive(Debug)]
struct PendingWrite {
    path: PathBuf,
    bytes: Vec<u8>,
    replace: bool,
}

/// Writes cycle files and the rolling summary into one directory
///
/// Every write goes to a temp file in the same directory, is synced and
/// renamed into place, then the directory is synced. Failed writes stay
/// queued and are retried before the next commit.
#[derive(Debug)]
pub struct CycleStore {
    dir: PathBuf,
    window: usize,
    recent: VecDeque<CalibrationCycle>,
    next_id: u64,
    pending: Vec<PendingWrite>,
}

impl CycleStore {
    /// Open `dir`, creating it if needed
    ///
    /// Cycle ids resume after the highest existing `cycle_<id>.json`; the
    /// rolling window is restored from `latest.json` when it parses.
    pub fn open(dir: impl Into<PathBuf>, window: usize) -> Result<Self, CalibrationError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CalibrationError::persistence(&dir, e))?;

        let mut highest = 0;
        for entry in fs::read_dir(&dir).map_err(|e| CalibrationError::read(&dir, e))? {
            let entry = entry.map_err(|e| CalibrationError::read(&dir, e))?;
            if let Some(id) = entry.file_name().to_str().and_then(parse_cycle_id) {
                highest = highest.max(id);
            }
        }

        let recent = load_summary(&dir.join(LATEST_FILE))
            .map(|summary| {
                let skip = summary.cycles.len().saturating_sub(window);
                summary.cycles.into_iter().skip(skip).collect()
            })
            .unwrap_or_default();

        tracing::debug!(dir = %dir.display(), next_id = highest + 1, "calibration store opened");

        Ok(Self {
            dir,
            window,
            recent,
            next_id: highest + 1,
            pending: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Cycles in the rolling window, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &CalibrationCycle> {
        self.recent.iter()
    }

    /// Mean accuracy over the rolling window
    pub fn recent_accuracy(&self) -> Option<f64> {
        (!self.recent.is_empty()).then(|| self.recent.iter().map(|c| c.accuracy).sum::<f64>() / self.recent.len() as f64)
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Queue the cycle file and a fresh summary, then flush every pending write
    pub fn commit(&mut self, cycle: CalibrationCycle) -> Result<(), CalibrationError> {
        self.next_id = self.next_id.max(cycle.cycle_id + 1);

        let cycle_path = self.dir.join(CalibrationCycle::file_name(cycle.cycle_id));
        let cycle_bytes = serde_json::to_vec_pretty(&cycle)?;

        self.recent.push_back(cycle);
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }

        let summary = RollingSummary::from_cycles(Timestamp::now(), self.window, self.recent.iter().cloned().collect());
        let summary_bytes = serde_json::to_vec_pretty(&summary)?;

        let latest_path = self.dir.join(LATEST_FILE);

        // An older summary still waiting is superseded
        self.pending.retain(|w| w.path != latest_path);
        self.pending.push(PendingWrite {
            path: cycle_path,
            bytes: cycle_bytes,
            replace: false,
        });
        self.pending.push(PendingWrite {
            path: latest_path,
            bytes: summary_bytes,
            replace: true,
        });

        self.flush_pending()
    }

    /// Retry queued writes in order; returns the last failure
    pub fn flush_pending(&mut self) -> Result<(), CalibrationError> {
        let mut failure = None;

        let pending = std::mem::take(&mut self.pending);
        for write in pending {
            match write_atomic(&self.dir, &write.path, &write.bytes, write.replace) {
                Ok(()) => {
                    tracing::debug!(path = %write.path.display(), "calibration artifact written");
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!(path = %write.path.display(), "cycle file already exists, not overwriting");
                }
                Err(e) => {
                    tracing::warn!(path = %write.path.display(), error = %e, "calibration write failed, will retry");
                    failure = Some(CalibrationError::persistence(&write.path, e));
                    self.pending.push(write);
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }
}

fn parse_cycle_id(name: &str) -> Option<u64> {
    name.strip_prefix("cycle_")?.strip_suffix(".json")?.parse().ok()
}

fn load_summary(path: &Path) -> Option<RollingSummary> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read rolling summary");
            return None;
        }
    };

    serde_json::from_slice(&raw)
        .inspect_err(|e| tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable rolling summary"))
        .ok()
}

/// Temp file in `dir`, fsync, rename over `path`, fsync `dir`
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8], replace: bool) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if replace {
        tmp.persist(path).map_err(|e| e.error)?;
    } else {
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
    }

    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
