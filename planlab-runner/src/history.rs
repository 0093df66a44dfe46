//! Recommendation history — JSONL append-only record of published beams.
//!
//! Every time the scheduler publishes a beam, each member is persisted as one
//! JSON object per line, stamped with the cycle and the config hash it was
//! scored under. The history answers questions the live snapshot cannot:
//! "how long has this plan held rank one?", "what did the planner recommend
//! before the config change?".

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::beam::BeamEntry;

/// One history line: a beam member as published at the end of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub recorded_at: DateTime<Utc>,
    pub cycle: u64,
    pub config_hash: String,
    pub entry: BeamEntry,
}

/// JSONL history file manager.
///
/// Each line is an independent JSON object, so the format survives partial
/// writes and streams cheaply.
pub struct RecommendationHistory {
    path: PathBuf,
}

impl RecommendationHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a published beam, one line per entry.
    ///
    /// Returns the number of lines written. An empty beam writes nothing and
    /// does not create the file.
    pub fn append_beam(
        &self,
        cycle: u64,
        config_hash: &str,
        beam: &[BeamEntry],
    ) -> io::Result<usize> {
        if beam.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let recorded_at = Utc::now();
        for entry in beam {
            let record = HistoryRecord {
                recorded_at,
                cycle,
                config_hash: config_hash.to_string(),
                entry: entry.clone(),
            };
            let json = serde_json::to_string(&record)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{json}")?;
        }
        file.flush()?;

        Ok(beam.len())
    }

    /// Read all records from the history file.
    ///
    /// Skips malformed lines; a truncated tail never poisons the rest.
    pub fn read_all(&self) -> io::Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(record) => records.push(record),
                Err(_) => continue, // skip malformed lines
            }
        }

        Ok(records)
    }

    /// Current file size in bytes, zero when the file does not exist yet.
    pub fn file_size_bytes(&self) -> io::Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Path to the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Statistical summary of published recommendations at one plan depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSummary {
    pub count: usize,
    pub mean_composite: f64,
    pub best_composite: f64,
}

/// Group history records by plan depth and summarize their composites.
///
/// Useful for meta-analysis across a long session: do deeper plans actually
/// earn their extra trades?
pub fn summary_by_depth(records: &[HistoryRecord]) -> BTreeMap<usize, DepthSummary> {
    let mut groups: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.entry.depth)
            .or_default()
            .push(record.entry.composite);
    }

    groups
        .into_iter()
        .map(|(depth, composites)| {
            let count = composites.len();
            let mean_composite = composites.iter().sum::<f64>() / count as f64;
            let best_composite = composites.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (
                depth,
                DepthSummary {
                    count,
                    mean_composite,
                    best_composite,
                },
            )
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────
