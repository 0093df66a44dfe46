//! Sequence store — fingerprint-keyed persistence for plans and evaluations.
//!
//! Sequences and evaluations live in separate keyspaces on purpose:
//! regeneration wipes the sequence side while evaluations survive, so a
//! regenerated plan whose fingerprint was seen before reattaches to its
//! cached evaluation instead of being scored again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use planlab_core::domain::Sequence;
use planlab_core::evaluator::Evaluation;
use planlab_core::fingerprint::Fingerprint;

/// Persistence surface shared by the planning pass and the scheduler.
///
/// Implementations must be shareable across the scheduler thread and
/// foreground readers, hence `&self` methods and `Send + Sync`.
pub trait SequenceStore: Send + Sync {
    fn put_sequence(&self, sequence: &Sequence) -> Result<()>;
    fn get_sequence(&self, fingerprint: &Fingerprint) -> Result<Option<Sequence>>;
    fn remove_sequence(&self, fingerprint: &Fingerprint) -> Result<()>;
    /// All stored sequence fingerprints, sorted so iteration is reproducible.
    fn sequence_fingerprints(&self) -> Result<Vec<Fingerprint>>;
    fn sequence_count(&self) -> Result<usize>;

    fn put_evaluation(&self, evaluation: &Evaluation) -> Result<()>;
    fn get_evaluation(&self, fingerprint: &Fingerprint) -> Result<Option<Evaluation>>;
    fn evaluated_fingerprints(&self) -> Result<Vec<Fingerprint>>;
    fn evaluation_count(&self) -> Result<usize>;

    /// Drop every sequence but keep evaluation records. Regeneration calls
    /// this so prior scoring work is reused when fingerprints reappear.
    fn clear_sequences(&self) -> Result<()>;
    /// Drop sequences and evaluations both.
    fn clear_all(&self) -> Result<()>;
}

// ─── In-memory store ─────────────────────────────────────────────────

/// HashMap-backed store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryStore {
    sequences: RwLock<HashMap<Fingerprint, Sequence>>,
    evaluations: RwLock<HashMap<Fingerprint, Evaluation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_guard<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("store lock poisoned"))
}

fn write_guard<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("store lock poisoned"))
}

impl SequenceStore for MemoryStore {
    fn put_sequence(&self, sequence: &Sequence) -> Result<()> {
        write_guard(&self.sequences)?.insert(sequence.fingerprint.clone(), sequence.clone());
        Ok(())
    }

    fn get_sequence(&self, fingerprint: &Fingerprint) -> Result<Option<Sequence>> {
        Ok(read_guard(&self.sequences)?.get(fingerprint).cloned())
    }

    fn remove_sequence(&self, fingerprint: &Fingerprint) -> Result<()> {
        write_guard(&self.sequences)?.remove(fingerprint);
        Ok(())
    }

    fn sequence_fingerprints(&self) -> Result<Vec<Fingerprint>> {
        let mut fingerprints: Vec<Fingerprint> =
            read_guard(&self.sequences)?.keys().cloned().collect();
        fingerprints.sort();
        Ok(fingerprints)
    }

    fn sequence_count(&self) -> Result<usize> {
        Ok(read_guard(&self.sequences)?.len())
    }

    fn put_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        write_guard(&self.evaluations)?.insert(evaluation.fingerprint.clone(), evaluation.clone());
        Ok(())
    }

    fn get_evaluation(&self, fingerprint: &Fingerprint) -> Result<Option<Evaluation>> {
        Ok(read_guard(&self.evaluations)?.get(fingerprint).cloned())
    }

    fn evaluated_fingerprints(&self) -> Result<Vec<Fingerprint>> {
        let mut fingerprints: Vec<Fingerprint> =
            read_guard(&self.evaluations)?.keys().cloned().collect();
        fingerprints.sort();
        Ok(fingerprints)
    }

    fn evaluation_count(&self) -> Result<usize> {
        Ok(read_guard(&self.evaluations)?.len())
    }

    fn clear_sequences(&self) -> Result<()> {
        write_guard(&self.sequences)?.clear();
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        write_guard(&self.sequences)?.clear();
        write_guard(&self.evaluations)?.clear();
        Ok(())
    }
}

// ─── JSON-file store ─────────────────────────────────────────────────

/// One JSON document per fingerprint under `sequences/` and `evaluations/`
/// subdirectories of the store root. Fingerprints are blake3 hex, so they
/// are safe filenames as-is.
#[derive(Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("sequences"))
            .context("failed to create sequences directory")?;
        std::fs::create_dir_all(root.join("evaluations"))
            .context("failed to create evaluations directory")?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sequence_dir(&self) -> PathBuf {
        self.root.join("sequences")
    }

    fn evaluation_dir(&self) -> PathBuf {
        self.root.join("evaluations")
    }

    fn sequence_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.sequence_dir().join(format!("{fingerprint}.json"))
    }

    fn evaluation_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.evaluation_dir().join(format!("{fingerprint}.json"))
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize store document")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn remove_document(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

fn list_documents(dir: &Path) -> Result<Vec<Fingerprint>> {
    let mut fingerprints = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                fingerprints.push(Fingerprint(stem.to_string()));
            }
        }
    }
    fingerprints.sort();
    Ok(fingerprints)
}

fn clear_documents(dir: &Path) -> Result<()> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

impl SequenceStore for JsonFileStore {
    fn put_sequence(&self, sequence: &Sequence) -> Result<()> {
        write_document(&self.sequence_path(&sequence.fingerprint), sequence)
    }

    fn get_sequence(&self, fingerprint: &Fingerprint) -> Result<Option<Sequence>> {
        read_document(&self.sequence_path(fingerprint))
    }

    fn remove_sequence(&self, fingerprint: &Fingerprint) -> Result<()> {
        remove_document(&self.sequence_path(fingerprint))
    }

    fn sequence_fingerprints(&self) -> Result<Vec<Fingerprint>> {
        list_documents(&self.sequence_dir())
    }

    fn sequence_count(&self) -> Result<usize> {
        Ok(self.sequence_fingerprints()?.len())
    }

    fn put_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        write_document(&self.evaluation_path(&evaluation.fingerprint), evaluation)
    }

    fn get_evaluation(&self, fingerprint: &Fingerprint) -> Result<Option<Evaluation>> {
        read_document(&self.evaluation_path(fingerprint))
    }

    fn evaluated_fingerprints(&self) -> Result<Vec<Fingerprint>> {
        list_documents(&self.evaluation_dir())
    }

    fn evaluation_count(&self) -> Result<usize> {
        Ok(self.evaluated_fingerprints()?.len())
    }

    fn clear_sequences(&self) -> Result<()> {
        clear_documents(&self.sequence_dir())
    }

    fn clear_all(&self) -> Result<()> {
        clear_documents(&self.sequence_dir())?;
        clear_documents(&self.evaluation_dir())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
