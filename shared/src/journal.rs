//! Append-only audit journal.
//!
//! The journal is the canonical history of the registry: every successful
//! creation and vote is appended here before it becomes visible in memory,
//! and [`crate::store::PollStore::restore`] rebuilds all state from it.
//! Entries are chained with SHA-256 so a reader can detect edits or gaps.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;
use tracing::{debug, error, info};

use crate::error::{PollError, Result};
use crate::models::{Identity, PollId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AuditEvent {
    #[serde(rename_all = "camelCase")]
    PollCreated {
        poll_id: PollId,
        question: String,
        options: Vec<String>,
        #[serde(with = "time::serde::timestamp")]
        end_time: OffsetDateTime,
    },
    #[serde(rename_all = "camelCase")]
    Voted {
        poll_id: PollId,
        identity: Identity,
        option_index: usize,
    },
}

impl AuditEvent {
    pub fn poll_id(&self) -> PollId {
        match self {
            AuditEvent::PollCreated { poll_id, .. } | AuditEvent::Voted { poll_id, .. } => *poll_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub sequence: u64,
    pub event: AuditEvent,
    pub prev_hash: String,
    pub hash: String,
}

fn entry_hash(sequence: u64, prev_hash: &str, event: &AuditEvent) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_be_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(serde_json::to_vec(event)?);
    Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// Checks that sequences are dense from 1 and every hash links to its
/// predecessor.
pub fn verify_chain(entries: &[JournalEntry]) -> Result<()> {
    let mut prev_hash = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let expected_seq = i as u64 + 1;
        if entry.sequence != expected_seq {
            return Err(PollError::Journal(format!(
                "sequence gap: expected {}, found {}", expected_seq, entry.sequence
            )));
        }
        if entry.prev_hash != prev_hash {
            return Err(PollError::Journal(format!("broken link at entry {}", entry.sequence)));
        }
        if entry_hash(entry.sequence, &entry.prev_hash, &entry.event)? != entry.hash {
            return Err(PollError::Journal(format!("hash mismatch at entry {}", entry.sequence)));
        }
        prev_hash = entry.hash.clone();
    }
    Ok(())
}

/// Durable, ordered sink for audit events.
pub trait Journal: Send + Sync {
    /// Appends `event`, returning the sealed entry. An `Err` means nothing was
    /// recorded.
    fn append(&self, event: AuditEvent) -> Result<JournalEntry>;

    /// Up to `limit` entries with a sequence greater than `sequence`.
    fn entries_page(&self, sequence: u64, limit: usize) -> Result<Vec<JournalEntry>>;

    fn entries_since(&self, sequence: u64) -> Result<Vec<JournalEntry>> {
        self.entries_page(sequence, usize::MAX)
    }

    fn entries(&self) -> Result<Vec<JournalEntry>> {
        self.entries_since(0)
    }
}

#[derive(Debug, Default)]
struct Chain {
    entries: Vec<JournalEntry>,
}

impl Chain {
    fn seal(&self, event: AuditEvent) -> Result<JournalEntry> {
        let sequence = self.entries.len() as u64 + 1;
        let prev_hash = self.entries.last().map(|e| e.hash.clone()).unwrap_or_default();
        let hash = entry_hash(sequence, &prev_hash, &event)?;
        Ok(JournalEntry { sequence, event, prev_hash, hash })
    }

    fn page(&self, sequence: u64, limit: usize) -> Vec<JournalEntry> {
        let start = usize::try_from(sequence).unwrap_or(usize::MAX).min(self.entries.len());
        self.entries[start..].iter().take(limit).cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryJournal {
    chain: Mutex<Chain>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts already-sealed entries, e.g. ones shipped from another node.
    pub fn from_entries(entries: Vec<JournalEntry>) -> Result<Self> {
        verify_chain(&entries)?;
        Ok(Self { chain: Mutex::new(Chain { entries }) })
    }
}

impl Journal for MemoryJournal {
    fn append(&self, event: AuditEvent) -> Result<JournalEntry> {
        let mut chain = self.chain.lock().map_err(|_| PollError::LockFailed)?;
        let entry = chain.seal(event)?;
        chain.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries_page(&self, sequence: u64, limit: usize) -> Result<Vec<JournalEntry>> {
        let chain = self.chain.lock().map_err(|_| PollError::LockFailed)?;
        Ok(chain.page(sequence, limit))
    }
}

/// JSON-lines journal, one entry per line, synced on every append.
///
/// A failed append truncates the file back to the end of the last good
/// entry, so a half-written line never survives into the next open.
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    inner: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    chain: Chain,
    file: File,
    good_len: u64,
}

impl FileJournal {
    /// Opens or creates the journal at `path`, verifying any existing history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };
        verify_chain(&entries)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let good_len = file.metadata()?.len();
        info!("📒 Opened journal {} with {} entries", path.display(), entries.len());

        Ok(Self {
            path,
            inner: Mutex::new(FileState {
                chain: Chain { entries },
                file,
                good_len,
            }),
        })
    }

    fn load(path: &Path) -> Result<Vec<JournalEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str::<JournalEntry>(&line)
                .map_err(|e| PollError::Journal(format!("corrupt entry on line {}: {}", n + 1, e)))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swaps the underlying handle so tests can make writes fail.
    #[cfg(test)]
    pub(crate) fn replace_handle(&self, file: File) {
        if let Ok(mut state) = self.inner.lock() {
            state.file = file;
        }
    }
}

impl Journal for FileJournal {
    fn append(&self, event: AuditEvent) -> Result<JournalEntry> {
        let mut state = self.inner.lock().map_err(|_| PollError::LockFailed)?;
        let entry = state.chain.seal(event)?;

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        if let Err(e) = state.file.write_all(&line).and_then(|_| state.file.sync_data()) {
            error!("Failed to append to journal {}: {}", self.path.display(), e);
            let good_len = state.good_len;
            if let Err(rollback) = state.file.set_len(good_len) {
                error!("Failed to roll journal {} back to {} bytes: {}", self.path.display(), good_len, rollback);
            }
            return Err(e.into());
        }

        debug!("Journal entry {} written", entry.sequence);
        state.good_len += line.len() as u64;
        state.chain.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries_page(&self, sequence: u64, limit: usize) -> Result<Vec<JournalEntry>> {
        let state = self.inner.lock().map_err(|_| PollError::LockFailed)?;
        Ok(state.chain.page(sequence, limit))
    }
}
