// 📒 Ledger Store - committed entries + staging buffer
//
// The effective view is committed ++ staging. Row ids are positions in that
// view and shift after every mutation; EntryId is the stable identity handed
// out at load/append time and never reused within a store.

use crate::error::{DreError, DreResult};
use crate::locale;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ============================================================================
// ENTRY TYPES
// ============================================================================

/// Signed amount of a ledger line.
///
/// `Malformed` keeps the raw text of a value that could not be parsed so the
/// file can be rewritten without losing it. It never contributes to sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Balance {
    Amount(Decimal),
    Malformed(String),
}

impl Balance {
    pub fn parse(raw: &str) -> Self {
        match locale::parse_decimal(raw) {
            Some(value) => Balance::Amount(value),
            None => Balance::Malformed(raw.to_string()),
        }
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Balance::Amount(value) => Some(*value),
            Balance::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Balance::Malformed(_))
    }

    /// Plain decimal form written to the ledger file
    pub fn to_canonical(&self) -> String {
        match self {
            Balance::Amount(value) => value.to_string(),
            Balance::Malformed(raw) => raw.clone(),
        }
    }
}

impl From<Decimal> for Balance {
    fn from(value: Decimal) -> Self {
        Balance::Amount(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub hierarchy_key: String,
    pub account_code: String,
    /// Catalog group label copied at entry time, not re-synced afterwards
    pub account_label: String,
    pub cost_center_code: String,
    pub balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostedEntry {
    pub id: EntryId,
    pub entry: LedgerEntry,
}

/// One row of the effective view.
#[derive(Debug, Clone, Copy)]
pub struct ViewRow<'a> {
    pub row_id: usize,
    pub id: EntryId,
    pub entry: &'a LedgerEntry,
    pub staged: bool,
}

// ============================================================================
// DURABLE STORAGE
// ============================================================================

/// Durable home of the committed sequence.
pub trait LedgerRepository: Send {
    /// Read the full committed sequence.
    fn load(&self) -> DreResult<Vec<LedgerEntry>>;

    /// Replace the stored sequence. Either everything is written or nothing is.
    fn replace_all(&self, entries: &[LedgerEntry]) -> DreResult<()>;

    /// Human-readable location, used in logs and error messages.
    fn location(&self) -> String;
}

/// In-process repository. Clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<Mutex<Vec<LedgerEntry>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryLedger {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        MemoryLedger {
            entries: Arc::new(Mutex::new(entries)),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make subsequent writes fail, to exercise the all-or-nothing path.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LedgerRepository for MemoryLedger {
    fn load(&self) -> DreResult<Vec<LedgerEntry>> {
        Ok(self.snapshot())
    }

    fn replace_all(&self, entries: &[LedgerEntry]) -> DreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DreError::persistence(self.location(), "write rejected"));
        }
        *self.entries.lock().unwrap_or_else(|e| e.into_inner()) = entries.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// LEDGER STORE
// ============================================================================

pub struct LedgerStore {
    repo: Box<dyn LedgerRepository>,
    committed: Vec<PostedEntry>,
    staging: Vec<PostedEntry>,
    next_id: u64,
    generation: u64,
}

impl LedgerStore {
    /// Open the store, reading the committed sequence from `repo`.
    pub fn open(repo: impl LedgerRepository + 'static) -> DreResult<Self> {
        let mut store = LedgerStore {
            repo: Box::new(repo),
            committed: Vec::new(),
            staging: Vec::new(),
            next_id: 1,
            generation: 0,
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read the committed sequence. Staging is kept; committed rows get fresh ids.
    pub fn reload(&mut self) -> DreResult<()> {
        let entries = self.repo.load()?;

        let malformed = entries.iter().filter(|e| e.balance.is_malformed()).count();
        if malformed > 0 {
            warn!(malformed, location = %self.repo.location(), "Ledger contains malformed balances");
        }

        self.committed = entries.into_iter().map(|entry| self.issue(entry)).collect();
        self.generation += 1;

        info!(
            location = %self.repo.location(),
            committed = self.committed.len(),
            staged = self.staging.len(),
            "Loaded ledger"
        );
        Ok(())
    }

    fn issue(&mut self, entry: LedgerEntry) -> PostedEntry {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        PostedEntry { id, entry }
    }

    /// Stage a new entry. No validation happens here.
    pub fn append(&mut self, entry: LedgerEntry) -> EntryId {
        let posted = self.issue(entry);
        let id = posted.id;
        self.staging.push(posted);
        id
    }

    /// `committed ++ staging`, each row paired with its current row id.
    pub fn effective_view(&self) -> Vec<ViewRow<'_>> {
        let committed = self.committed.iter().map(|p| (p, false));
        let staged = self.staging.iter().map(|p| (p, true));

        committed
            .chain(staged)
            .enumerate()
            .map(|(row_id, (posted, staged))| ViewRow {
                row_id,
                id: posted.id,
                entry: &posted.entry,
                staged,
            })
            .collect()
    }

    /// Entries that feed the report: only what is durably stored.
    pub fn committed_entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.committed.iter().map(|p| &p.entry)
    }

    pub fn staged_entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.staging.iter().map(|p| &p.entry)
    }

    pub fn find(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.committed
            .iter()
            .chain(self.staging.iter())
            .find(|p| p.id == id)
            .map(|p| &p.entry)
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn staging_len(&self) -> usize {
        self.staging.len()
    }

    pub fn len(&self) -> usize {
        self.committed.len() + self.staging.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped every time the committed sequence changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn location(&self) -> String {
        self.repo.location()
    }

    /// Write committed ++ staging, then promote staging. Returns the number promoted.
    pub fn commit(&mut self) -> DreResult<usize> {
        if self.staging.is_empty() {
            return Ok(0);
        }

        let mut candidate = self.committed.clone();
        candidate.extend(self.staging.iter().cloned());
        self.persist(&candidate)?;

        let promoted = self.staging.len();
        self.committed = candidate;
        self.staging.clear();
        self.generation += 1;

        info!(
            promoted,
            committed = self.committed.len(),
            location = %self.repo.location(),
            "Committed staged entries"
        );
        Ok(promoted)
    }

    /// Drop every staged entry without writing. Returns how many were dropped.
    pub fn discard_staging(&mut self) -> usize {
        let discarded = self.staging.len();
        self.staging.clear();
        if discarded > 0 {
            info!(discarded, "Discarded staged entries");
        }
        discarded
    }

    /// Delete rows of the current effective view and persist the new committed set.
    ///
    /// Survivors are split positionally: the first `committed_len()` of them
    /// become the committed sequence, the rest stay staged. Row ids that do not
    /// address a row are ignored.
    pub fn delete_by_row_ids(&mut self, row_ids: &BTreeSet<usize>) -> DreResult<usize> {
        let total = self.len();
        let deleted = row_ids.iter().filter(|&&row| row < total).count();
        if deleted == 0 {
            return Ok(0);
        }

        let committed_len = self.committed.len();
        let mut survivors: Vec<PostedEntry> = self
            .committed
            .iter()
            .chain(self.staging.iter())
            .enumerate()
            .filter(|(row, _)| !row_ids.contains(row))
            .map(|(_, posted)| posted.clone())
            .collect();

        let staging = survivors.split_off(committed_len.min(survivors.len()));
        let committed = survivors;
        self.persist(&committed)?;

        let kept_committed = (0..committed_len).filter(|row| !row_ids.contains(row)).count();
        let promoted = committed.len() - kept_committed;

        self.committed = committed;
        self.staging = staging;
        self.generation += 1;

        info!(
            deleted,
            promoted_from_staging = promoted,
            committed = self.committed.len(),
            staged = self.staging.len(),
            "Deleted ledger rows"
        );
        Ok(deleted)
    }

    /// Resolve stable ids to current row ids, then delete them in the same call.
    pub fn delete_entries(&mut self, ids: &[EntryId]) -> DreResult<usize> {
        let row_ids = self.row_ids_for(ids);
        self.delete_by_row_ids(&row_ids)
    }

    pub fn row_ids_for(&self, ids: &[EntryId]) -> BTreeSet<usize> {
        self.effective_view()
            .into_iter()
            .filter(|row| ids.contains(&row.id))
            .map(|row| row.row_id)
            .collect()
    }

    fn persist(&self, entries: &[PostedEntry]) -> DreResult<()> {
        let plain: Vec<LedgerEntry> = entries.iter().map(|p| p.entry.clone()).collect();
        self.repo.replace_all(&plain)
    }
}
