// 📊 DRE Aggregation Engine
//
// Pipeline:
//   1. sum ledger balances per (account, hierarchy key)
//   2. left join every catalog row against those sums (missing = 0)
//   3. keep level ∈ levels and principal group == "DRG"
//   4. group by (label, display order, level) and sum
//   5. stable sort by display order, ties in catalog order

use crate::hierarchy::HierarchyCatalog;
use crate::ledger::LedgerEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub group_label: String,
    pub display_order: i64,
    pub level_id: i64,
    pub total_balance: Decimal,
}

/// Indentation stops growing past this depth.
pub const MAX_INDENT_DEPTH: usize = 16;

impl AggregatedRow {
    /// Two spaces per level below 1, capped at [`MAX_INDENT_DEPTH`].
    pub fn indent(&self) -> String {
        let depth = usize::try_from(self.level_id.saturating_sub(1)).unwrap_or(0);
        "  ".repeat(depth.min(MAX_INDENT_DEPTH))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreReport {
    pub rows: Vec<AggregatedRow>,
    /// Entries whose (account, hierarchy key) is not in the catalog
    pub unmatched_entries: usize,
    /// Entries skipped because their balance could not be parsed
    pub malformed_entries: usize,
    /// Entries left out because adding them would overflow a total
    #[serde(default)]
    pub overflowed_entries: usize,
}

impl DreReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Level selection for a rollup depth: `{1, ..., depth}`.
pub fn levels_up_to(depth: i64) -> BTreeSet<i64> {
    (1..=depth).collect()
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Rollup rows for the requested levels.
pub fn aggregate<'a, I>(catalog: &HierarchyCatalog, entries: I, levels: &BTreeSet<i64>) -> Vec<AggregatedRow>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    build_report(catalog, entries, levels).rows
}

/// Same as [`aggregate`], with counts of entries that could not contribute.
pub fn build_report<'a, I>(catalog: &HierarchyCatalog, entries: I, levels: &BTreeSet<i64>) -> DreReport
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let known: HashSet<(&str, &str)> = catalog
        .nodes()
        .iter()
        .map(|n| (n.account_code.as_str(), n.hierarchy_key.as_str()))
        .collect();

    // (sum, entries in the sum) per join key
    let mut sums: HashMap<(&str, &str), (Decimal, usize)> = HashMap::new();
    let mut malformed_entries = 0;
    let mut unmatched_entries = 0;
    let mut overflowed_entries = 0;

    for entry in entries {
        if !known.contains(&(entry.account_code.as_str(), entry.hierarchy_key.as_str())) {
            unmatched_entries += 1;
        }
        let Some(amount) = entry.balance.amount() else {
            malformed_entries += 1;
            continue;
        };

        let slot = sums
            .entry((entry.account_code.as_str(), entry.hierarchy_key.as_str()))
            .or_insert((Decimal::ZERO, 0));
        match slot.0.checked_add(amount) {
            Some(total) => {
                slot.0 = total;
                slot.1 += 1;
            }
            None => overflowed_entries += 1,
        }
    }

    if malformed_entries > 0 {
        warn!(malformed_entries, "Excluded entries with malformed balances from the report");
    }

    let mut rows: Vec<AggregatedRow> = Vec::new();
    let mut group_index: HashMap<(&str, i64, i64), usize> = HashMap::new();

    for node in catalog.nodes() {
        if !node.is_principal_group() || !levels.contains(&node.level_id) {
            continue;
        }

        let (amount, count) = sums
            .get(&(node.account_code.as_str(), node.hierarchy_key.as_str()))
            .copied()
            .unwrap_or((Decimal::ZERO, 0));

        let key = (node.group_label.as_str(), node.display_order, node.level_id);
        match group_index.get(&key) {
            Some(&index) => match rows[index].total_balance.checked_add(amount) {
                Some(total) => rows[index].total_balance = total,
                None => overflowed_entries += count,
            },
            None => {
                group_index.insert(key, rows.len());
                rows.push(AggregatedRow {
                    group_label: node.group_label.clone(),
                    display_order: node.display_order,
                    level_id: node.level_id,
                    total_balance: amount,
                });
            }
        }
    }

    if overflowed_entries > 0 {
        warn!(overflowed_entries, "Excluded entries whose balance would overflow a report total");
    }

    // sort_by_key is stable: equal orders keep first-appearance order
    rows.sort_by_key(|row| row.display_order);

    DreReport {
        rows,
        unmatched_entries,
        malformed_entries,
        overflowed_entries,
    }
}

// ============================================================================
// REPORT CACHE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    catalog: String,
    generation: u64,
    levels: BTreeSet<i64>,
}

/// Single-slot memo of the last report, keyed on catalog fingerprint,
/// ledger generation and level selection.
#[derive(Debug, Default)]
pub struct ReportCache {
    slot: Option<(CacheKey, DreReport)>,
    hits: u64,
    misses: u64,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<'a, I>(
        &mut self,
        catalog: &HierarchyCatalog,
        generation: u64,
        entries: I,
        levels: &BTreeSet<i64>,
    ) -> &DreReport
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let key = CacheKey {
            catalog: catalog.fingerprint().to_string(),
            generation,
            levels: levels.clone(),
        };

        let slot = match self.slot.take() {
            Some((cached, report)) if cached == key => {
                self.hits += 1;
                debug!(generation, "Report cache hit");
                (cached, report)
            }
            _ => {
                self.misses += 1;
                let report = build_report(catalog, entries, levels);
                (key, report)
            }
        };

        &self.slot.insert(slot).1
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
