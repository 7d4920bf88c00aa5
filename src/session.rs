// 🗂️ Session - one catalog, one ledger store, one report cache
//
// Everything the report and entry pages share lives here and is passed
// around explicitly.

use crate::aggregation::{levels_up_to, DreReport, ReportCache};
use crate::config::DreConfig;
use crate::entry_form::EntryForm;
use crate::error::DreResult;
use crate::hierarchy::HierarchyCatalog;
use crate::ledger::{EntryId, LedgerStore};
use crate::ledger_file::CsvLedgerFile;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, info_span};
use uuid::Uuid;

pub struct Session {
    id: Uuid,
    catalog: HierarchyCatalog,
    catalog_path: Option<PathBuf>,
    store: LedgerStore,
    cache: ReportCache,
}

impl Session {
    /// Load the hierarchy and the ledger file named by `config`.
    pub fn open(config: &DreConfig) -> DreResult<Self> {
        let id = Uuid::new_v4();
        let _span = info_span!("session", %id).entered();

        let catalog = HierarchyCatalog::load(&config.hierarchy_path)?;
        let store = LedgerStore::open(CsvLedgerFile::new(&config.ledger_path))?;

        info!(
            catalog_rows = catalog.len(),
            ledger_rows = store.committed_len(),
            "Session opened"
        );

        Ok(Session {
            id,
            catalog,
            catalog_path: Some(config.hierarchy_path.clone()),
            store,
            cache: ReportCache::new(),
        })
    }

    /// Session over an already loaded catalog and store. Catalog reloads keep it as is.
    pub fn from_parts(catalog: HierarchyCatalog, store: LedgerStore) -> Self {
        Session {
            id: Uuid::new_v4(),
            catalog,
            catalog_path: None,
            store,
            cache: ReportCache::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn catalog(&self) -> &HierarchyCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Number of staged entries waiting for a save
    pub fn pending_count(&self) -> usize {
        self.store.staging_len()
    }

    /// Re-read the hierarchy. On failure the loaded catalog stays in use.
    pub fn reload_catalog(&mut self) -> DreResult<()> {
        if let Some(path) = &self.catalog_path {
            self.catalog = HierarchyCatalog::load_or_keep(path, Some(&self.catalog))?;
        }
        Ok(())
    }

    /// Re-read the committed ledger. On failure the in-memory ledger stays in use.
    pub fn reload_ledger(&mut self) -> DreResult<()> {
        self.store.reload()
    }

    /// Stage an entry built from `form`.
    pub fn post_entry(&mut self, form: &EntryForm) -> DreResult<EntryId> {
        form.submit(&self.catalog, &mut self.store)
    }

    /// Stage an entry and save immediately, as the quick-entry form does.
    ///
    /// If the save fails the new entry stays staged so it can be saved or
    /// discarded later.
    pub fn post_and_commit(&mut self, form: &EntryForm) -> DreResult<EntryId> {
        let id = self.post_entry(form)?;
        self.store.commit()?;
        Ok(id)
    }

    pub fn commit(&mut self) -> DreResult<usize> {
        self.store.commit()
    }

    pub fn discard_staging(&mut self) -> usize {
        self.store.discard_staging()
    }

    pub fn delete_rows(&mut self, row_ids: &BTreeSet<usize>) -> DreResult<usize> {
        self.store.delete_by_row_ids(row_ids)
    }

    pub fn delete_entries(&mut self, ids: &[EntryId]) -> DreResult<usize> {
        self.store.delete_entries(ids)
    }

    /// Report over the committed ledger, memoized until the next commit/delete/reload.
    pub fn report(&mut self, levels: &BTreeSet<i64>) -> &DreReport {
        self.cache.get_or_build(
            &self.catalog,
            self.store.generation(),
            self.store.committed_entries(),
            levels,
        )
    }

    pub fn report_to_depth(&mut self, depth: i64) -> &DreReport {
        self.report(&levels_up_to(depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_form::Choice;
    use crate::hierarchy::HierarchyNode;
    use crate::ledger::{Balance, LedgerEntry, MemoryLedger};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn catalog() -> HierarchyCatalog {
        HierarchyCatalog::from_nodes(vec![HierarchyNode {
            cost_center_code: "CC1".to_string(),
            account_code: "A1".to_string(),
            hierarchy_key: "H1".to_string(),
            level_id: 1,
            group_label: "Receita".to_string(),
            principal_group_flag: "DRG".to_string(),
            display_order: 1,
        }])
    }

    fn form(balance: rust_decimal::Decimal) -> EntryForm {
        let mut form = EntryForm::new(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        form.select_cost_center(Choice::from_option("CC1"));
        form.select_account(Choice::from_option("A1"));
        form.select_hierarchy(Choice::from_option("H1"));
        form.balance = balance;
        form
    }

    fn session(repo: &MemoryLedger) -> Session {
        Session::from_parts(catalog(), LedgerStore::open(repo.clone()).unwrap())
    }

    #[test]
    fn test_staged_entries_stay_out_of_report_until_saved() {
        let repo = MemoryLedger::default();
        let mut session = session(&repo);

        session.post_entry(&form(dec!(100.00))).unwrap();
        session.post_entry(&form(dec!(-30.00))).unwrap();
        assert_eq!(session.pending_count(), 2);
        assert_eq!(session.report_to_depth(1).rows[0].total_balance, dec!(0));

        session.commit().unwrap();
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.report_to_depth(1).rows[0].total_balance, dec!(70.00));
        assert_eq!(repo.snapshot().len(), 2);
    }

    #[test]
    fn test_post_and_commit_writes_immediately() {
        let repo = MemoryLedger::default();
        let mut session = session(&repo);

        session.post_and_commit(&form(dec!(42))).unwrap();

        assert_eq!(repo.write_count(), 1);
        assert_eq!(repo.snapshot()[0].account_label, "Receita");
        assert_eq!(session.report_to_depth(1).rows[0].total_balance, dec!(42));
    }

    #[test]
    fn test_failed_quick_save_keeps_entry_staged() {
        let repo = MemoryLedger::default();
        let mut session = session(&repo);
        repo.set_fail_writes(true);

        let err = session.post_and_commit(&form(dec!(1))).unwrap_err();

        assert!(matches!(err, crate::error::DreError::Persistence { .. }));
        assert_eq!(session.pending_count(), 1);
        assert_eq!(session.store().committed_len(), 0);
    }

    #[test]
    fn test_report_recomputed_after_delete() {
        let committed = vec![
            LedgerEntry {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                hierarchy_key: "H1".to_string(),
                account_code: "A1".to_string(),
                account_label: "Receita".to_string(),
                cost_center_code: "CC1".to_string(),
                balance: Balance::Amount(dec!(10)),
            };
            2
        ];
        let repo = MemoryLedger::new(committed);
        let mut session = session(&repo);
        assert_eq!(session.report_to_depth(1).rows[0].total_balance, dec!(20));

        session.delete_rows(&BTreeSet::from([0])).unwrap();

        assert_eq!(session.report_to_depth(1).rows[0].total_balance, dec!(10));
    }

    #[test]
    fn test_reload_catalog_without_path_keeps_catalog() {
        let mut session = session(&MemoryLedger::default());
        let fingerprint = session.catalog().fingerprint().to_string();

        session.reload_catalog().unwrap();

        assert_eq!(session.catalog().fingerprint(), fingerprint);
    }
}
