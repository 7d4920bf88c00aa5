// 💾 Ledger file - `;` delimited CSV, rewritten in full on every mutation
//
// Writes go to a sibling `.tmp` file that is renamed over the target, so a
// crash mid-write never leaves a truncated ledger behind.

use crate::error::{DreError, DreResult};
use crate::ledger::{Balance, LedgerEntry, LedgerRepository};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LEDGER_HEADERS: [&str; 6] = [
    "Data",
    "sk_hierarquia_dre",
    "Cod. Conta Contábil PN",
    "Desc. Conta Contábil PN",
    "Cod. Centro Custo",
    "Saldo",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// On-disk row. Column names are fixed by the existing ledger files.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    #[serde(rename = "Data")]
    date: String,

    #[serde(rename = "sk_hierarquia_dre")]
    hierarchy_key: String,

    #[serde(rename = "Cod. Conta Contábil PN")]
    account_code: String,

    #[serde(rename = "Desc. Conta Contábil PN")]
    account_label: String,

    #[serde(rename = "Cod. Centro Custo")]
    cost_center_code: String,

    #[serde(rename = "Saldo")]
    balance: String,
}

impl From<&LedgerEntry> for LedgerRecord {
    fn from(entry: &LedgerEntry) -> Self {
        LedgerRecord {
            date: entry.date.format(DATE_FORMAT).to_string(),
            hierarchy_key: entry.hierarchy_key.clone(),
            account_code: entry.account_code.clone(),
            account_label: entry.account_label.clone(),
            cost_center_code: entry.cost_center_code.clone(),
            balance: entry.balance.to_canonical(),
        }
    }
}

/// Parse the dates found in ledger files, dropping any time component.
pub fn parse_entry_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok()
}

#[derive(Debug, Clone)]
pub struct CsvLedgerFile {
    path: PathBuf,
}

impl CsvLedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvLedgerFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write a header-only ledger when none exists. Returns false if one was already there.
    pub fn create_if_missing(&self) -> DreResult<bool> {
        if self.exists() {
            return Ok(false);
        }
        self.replace_all(&[])?;
        Ok(true)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_records(tmp: &Path, entries: &[LedgerEntry]) -> csv::Result<()> {
        let file = File::create(tmp)?;
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(file);

        // Header goes out explicitly so an empty ledger still has one.
        wtr.write_record(LEDGER_HEADERS)?;
        for entry in entries {
            wtr.serialize(LedgerRecord::from(entry))?;
        }
        wtr.flush()?;

        let file = wtr.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

impl LedgerRepository for CsvLedgerFile {
    fn load(&self) -> DreResult<Vec<LedgerEntry>> {
        let source = self.location();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| DreError::data_unavailable(&source, e))?;

        let mut entries = Vec::new();
        for (index, result) in rdr.deserialize().enumerate() {
            let line = index + 2;
            let record: LedgerRecord = result
                .map_err(|e| DreError::data_unavailable(&source, format!("line {}: {}", line, e)))?;

            let date = parse_entry_date(&record.date).ok_or_else(|| {
                DreError::data_unavailable(&source, format!("line {}: invalid date '{}'", line, record.date))
            })?;

            let balance = Balance::parse(&record.balance);
            if balance.is_malformed() {
                warn!(line, raw = %record.balance, "Malformed balance kept but excluded from totals");
            }

            entries.push(LedgerEntry {
                date,
                hierarchy_key: record.hierarchy_key,
                account_code: record.account_code,
                account_label: record.account_label,
                cost_center_code: record.cost_center_code,
                balance,
            });
        }

        Ok(entries)
    }

    fn replace_all(&self, entries: &[LedgerEntry]) -> DreResult<()> {
        let location = self.location();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| DreError::persistence(&location, e))?;
            }
        }

        let tmp = self.tmp_path();
        let written = Self::write_records(&tmp, entries)
            .map_err(|e| e.to_string())
            .and_then(|_| fs::rename(&tmp, &self.path).map_err(|e| e.to_string()));

        if let Err(details) = written {
            let _ = fs::remove_file(&tmp);
            return Err(DreError::persistence(location, details));
        }

        debug!(rows = entries.len(), path = %location, "Ledger file rewritten");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(key: &str, balance: Balance) -> LedgerEntry {
        LedgerEntry {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            hierarchy_key: key.to_string(),
            account_code: "3101".to_string(),
            account_label: "Receita Bruta".to_string(),
            cost_center_code: "100".to_string(),
            balance,
        }
    }

    #[test]
    fn test_parse_entry_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_entry_date("2024-01-15"), expected);
        assert_eq!(parse_entry_date("2024-01-15 00:00:00"), expected);
        assert_eq!(parse_entry_date("2024-01-15T13:45:00"), expected);
        assert_eq!(parse_entry_date("15/01/2024"), expected);
        assert_eq!(parse_entry_date("janeiro"), None);
    }

    #[test]
    fn test_write_then_load_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = CsvLedgerFile::new(dir.path().join("valores.csv"));
        let entries = vec![
            entry("H1", Balance::Amount(dec!(100.00))),
            entry("H2", Balance::Amount(dec!(-30.5))),
            entry("H3", Balance::Malformed("n/d".to_string())),
        ];

        file.replace_all(&entries).unwrap();
        let loaded = file.load().unwrap();

        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_written_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let file = CsvLedgerFile::new(dir.path().join("valores.csv"));
        file.replace_all(&[entry("H1", Balance::Amount(dec!(1234.56)))]).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Data;sk_hierarquia_dre;Cod. Conta Contábil PN;Desc. Conta Contábil PN;Cod. Centro Custo;Saldo")
        );
        assert_eq!(lines.next(), Some("2025-03-01;H1;3101;Receita Bruta;100;1234.56"));
        assert!(!dir.path().join("valores.csv.tmp").exists());
    }

    #[test]
    fn test_empty_ledger_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let file = CsvLedgerFile::new(dir.path().join("nested").join("valores.csv"));

        assert!(file.create_if_missing().unwrap());
        assert!(!file.create_if_missing().unwrap());

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_legacy_brazilian_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valores.csv");
        fs::write(
            &path,
            "Data;sk_hierarquia_dre;Cod. Conta Contábil PN;Desc. Conta Contábil PN;Cod. Centro Custo;Saldo\n\
             2024-02-10 00:00:00;H1;3101;Receita;100;1.234,56\n\
             2024-02-11;H2;3102;Custos;100;-200.5\n",
        )
        .unwrap();

        let loaded = CsvLedgerFile::new(&path).load().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].balance, Balance::Amount(dec!(1234.56)));
        assert_eq!(loaded[0].date, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert_eq!(loaded[1].balance, Balance::Amount(dec!(-200.5)));
    }

    #[test]
    fn test_load_missing_file_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvLedgerFile::new(dir.path().join("missing.csv")).load();
        assert!(matches!(result, Err(DreError::DataUnavailable { .. })));
    }

    #[test]
    fn test_load_bad_date_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valores.csv");
        fs::write(
            &path,
            "Data;sk_hierarquia_dre;Cod. Conta Contábil PN;Desc. Conta Contábil PN;Cod. Centro Custo;Saldo\n\
             ontem;H1;3101;Receita;100;10\n",
        )
        .unwrap();

        let err = CsvLedgerFile::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_failed_rename_cleans_up_and_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("valores");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "x").unwrap();

        let result = CsvLedgerFile::new(&target).replace_all(&[]);

        assert!(matches!(result, Err(DreError::Persistence { .. })));
        assert!(!dir.path().join("valores.tmp").exists());
        assert!(target.join("keep.txt").exists());
    }
}
