// ============================================================================
// DRE Ledger - Core Library
// Hierarchy catalog, ledger store, DRE aggregation and entry form, shared by
// the CLI, the terminal UI and tests

pub mod error;
pub mod locale;
pub mod hierarchy;      // Hierarchy Catalog (dimension table)
pub mod ledger;         // Ledger Store: committed + staging
pub mod ledger_file;    // `;` delimited ledger file, atomic rewrite
pub mod aggregation;    // DRE rollup + report cache
pub mod entry_form;     // Entry Form Controller
pub mod config;
pub mod session;

// Re-export commonly used types
pub use error::{DreError, DreResult};
pub use locale::{format_brl, format_number, parse_decimal};
pub use hierarchy::{HierarchyCatalog, HierarchyNode, PRINCIPAL_GROUP_DRG};
pub use ledger::{
    Balance, EntryId, LedgerEntry, LedgerRepository, LedgerStore, MemoryLedger, ViewRow,
};
pub use ledger_file::{CsvLedgerFile, LEDGER_HEADERS};
pub use aggregation::{
    aggregate, build_report, levels_up_to, AggregatedRow, DreReport, ReportCache,
};
pub use entry_form::{Choice, EntryForm, ValidationError, PLACEHOLDER};
pub use config::DreConfig;
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
