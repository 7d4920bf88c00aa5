// 📝 Entry Form Controller
//
// Holds the analyst's choices for a new ledger line. Cost center, account and
// hierarchy node start at the "Selecione" placeholder and must all be chosen
// before an entry can be built.

use crate::error::{DreError, DreResult};
use crate::hierarchy::HierarchyCatalog;
use crate::ledger::{Balance, EntryId, LedgerEntry, LedgerStore};
use crate::locale;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

/// Placeholder shown first in every selector.
pub const PLACEHOLDER: &str = "Selecione";

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

const UNSELECTED_MESSAGE: &str = "No option selected";

impl ValidationError {
    pub fn unselected(field: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: UNSELECTED_MESSAGE.to_string(),
            context: "EntryForm".to_string(),
        }
    }

    pub fn is_unselected(&self) -> bool {
        self.message == UNSELECTED_MESSAGE
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
            context: "EntryForm".to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// CHOICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Choice {
    #[default]
    Unselected,
    Selected(String),
}

impl Choice {
    /// Map a selector option back to a choice. The placeholder means unselected.
    pub fn from_option(option: &str) -> Self {
        if option == PLACEHOLDER || option.trim().is_empty() {
            Choice::Unselected
        } else {
            Choice::Selected(option.to_string())
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Choice::Selected(value) => Some(value),
            Choice::Unselected => None,
        }
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Choice::Selected(_))
    }

    /// Text to show in a selector
    pub fn display(&self) -> &str {
        self.value().unwrap_or(PLACEHOLDER)
    }
}

fn with_placeholder(options: Vec<&str>) -> Vec<String> {
    std::iter::once(PLACEHOLDER)
        .chain(options)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// ENTRY FORM
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EntryForm {
    pub date: NaiveDate,
    cost_center: Choice,
    account: Choice,
    hierarchy: Choice,
    pub balance: Decimal,
}

impl EntryForm {
    pub fn new(date: NaiveDate) -> Self {
        EntryForm {
            date,
            cost_center: Choice::Unselected,
            account: Choice::Unselected,
            hierarchy: Choice::Unselected,
            balance: Decimal::ZERO,
        }
    }

    pub fn cost_center(&self) -> &Choice {
        &self.cost_center
    }

    pub fn account(&self) -> &Choice {
        &self.account
    }

    pub fn hierarchy(&self) -> &Choice {
        &self.hierarchy
    }

    pub fn cost_center_options(catalog: &HierarchyCatalog) -> Vec<String> {
        with_placeholder(catalog.distinct_cost_centers())
    }

    pub fn account_options(catalog: &HierarchyCatalog) -> Vec<String> {
        with_placeholder(catalog.distinct_accounts())
    }

    /// Hierarchy keys for the chosen cost center and account. Only the
    /// placeholder until both are chosen.
    pub fn hierarchy_options(&self, catalog: &HierarchyCatalog) -> Vec<String> {
        match (self.cost_center.value(), self.account.value()) {
            (Some(cost_center), Some(account)) => {
                with_placeholder(catalog.hierarchy_keys_for(cost_center, account))
            }
            _ => vec![PLACEHOLDER.to_string()],
        }
    }

    pub fn select_cost_center(&mut self, choice: Choice) {
        if self.cost_center != choice {
            self.cost_center = choice;
            self.hierarchy = Choice::Unselected;
        }
    }

    pub fn select_account(&mut self, choice: Choice) {
        if self.account != choice {
            self.account = choice;
            self.hierarchy = Choice::Unselected;
        }
    }

    pub fn select_hierarchy(&mut self, choice: Choice) {
        self.hierarchy = choice;
    }

    /// Set the balance from typed text, Brazilian or plain decimal format.
    pub fn set_balance_text(&mut self, raw: &str) -> Result<(), ValidationError> {
        match locale::parse_decimal(raw) {
            Some(value) => {
                self.balance = value;
                Ok(())
            }
            None => Err(ValidationError::invalid(
                "balance",
                format!("'{}' is not a number", raw.trim()),
            )),
        }
    }

    /// Validate the choices and build the entry. Nothing is mutated.
    pub fn build_entry(&self, catalog: &HierarchyCatalog) -> Result<LedgerEntry, Vec<ValidationError>> {
        let mut errors = Vec::new();
        for (field, choice) in [
            ("cost_center", &self.cost_center),
            ("account", &self.account),
            ("hierarchy", &self.hierarchy),
        ] {
            if !choice.is_selected() {
                errors.push(ValidationError::unselected(field));
            }
        }

        match (self.cost_center.value(), self.account.value(), self.hierarchy.value()) {
            (Some(cost_center), Some(account), Some(hierarchy_key)) if errors.is_empty() => {
                let account_label = catalog
                    .label_for(account, hierarchy_key)
                    .unwrap_or_default()
                    .to_string();

                Ok(LedgerEntry {
                    date: self.date,
                    hierarchy_key: hierarchy_key.to_string(),
                    account_code: account.to_string(),
                    account_label,
                    cost_center_code: cost_center.to_string(),
                    balance: Balance::Amount(self.balance),
                })
            }
            _ => Err(errors),
        }
    }

    /// Build the entry and stage it.
    pub fn submit(&self, catalog: &HierarchyCatalog, store: &mut LedgerStore) -> DreResult<EntryId> {
        let entry = self.build_entry(catalog).map_err(DreError::Validation)?;
        let id = store.append(entry);
        debug!(entry_id = %id, "Staged entry from form");
        Ok(id)
    }
}
