// ⚠️ Error taxonomy for catalog loading, entry validation and ledger persistence

use crate::entry_form::ValidationError;
use thiserror::Error;

/// Result alias used across the library.
pub type DreResult<T> = Result<T, DreError>;

#[derive(Debug, Error)]
pub enum DreError {
    /// A dataset could not be read or is corrupt. Previously loaded data is kept.
    #[error("data unavailable ({source_name}): {details}")]
    DataUnavailable { source_name: String, details: String },

    /// The entry form is incomplete. Nothing was mutated.
    #[error("invalid entry: {}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// A durable write failed. In-memory committed/staging state is unchanged.
    #[error("failed to persist ledger to {path}: {details}")]
    Persistence { path: String, details: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl DreError {
    pub fn data_unavailable(source_name: impl Into<String>, details: impl ToString) -> Self {
        DreError::DataUnavailable {
            source_name: source_name.into(),
            details: details.to_string(),
        }
    }

    pub fn persistence(path: impl Into<String>, details: impl ToString) -> Self {
        DreError::Persistence {
            path: path.into(),
            details: details.to_string(),
        }
    }

    /// Text shown to the analyst. Every variant is reported, none is fatal.
    pub fn user_message(&self) -> String {
        match self {
            DreError::DataUnavailable { source_name, .. } => format!(
                "Não foi possível carregar os dados necessários ({}).",
                source_name
            ),
            DreError::Validation(errors) if errors.iter().all(|e| e.is_unselected()) => {
                "Por favor, selecione todas as opções para lançar o valor.".to_string()
            }
            DreError::Validation(errors) => format!("Lançamento inválido: {}", join_validation(errors)),
            DreError::Persistence { .. } => {
                "Erro ao salvar lançamentos. Nenhuma alteração foi aplicada.".to_string()
            }
            DreError::Config(details) => format!("Configuração inválida: {}", details),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DreError::Validation(_))
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
