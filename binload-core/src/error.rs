//! Load failures.
//!
//! Symbol-table problems never show up here: they are logged and swallowed by
//! the backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// Missing, unreadable, empty, or not an object the backend recognizes.
    #[error("failed to open binary '{path}' ({reason})")]
    Open { path: String, reason: String },

    /// The container flavour could not be mapped to ELF or PE.
    #[error("unsupported binary type '{format}' for '{path}'")]
    UnsupportedFormat { path: String, format: String },

    #[error("unsupported architecture ({arch}) in '{path}'")]
    UnsupportedArchitecture { path: String, arch: String },

    #[error("failed to allocate memory for section '{section}' of size {size} in '{path}'")]
    SectionAllocation {
        path: String,
        section: String,
        size: u64,
    },

    #[error("failed to read section '{section}' of '{path}' ({reason})")]
    SectionRead {
        path: String,
        section: String,
        reason: String,
    },
}

impl LoadError {
    pub(crate) fn open(path: &str, reason: impl ToString) -> Self {
        LoadError::Open {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures raised after section extraction started (and rolled back).
    pub fn is_section_failure(&self) -> bool {
        matches!(
            self,
            LoadError::SectionAllocation { .. } | LoadError::SectionRead { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
