use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind {
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "FUNC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub addr: u64,
}

impl Symbol {
    pub fn function(name: impl Into<String>, addr: u64) -> Self {
        Self {
            kind: SymbolKind::Function,
            name: name.into(),
            addr,
        }
    }
}

/// Which symbol table a batch of symbols came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolSource {
    Static,
    Dynamic,
}

impl fmt::Display for SymbolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolSource::Static => write!(f, "symtab"),
            SymbolSource::Dynamic => write!(f, "dynsym"),
        }
    }
}

/// Decodes a name, replacing invalid UTF-8 so one bad entry never costs the rest of a table.
pub(crate) fn lossy_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Reads the NUL-terminated string starting at `offset` in a string table.
///
/// Returns `None` when `offset` is outside the table; a missing terminator
/// ends the name at the end of the table.
pub(crate) fn name_at(table: &[u8], offset: usize) -> Option<String> {
    let tail = table.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Some(lossy_name(&tail[..end]))
}

pub(crate) fn record(out: &mut Vec<Symbol>, source: SymbolSource, symbols: Vec<Symbol>) {
    log::debug!("{} function symbol(s) from {}", symbols.len(), source);
    out.extend(symbols);
}

/// Appends the outcome of one best-effort table read to `out`.
///
/// A failed read counts as an empty table; the failure is logged and dropped.
pub(crate) fn absorb<E: fmt::Display>(
    out: &mut Vec<Symbol>,
    source: SymbolSource,
    read: std::result::Result<Vec<Symbol>, E>,
) {
    match read {
        Ok(symbols) => record(out, source, symbols),
        Err(e) => log::warn!("failed to read {} ({}), ignoring it", source, e),
    }
}
