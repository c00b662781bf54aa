use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::{Section, Symbol, SymbolKind};

/// Container format of a loaded binary. Always concrete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatKind {
    #[serde(rename = "ELF")]
    Elf,
    #[serde(rename = "PE")]
    Pe,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatKind::Elf => "ELF",
            FormatKind::Pe => "PE",
        };
        write!(f, "{}", name)
    }
}

/// Format requested by the caller. `Auto` lets the loader decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormatHint {
    #[default]
    Auto,
    Elf,
    Pe,
}

impl std::str::FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FormatHint::Auto),
            "elf" => Ok(FormatHint::Elf),
            "pe" | "coff" => Ok(FormatHint::Pe),
            _ => Err(format!("Unknown binary format: {}", s)),
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatHint::Auto => "auto",
            FormatHint::Elf => "elf",
            FormatHint::Pe => "pe",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arch {
    X86,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "X86"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bitness {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl Bitness {
    pub fn bits(self) -> u32 {
        match self {
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }
}

impl fmt::Display for Bitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A binary normalized from one of the parsing backends.
///
/// Sections and symbols keep the order in which the backend reported them.
/// Section buffers stay allocated until [`Binary::unload`] is called or the
/// binary is dropped.
#[derive(Debug, Serialize)]
pub struct Binary {
    pub filename: String,
    pub format: FormatKind,
    /// Backend-specific name of the container, e.g. `elf64-x86-64`.
    pub format_name: String,
    pub entry: u64,
    pub arch: Arch,
    pub bits: Bitness,
    pub arch_name: String,
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
}

impl Binary {
    /// Loads `path`, letting the loader pick the format.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::load(path, FormatHint::Auto)
    }

    /// Frees the bytes of every section. Metadata, sections and symbols are kept.
    pub fn unload(&mut self) {
        for section in &mut self.sections {
            section.release();
        }
    }

    pub fn text_section(&self) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == ".text")
    }

    pub fn section_containing(&self, addr: u64) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(addr))
    }

    pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Function)
    }
}

/// Releases every section buffer owned by `bin`. Safe to call repeatedly.
pub fn unload_binary(bin: &mut Binary) {
    bin.unload();
}
