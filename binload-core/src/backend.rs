mod elf;
mod multi;

use std::fmt;
use std::path::Path;

use crate::error::{LoadError, Result};
use crate::Binary;

/// The parsing libraries a binary can be loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// goblin's ELF reader, opened in a tolerant mode. ELF only.
    Elf,
    /// The `object` crate's format-agnostic reader. Covers ELF and PE/COFF.
    Multi,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Elf => "goblin-elf",
            Backend::Multi => "object",
        }
    }

    /// Parses `path` with this backend into a fresh [`Binary`].
    pub fn load(self, path: &Path) -> Result<Binary> {
        let filename = path.display().to_string();
        let data = read_file(path, &filename)?;
        match self {
            Backend::Elf => elf::load(&filename, &data),
            Backend::Multi => multi::load(&filename, &data),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reads the whole file. The handle is closed before this returns.
fn read_file(path: &Path, filename: &str) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| LoadError::open(filename, e))?;
    if data.is_empty() {
        return Err(LoadError::open(filename, "file is empty"));
    }
    Ok(data)
}
