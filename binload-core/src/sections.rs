use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{LoadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionKind {
    /// Executable section.
    Code,
    /// Allocated (ELF) or initialized (PE/COFF) data section.
    Data,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Code => "CODE",
            SectionKind::Data => "DATA",
        };
        write!(f, "{}", name)
    }
}

/// A code or data section materialized from a binary.
///
/// The section owns its byte buffer. The buffer is present from the moment the
/// section is loaded until [`Section::release`] is called, and its length is
/// always `size`.
#[derive(Debug, Serialize)]
pub struct Section {
    /// File name of the owning binary. Diagnostic only.
    #[serde(skip)]
    pub binary: Arc<str>,
    pub name: String,
    pub kind: SectionKind,
    pub vma: u64,
    pub size: u64,
    #[serde(skip)]
    bytes: Option<Box<[u8]>>,
}

impl Section {
    /// Allocates a zeroed buffer of exactly `size` bytes and fills it from `data`.
    ///
    /// `data` may be shorter than `size` (zero-fill tail); a longer slice is
    /// truncated to `size`.
    pub(crate) fn load(
        binary: &Arc<str>,
        name: String,
        kind: SectionKind,
        vma: u64,
        size: u64,
        data: &[u8],
    ) -> Result<Self> {
        let alloc_failure = || LoadError::SectionAllocation {
            path: binary.to_string(),
            section: name.clone(),
            size,
        };

        let len = usize::try_from(size).map_err(|_| alloc_failure())?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| alloc_failure())?;
        buf.resize(len, 0);

        let copied = data.len().min(len);
        buf[..copied].copy_from_slice(&data[..copied]);

        Ok(Section {
            binary: Arc::clone(binary),
            name,
            kind,
            vma,
            size,
            bytes: Some(buf.into_boxed_slice()),
        })
    }

    /// Section contents, or `None` once released.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.bytes.is_some()
    }

    /// Frees the byte buffer. Calling this on a released section does nothing.
    pub fn release(&mut self) {
        if self.bytes.take().is_some() {
            log::trace!("released section {} of {}", self.name, self.binary);
        }
    }

    /// Returns true if `addr` falls inside `[vma, vma + size)`.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.vma && addr - self.vma < self.size
    }
}

/// Frees every buffer in `sections`, used to undo a partially completed extraction.
pub(crate) fn rollback(sections: &mut [Section]) {
    let loaded = sections.iter().filter(|s| s.is_loaded()).count();
    for section in sections.iter_mut() {
        section.release();
    }
    log::warn!("rolled back {} section buffer(s)", loaded);
}
