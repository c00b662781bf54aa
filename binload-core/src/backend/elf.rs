//! Primary ELF backend built on goblin's low-level ELF readers.
//!
//! Rather than `Elf::parse`, which rejects a file as soon as any table is
//! malformed, only the ELF header has to be valid here. A broken section
//! header table leaves the binary without sections, and a broken symbol table
//! leaves it without those symbols.

use std::sync::Arc;

use goblin::container::{Container, Ctx};
use goblin::elf::header::{EM_386, EM_X86_64};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHT_DYNSYM, SHT_NOBITS, SHT_SYMTAB};
use goblin::elf::sym::{sym32, sym64, Symtab, STT_FUNC};
use goblin::elf::{Elf, SectionHeader};

use crate::error::{LoadError, Result};
use crate::sections::rollback;
use crate::symbols::{absorb, name_at, SymbolSource};
use crate::{Arch, Binary, Bitness, FormatKind, Section, SectionKind, Symbol};

pub(super) fn load(filename: &str, data: &[u8]) -> Result<Binary> {
    let header = Elf::parse_header(data).map_err(|e| LoadError::open(filename, e))?;
    let container = header.container().map_err(|e| LoadError::open(filename, e))?;
    let endian = header.endianness().map_err(|e| LoadError::open(filename, e))?;
    let ctx = Ctx::new(container, endian);

    let (bits, arch_name) = machine(header.e_machine).ok_or_else(|| {
        LoadError::UnsupportedArchitecture {
            path: filename.to_string(),
            arch: format!("e_machine {}", header.e_machine),
        }
    })?;

    let class = match container {
        Container::Little => 32,
        Container::Big => 64,
    };
    let byte_order = if endian.is_little() { "little" } else { "big" };

    let mut bin = Binary {
        filename: filename.to_string(),
        format: FormatKind::Elf,
        format_name: format!("elf{}-{}", class, byte_order),
        entry: header.e_entry,
        arch: Arch::X86,
        bits,
        arch_name: arch_name.to_string(),
        sections: Vec::new(),
        symbols: Vec::new(),
    };

    let shdrs = match SectionHeader::parse(
        data,
        header.e_shoff as usize,
        header.e_shnum as usize,
        ctx,
    ) {
        Ok(shdrs) => shdrs,
        Err(e) => {
            log::warn!("{}: ignoring malformed section headers ({})", filename, e);
            Vec::new()
        }
    };
    let shstrtab = shdrs
        .get(header.e_shstrndx as usize)
        .and_then(|sh| file_bytes(data, sh));

    absorb(
        &mut bin.symbols,
        SymbolSource::Static,
        functions(data, &shdrs, ctx, SHT_SYMTAB),
    );
    absorb(
        &mut bin.symbols,
        SymbolSource::Dynamic,
        functions(data, &shdrs, ctx, SHT_DYNSYM),
    );

    load_sections(&mut bin, data, &shdrs, shstrtab)?;
    Ok(bin)
}

/// Maps `e_machine` to the supported x86 flavours.
fn machine(e_machine: u16) -> Option<(Bitness, &'static str)> {
    match e_machine {
        EM_386 => Some((Bitness::Bits32, "X86")),
        EM_X86_64 => Some((Bitness::Bits64, "X86_64")),
        _ => None,
    }
}

/// The file contents backing `sh`, if its range lies inside `data`.
fn file_bytes<'a>(data: &'a [u8], sh: &SectionHeader) -> Option<&'a [u8]> {
    let start = usize::try_from(sh.sh_offset).ok()?;
    let len = usize::try_from(sh.sh_size).ok()?;
    data.get(start..start.checked_add(len)?)
}

/// Reads the `STT_FUNC` entries of the first section of type `sh_type`.
///
/// A missing table is not an error and yields no symbols. Names are looked up
/// one entry at a time, so a damaged string only affects its own symbol.
fn functions(
    data: &[u8],
    shdrs: &[SectionHeader],
    ctx: Ctx,
    sh_type: u32,
) -> goblin::error::Result<Vec<Symbol>> {
    let Some(table) = shdrs.iter().find(|sh| sh.sh_type == sh_type) else {
        return Ok(Vec::new());
    };

    let strtab_sh = shdrs.get(table.sh_link as usize).ok_or_else(|| {
        goblin::error::Error::Malformed(format!("bad sh_link {} on symbol table", table.sh_link))
    })?;
    let strtab = file_bytes(data, strtab_sh).ok_or_else(|| {
        goblin::error::Error::Malformed(format!(
            "string table at {:#x}+{:#x} is outside the file",
            strtab_sh.sh_offset, strtab_sh.sh_size
        ))
    })?;

    let entsize = match ctx.container {
        Container::Little => sym32::SIZEOF_SYM,
        Container::Big => sym64::SIZEOF_SYM,
    };
    let count = table.sh_size as usize / entsize;
    let symtab = Symtab::parse(data, table.sh_offset as usize, count, ctx)?;

    Ok(symtab
        .iter()
        .filter(|sym| sym.st_type() == STT_FUNC)
        .map(|sym| {
            let name = name_at(strtab, sym.st_name).unwrap_or_default();
            Symbol::function(name, sym.st_value)
        })
        .collect())
}

fn section_kind(sh: &SectionHeader) -> Option<SectionKind> {
    if sh.sh_type == SHT_NOBITS {
        return None;
    }
    if sh.sh_flags & u64::from(SHF_EXECINSTR) != 0 {
        Some(SectionKind::Code)
    } else if sh.sh_flags & u64::from(SHF_ALLOC) != 0 {
        Some(SectionKind::Data)
    } else {
        None
    }
}

/// Copies every code and data section into `bin`.
///
/// On failure every buffer already placed in `bin` is released before the
/// error is returned.
fn load_sections(
    bin: &mut Binary,
    data: &[u8],
    shdrs: &[SectionHeader],
    shstrtab: Option<&[u8]>,
) -> Result<()> {
    let owner: Arc<str> = Arc::from(bin.filename.as_str());

    for sh in shdrs {
        let Some(kind) = section_kind(sh) else {
            continue;
        };
        let name = shstrtab
            .and_then(|t| name_at(t, sh.sh_name))
            .unwrap_or_else(|| "<unnamed>".to_string());

        match copy_section(&owner, name, kind, sh, data) {
            Ok(section) => bin.sections.push(section),
            Err(e) => {
                log::warn!("{}", e);
                rollback(&mut bin.sections);
                return Err(e);
            }
        }
    }

    log::debug!("{}: {} section(s) materialized", bin.filename, bin.sections.len());
    Ok(())
}

fn copy_section(
    owner: &Arc<str>,
    name: String,
    kind: SectionKind,
    sh: &SectionHeader,
    data: &[u8],
) -> Result<Section> {
    let Some(contents) = file_bytes(data, sh) else {
        return Err(LoadError::SectionRead {
            path: owner.to_string(),
            section: name,
            reason: format!(
                "range {:#x}+{:#x} is outside the file ({:#x} bytes)",
                sh.sh_offset,
                sh.sh_size,
                data.len()
            ),
        });
    };

    Section::load(owner, name, kind, sh.sh_addr, sh.sh_size, contents)
}
