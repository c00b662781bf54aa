//! Fallback backend built on the `object` crate. Handles ELF as well as PE
//! images and COFF objects.

use std::sync::Arc;

use object::{
    elf, pe, Architecture, BinaryFormat, Object, ObjectSection, ObjectSymbol, ObjectSymbolTable,
    SectionFlags,
};
use once_cell::sync::Lazy;

use crate::error::{LoadError, Result};
use crate::sections::rollback;
use crate::symbols::{lossy_name, record, SymbolSource};
use crate::{Arch, Binary, Bitness, FormatKind, Section, SectionKind, Symbol};

/// BFD-style target names, keyed by container and machine.
struct TargetName {
    format: BinaryFormat,
    arch: Architecture,
    name: &'static str,
}

static TARGETS: Lazy<Vec<TargetName>> = Lazy::new(|| {
    log::debug!("initializing target name table");
    [
        (BinaryFormat::Elf, Architecture::I386, "elf32-i386"),
        (BinaryFormat::Elf, Architecture::X86_64, "elf64-x86-64"),
        (BinaryFormat::Elf, Architecture::X86_64_X32, "elf32-x86-64"),
        (BinaryFormat::Elf, Architecture::Aarch64, "elf64-littleaarch64"),
        (BinaryFormat::Elf, Architecture::Arm, "elf32-littlearm"),
        (BinaryFormat::Coff, Architecture::I386, "pe-i386"),
        (BinaryFormat::Coff, Architecture::X86_64, "pe-x86-64"),
        (BinaryFormat::Pe, Architecture::I386, "pei-i386"),
        (BinaryFormat::Pe, Architecture::X86_64, "pei-x86-64"),
        (BinaryFormat::Pe, Architecture::Aarch64, "pei-aarch64-little"),
    ]
    .into_iter()
    .map(|(format, arch, name)| TargetName { format, arch, name })
    .collect()
});

fn target_name(format: BinaryFormat, arch: Architecture) -> String {
    TARGETS
        .iter()
        .find(|t| t.format == format && t.arch == arch)
        .map(|t| t.name.to_string())
        .unwrap_or_else(|| format!("{:?}-{:?}", format, arch).to_lowercase())
}

fn format_kind(format: BinaryFormat) -> Option<FormatKind> {
    match format {
        BinaryFormat::Elf => Some(FormatKind::Elf),
        BinaryFormat::Coff | BinaryFormat::Pe => Some(FormatKind::Pe),
        _ => None,
    }
}

fn machine(arch: Architecture) -> Option<(Bitness, &'static str)> {
    match arch {
        Architecture::I386 => Some((Bitness::Bits32, "i386")),
        Architecture::X86_64 => Some((Bitness::Bits64, "i386:x86-64")),
        _ => None,
    }
}

pub(super) fn load(filename: &str, data: &[u8]) -> Result<Binary> {
    let file = object::File::parse(data).map_err(|e| {
        LoadError::open(filename, format!("does not look like an executable: {}", e))
    })?;

    let format_name = target_name(file.format(), file.architecture());
    let format = format_kind(file.format()).ok_or_else(|| LoadError::UnsupportedFormat {
        path: filename.to_string(),
        format: format_name.clone(),
    })?;
    let (bits, arch_name) =
        machine(file.architecture()).ok_or_else(|| LoadError::UnsupportedArchitecture {
            path: filename.to_string(),
            arch: format!("{:?}", file.architecture()),
        })?;

    let mut bin = Binary {
        filename: filename.to_string(),
        format,
        format_name,
        entry: file.entry(),
        arch: Arch::X86,
        bits,
        arch_name: arch_name.to_string(),
        sections: Vec::new(),
        symbols: Vec::new(),
    };

    record(
        &mut bin.symbols,
        SymbolSource::Static,
        file.symbol_table().map(functions).unwrap_or_default(),
    );
    record(
        &mut bin.symbols,
        SymbolSource::Dynamic,
        file.dynamic_symbol_table().map(functions).unwrap_or_default(),
    );

    load_sections(&mut bin, candidates(&file))?;
    Ok(bin)
}

/// Function symbols of one table. A name that cannot be read or decoded is
/// kept in lossy form rather than failing the table.
fn functions<'data, T>(table: T) -> Vec<Symbol>
where
    T: ObjectSymbolTable<'data>,
{
    table
        .symbols()
        .filter(|sym| sym.kind() == object::SymbolKind::Text)
        .map(|sym| {
            let name = sym.name_bytes().map(lossy_name).unwrap_or_default();
            Symbol::function(name, sym.address())
        })
        .collect()
}

/// Classifies a section from its raw container flags.
///
/// ELF: executable is code, any other allocated section is data. COFF/PE:
/// `CNT_CODE` is code, `CNT_INITIALIZED_DATA` is data.
fn section_kind(flags: SectionFlags) -> Option<SectionKind> {
    match flags {
        SectionFlags::Elf { sh_flags } => {
            if sh_flags & u64::from(elf::SHF_EXECINSTR) != 0 {
                Some(SectionKind::Code)
            } else if sh_flags & u64::from(elf::SHF_ALLOC) != 0 {
                Some(SectionKind::Data)
            } else {
                None
            }
        }
        SectionFlags::Coff { characteristics } => {
            if characteristics & pe::IMAGE_SCN_CNT_CODE != 0 {
                Some(SectionKind::Code)
            } else if characteristics & pe::IMAGE_SCN_CNT_INITIALIZED_DATA != 0 {
                Some(SectionKind::Data)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A code or data section with file-backed contents, ready to be copied.
struct Candidate<'data> {
    name: String,
    kind: SectionKind,
    vma: u64,
    /// Never larger than the bytes the file holds for the section.
    size: u64,
    contents: std::result::Result<&'data [u8], String>,
}

fn candidates<'data>(file: &object::File<'data>) -> Vec<Candidate<'data>> {
    file.sections()
        .filter_map(|sec| {
            let name = sec
                .name_bytes()
                .map(lossy_name)
                .unwrap_or_else(|_| "<unnamed>".to_string());
            let Some(kind) = section_kind(sec.flags()) else {
                log::trace!("skipping section {}", name);
                return None;
            };
            // NOBITS and zero-fill sections have no file range
            let Some((_, file_size)) = sec.file_range() else {
                log::trace!("skipping section {} without file contents", name);
                return None;
            };
            Some(Candidate {
                name,
                kind,
                vma: sec.address(),
                size: sec.size().min(file_size),
                contents: sec.data().map_err(|e| e.to_string()),
            })
        })
        .collect()
}

/// Copies every candidate into `bin`, rolling back on failure.
fn load_sections(bin: &mut Binary, candidates: Vec<Candidate<'_>>) -> Result<()> {
    let owner: Arc<str> = Arc::from(bin.filename.as_str());

    for candidate in candidates {
        let Candidate {
            name,
            kind,
            vma,
            size,
            contents,
        } = candidate;

        let loaded = match contents {
            Ok(contents) => Section::load(&owner, name, kind, vma, size, contents),
            Err(reason) => Err(LoadError::SectionRead {
                path: bin.filename.clone(),
                section: name,
                reason,
            }),
        };

        match loaded {
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
