//! Fixture binaries generated with `object::write` and stored in temp files.

use std::io::Write;

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};
use tempfile::NamedTempFile;

pub const TEXT: &[u8] = &[0x55, 0x48, 0x89, 0xe5, 0x31, 0xc0, 0x5d, 0xc3];
pub const DATA: &[u8] = &[0xde, 0xad, 0xbe, 0xef];
pub const BSS_SIZE: u64 = 0x100;

/// An object with `.text` (two functions), `.data`, `.bss` and one data symbol.
pub fn object_bytes(format: BinaryFormat, arch: Architecture) -> Vec<u8> {
    let mut obj = Object::new(format, arch, Endianness::Little);

    let text = obj.section_id(StandardSection::Text);
    let main = obj.append_section_data(text, TEXT, 16);
    let helper = obj.append_section_data(text, &[0xc3], 1);
    for (name, value, size) in [("main", main, TEXT.len() as u64), ("helper", helper, 1)] {
        obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value,
            size,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    let data = obj.section_id(StandardSection::Data);
    let counter = obj.append_section_data(data, DATA, 4);
    obj.add_symbol(Symbol {
        name: b"counter".to_vec(),
        value: counter,
        size: DATA.len() as u64,
        kind: SymbolKind::Data,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(data),
        flags: SymbolFlags::None,
    });

    let bss = obj.section_id(StandardSection::UninitializedData);
    obj.append_section_bss(bss, BSS_SIZE, 8);

    obj.write().expect("fixture object should serialize")
}

pub fn temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

pub fn object_file(format: BinaryFormat, arch: Architecture) -> NamedTempFile {
    temp_file(&object_bytes(format, arch))
}

pub fn elf64() -> NamedTempFile {
    object_file(BinaryFormat::Elf, Architecture::X86_64)
}

pub fn elf32() -> NamedTempFile {
    object_file(BinaryFormat::Elf, Architecture::I386)
}

pub fn elf_aarch64() -> NamedTempFile {
    object_file(BinaryFormat::Elf, Architecture::Aarch64)
}

pub fn coff64() -> NamedTempFile {
    object_file(BinaryFormat::Coff, Architecture::X86_64)
}

pub const PE_IMAGE_BASE: u64 = 0x1_4000_0000;
pub const PE_TEXT_RVA: u32 = 0x1000;
/// File offset of the `.data` raw contents in [`pe_image`].
pub const PE_DATA_RAW: u32 = 0x400;
pub const PE_RAW_SIZE: u32 = 0x200;

fn put16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

/// A minimal PE32+ x86-64 image with `.text`, `.data` and `.bss`.
///
/// `object::write` only emits COFF objects, so the image is laid out by hand.
/// `.data` takes its `VirtualSize` and `PointerToRawData` from the caller.
pub fn pe_image(data_virtual_size: u32, data_pointer: u32) -> Vec<u8> {
    let mut image = vec![0u8; 0x600];
    image[..2].copy_from_slice(b"MZ");
    put32(&mut image, 0x3c, 0x40);
    image[0x40..0x44].copy_from_slice(b"PE\0\0");

    // IMAGE_FILE_HEADER
    put16(&mut image, 0x44, 0x8664);
    put16(&mut image, 0x46, 3);
    put16(&mut image, 0x54, 240);
    put16(&mut image, 0x56, 0x22);

    // IMAGE_OPTIONAL_HEADER64, 16 empty data directories
    let opt = 0x58;
    put16(&mut image, opt, 0x20b);
    put32(&mut image, opt + 16, PE_TEXT_RVA);
    put64(&mut image, opt + 24, PE_IMAGE_BASE);
    put32(&mut image, opt + 32, 0x1000);
    put32(&mut image, opt + 36, 0x200);
    put32(&mut image, opt + 56, 0x4000);
    put32(&mut image, opt + 60, 0x200);
    put16(&mut image, opt + 68, 3);
    put32(&mut image, opt + 108, 16);

    let sections = [
        (b".text\0\0\0", TEXT.len() as u32, PE_TEXT_RVA, PE_RAW_SIZE, 0x200, 0x6000_0020),
        (b".data\0\0\0", data_virtual_size, 0x2000, PE_RAW_SIZE, data_pointer, 0xc000_0040),
        (b".bss\0\0\0\0", BSS_SIZE as u32, 0x3000, 0, 0, 0xc000_0080),
    ];
    for (i, (name, virtual_size, rva, raw_size, raw_pointer, flags)) in
        sections.into_iter().enumerate()
    {
        let at = opt + 240 + i * 40;
        image[at..at + 8].copy_from_slice(name);
        put32(&mut image, at + 8, virtual_size);
        put32(&mut image, at + 12, rva);
        put32(&mut image, at + 16, raw_size);
        put32(&mut image, at + 20, raw_pointer);
        put32(&mut image, at + 36, flags);
    }

    image[0x200..0x200 + TEXT.len()].copy_from_slice(TEXT);
    let data = PE_DATA_RAW as usize;
    image[data..data + DATA.len()].copy_from_slice(DATA);
    image
}

pub fn pe64() -> NamedTempFile {
    temp_file(&pe_image(DATA.len() as u32, PE_DATA_RAW))
}

/// Overwrites the first byte of the first NUL-terminated occurrence of `name`.
pub fn corrupt_string(bytes: &mut [u8], name: &str) {
    let needle = [name.as_bytes(), &[0]].concat();
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .expect("string is present in the fixture");
    bytes[at] = 0xff;
}
