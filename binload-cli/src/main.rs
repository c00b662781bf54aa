use anyhow::{Context, Result, bail};
use binload_core::{Binary, FormatHint, SectionKind};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

/// Load an ELF or PE binary and print what the loader found
#[derive(Parser)]
#[command(
    name = "binload",
    about = "Inspect ELF and PE binaries (metadata, sections, and function symbols)",
    version,
    author
)]
struct Cli {
    /// Path to binary file
    #[arg(required = true)]
    path: std::path::PathBuf,

    /// Format to load the binary as (auto, elf, pe)
    #[arg(short, long, default_value = "auto")]
    format: FormatHint,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, architecture and entry point
    Info,
    /// List code and data sections
    Sections,
    /// List function symbols
    Symbols,
    /// Hex dump the contents of one section
    Dump {
        /// Section name, e.g. .text
        name: String,
    },
}

#[derive(Tabled, Serialize)]
struct SectionRow {
    #[tabled(rename = "Section")]
    name: String,
    #[tabled(rename = "VMA")]
    vma: String,
    #[tabled(rename = "Size")]
    size: u64,
    #[tabled(rename = "Kind")]
    kind: String,
}

#[derive(Tabled, Serialize)]
struct SymbolRow {
    #[tabled(rename = "Symbol")]
    name: String,
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

fn kind_label(kind: SectionKind) -> String {
    match kind {
        SectionKind::Code => kind.to_string().green().to_string(),
        SectionKind::Data => kind.to_string().cyan().to_string(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn info(bin: &Binary, json: bool) -> Result<()> {
    if json {
        return print_json(bin);
    }

    println!(
        "loaded binary '{}' {}/{} ({}/{} bits) entry@0x{:016x}",
        bin.filename.bold(),
        bin.format,
        bin.format_name,
        bin.arch_name,
        bin.bits,
        bin.entry
    );
    Ok(())
}

fn sections(bin: &Binary, json: bool) -> Result<()> {
    if bin.sections.is_empty() && !json {
        println!("No code or data sections found.");
        return Ok(());
    }

    let rows: Vec<SectionRow> = bin
        .sections
        .iter()
        .map(|s| SectionRow {
            name: s.name.clone(),
            vma: format!("0x{:016x}", s.vma),
            size: s.size,
            kind: if json { s.kind.to_string() } else { kind_label(s.kind) },
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    println!("{}", Table::new(rows).with(Style::modern()));
    Ok(())
}

fn symbols(bin: &Binary, json: bool) -> Result<()> {
    if bin.symbols.is_empty() && !json {
        println!("No function symbols found (stripped binary?).");
        return Ok(());
    }

    let rows: Vec<SymbolRow> = bin
        .symbols
        .iter()
        .map(|s| SymbolRow {
            name: s.name.clone(),
            addr: format!("0x{:016x}", s.addr),
            kind: s.kind.to_string(),
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    println!("{}", Table::new(rows).with(Style::modern()));
    Ok(())
}

fn dump(bin: &Binary, name: &str, json: bool) -> Result<()> {
    let Some(section) = bin.sections.iter().find(|s| s.name == name) else {
        bail!("no code or data section named '{}' in {}", name, bin.filename);
    };
    let bytes = section
        .bytes()
        .with_context(|| format!("section '{}' has been released", name))?;

    if json {
        #[derive(Serialize)]
        struct Dump<'a> {
            name: &'a str,
            vma: u64,
            bytes: &'a [u8],
        }
        return print_json(&Dump {
            name,
            vma: section.vma,
            bytes,
        });
    }

    for (i, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!(
            "{:016x}  {:<47}  {}",
            section.vma + (i as u64) * 16,
            hex.join(" "),
            ascii
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut bin = binload_core::load(&cli.path, cli.format)
        .with_context(|| format!("failed to load {}", cli.path.display()))?;
    log::debug!("{} section(s), {} symbol(s)", bin.sections.len(), bin.symbols.len());

    let outcome = match &cli.command {
        Command::Info => info(&bin, cli.json),
        Command::Sections => sections(&bin, cli.json),
        Command::Symbols => symbols(&bin, cli.json),
        Command::Dump { name } => dump(&bin, name, cli.json),
    };

    bin.unload();
    outcome
}
