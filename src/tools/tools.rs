//! Small CLI over the `cppon` library: validate, reprint under a
//! chosen layout, or read a single value by path.
//!
//! A `clap` `Parser` with an `Operation` subcommand enum, `anyhow` for
//! the binary's own error plumbing (file I/O, `?` across the library's
//! own error type) — a handful of document-wide operations rather than
//! one subcommand per on-disk section.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cppon::{parse, print, validate, visit_path_const, Layout, Mode, PrinterOptions};

/// Inspect and reformat cppon documents.
#[derive(Clone, Debug, Parser)]
struct Args {
    /// Input file to read.
    #[arg(short, long)]
    input: PathBuf,
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Check the file parses without building a tree.
    Validate,
    /// Parse and reprint under a chosen layout.
    Print(PrintArgs),
    /// Parse and read a single value by absolute path.
    Get(GetArgs),
}

#[derive(Clone, Debug, clap::Args)]
struct PrintArgs {
    #[arg(long, value_enum, default_value = "cppon")]
    layout: LayoutArg,
    #[arg(long)]
    pretty: bool,
}

/// Mirrors [`cppon::Layout`]; `clap::ValueEnum` needs its own type to
/// derive the CLI parsing.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LayoutArg {
    Json,
    Cppon,
    Flatten,
    Exact,
}

impl From<LayoutArg> for Layout {
    fn from(layout: LayoutArg) -> Layout {
        match layout {
            LayoutArg::Json => Layout::Json,
            LayoutArg::Cppon => Layout::Cppon,
            LayoutArg::Flatten => Layout::Flatten,
            LayoutArg::Exact => Layout::Exact,
        }
    }
}

#[derive(Clone, Debug, clap::Args)]
struct GetArgs {
    /// Absolute path, e.g. `/a/b/0`.
    path: String,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let bytes = fs::read(&args.input).with_context(|| format!("reading {:?}", args.input))?;

    match &args.operation {
        Operation::Validate => {
            validate(&bytes)?;
            println!("ok");
        }
        Operation::Print(print_args) => {
            let doc = parse(&bytes, Mode::Full)?;
            let options = PrinterOptions {
                layout: print_args.layout.into(),
                pretty: print_args.pretty,
                ..PrinterOptions::default()
            };
            let text = print(&doc, doc.root(), &options)?;
            println!("{text}");
        }
        Operation::Get(get_args) => {
            let doc = parse(&bytes, Mode::Full)?;
            let id = visit_path_const(&doc, doc.root(), &get_args.path)?;
            let text = print(&doc, id, &PrinterOptions::default())?;
            println!("{text}");
        }
    }
    Ok(())
}
