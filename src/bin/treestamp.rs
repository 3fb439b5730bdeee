//! # treestamp CLI - Directory metadata snapshots
//!
//! A command-line interface for the treestamp library.
//!
//! ## Features
//! - Record timestamps, sizes and hashes of a directory tree
//! - Validate a tree against a recorded snapshot
//! - Restore recorded timestamps after a copy or a sync
//! - List the content of a snapshot
//! - Extract, add and remove subtrees of snapshots
//!
//! ## Usage
//! ```bash
//! # Record a tree (writes photos_Info.json next to photos/)
//! treestamp save photos -r --file-props last-write-time,size,hash
//!
//! # Compare the live tree with the snapshot
//! treestamp validate photos -r --file-props last-write-time,size,hash
//!
//! # Put the recorded timestamps back
//! treestamp restore photos -r
//!
//! # Move the record of photos/2023 into its own snapshot
//! treestamp extract photos_Info.json 2023 2023_Info.json
//! treestamp remove photos_Info.json 2023 --overwrite
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use treestamp::{
    editor, record, ConsoleReporter, InfoProperty, Mode, PropertySet, ReconcilerBuilder,
    RecorderBuilder, Result,
};

/// treestamp CLI - record, validate and restore directory metadata
#[derive(Parser)]
#[command(name = "treestamp")]
#[command(version)]
#[command(about = "Record, validate and restore the timestamps of directory trees")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a directory into an info file
    Save {
        /// Directory to record
        dir: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Replace an existing info file
        #[arg(long)]
        overwrite: bool,
    },

    /// Compare a directory with its info file
    Validate {
        /// Directory to compare
        dir: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Hash files with asynchronous reads
        #[arg(long)]
        fast_hash: bool,

        /// Hide entries without differences
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write the recorded timestamps back to a directory
    Restore {
        /// Directory to restore
        dir: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Hide entries that were already correct
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the content of an info file
    List {
        /// Directory the info file belongs to
        #[arg(required_unless_present = "info_file")]
        dir: Option<PathBuf>,

        #[command(flatten)]
        selection: Selection,
    },

    /// Copy a subdirectory record into its own info file
    Extract {
        /// Info file to read from
        base: PathBuf,
        /// Path of the subdirectory inside the base info file
        relative_path: String,
        /// Info file to write
        sub: PathBuf,
        /// Replace an existing sub info file
        #[arg(long)]
        overwrite: bool,
    },

    /// Insert an info file as a subdirectory of another
    Add {
        /// Info file to modify
        base: PathBuf,
        /// Path of the new subdirectory inside the base info file
        relative_path: String,
        /// Info file to insert
        sub: PathBuf,
        /// Confirm that the base info file is rewritten
        #[arg(long)]
        overwrite: bool,
    },

    /// Remove a subdirectory record from an info file
    Remove {
        /// Info file to modify
        base: PathBuf,
        /// Path of the subdirectory inside the base info file
        relative_path: String,
        /// Confirm that the base info file is rewritten
        #[arg(long)]
        overwrite: bool,
    },
}

/// Options shared by the tree commands
#[derive(Args)]
struct Selection {
    /// Info file (defaults to <dir>_Info.json next to the directory)
    #[arg(short = 'i', long = "info-file")]
    info_file: Option<PathBuf>,

    /// Process subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// File properties (comma separated)
    #[arg(long, value_delimiter = ',')]
    file_props: Option<Vec<PropertyArg>>,

    /// Directory properties (comma separated)
    #[arg(long, value_delimiter = ',')]
    dir_props: Option<Vec<PropertyArg>>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum PropertyArg {
    CreationTime,
    LastWriteTime,
    LastAccessTime,
    Size,
    Hash,
}

impl From<PropertyArg> for InfoProperty {
    fn from(arg: PropertyArg) -> Self {
        match arg {
            PropertyArg::CreationTime => InfoProperty::CreationTime,
            PropertyArg::LastWriteTime => InfoProperty::LastWriteTime,
            PropertyArg::LastAccessTime => InfoProperty::LastAccessTime,
            PropertyArg::Size => InfoProperty::Size,
            PropertyArg::Hash => InfoProperty::Hash,
        }
    }
}

fn to_property_set(args: Option<Vec<PropertyArg>>) -> Option<PropertySet> {
    args.map(|args| args.into_iter().map(InfoProperty::from).collect())
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Disable colors if needed
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    // Run command
    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Save {
            dir,
            selection,
            overwrite,
        } => cmd_save(dir, selection, overwrite),
        Commands::Validate {
            dir,
            selection,
            fast_hash,
            quiet,
        } => cmd_reconcile(Mode::Validate, dir, selection, fast_hash, quiet),
        Commands::Restore {
            dir,
            selection,
            quiet,
        } => cmd_reconcile(Mode::Restore, dir, selection, false, quiet),
        Commands::List { dir, selection } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            cmd_reconcile(Mode::List, dir, selection, false, false)
        }
        Commands::Extract {
            base,
            relative_path,
            sub,
            overwrite,
        } => cmd_extract(base, relative_path, sub, overwrite),
        Commands::Add {
            base,
            relative_path,
            sub,
            overwrite,
        } => cmd_add(base, relative_path, sub, overwrite),
        Commands::Remove {
            base,
            relative_path,
            overwrite,
        } => cmd_remove(base, relative_path, overwrite),
    }
}

/// Resolve the info file of `dir`, defaulting to `<dirname>_Info.json`
fn resolve_info_file(dir: &Path, info_file: Option<PathBuf>) -> Result<PathBuf> {
    match info_file {
        Some(info_file) => Ok(info_file),
        None => {
            let absolute = fs::canonicalize(dir).or_else(|_| std::path::absolute(dir))?;
            record::default_info_file(&absolute)
        }
    }
}

/// Record a directory
fn cmd_save(dir: PathBuf, selection: Selection, overwrite: bool) -> Result<()> {
    let info_file = resolve_info_file(&dir, selection.info_file)?;

    let mut builder = RecorderBuilder::new().recursive(selection.recursive);
    if let Some(properties) = to_property_set(selection.file_props) {
        builder = builder.file_properties(properties);
    }
    if let Some(properties) = to_property_set(selection.dir_props) {
        builder = builder.directory_properties(properties);
    }

    builder
        .build()
        .save(&dir, &info_file, overwrite, &mut ConsoleReporter::new())?;

    println!(
        "{} Saved info file {}",
        "✓".green().bold(),
        info_file.display().to_string().cyan()
    );
    Ok(())
}

/// Validate, restore or list
fn cmd_reconcile(
    mode: Mode,
    dir: PathBuf,
    selection: Selection,
    fast_hash: bool,
    quiet: bool,
) -> Result<()> {
    let info_file = resolve_info_file(&dir, selection.info_file)?;

    let mut builder = ReconcilerBuilder::new(mode)
        .recursive(selection.recursive)
        .fast_hash(fast_hash);
    if let Some(properties) = to_property_set(selection.file_props) {
        builder = builder.file_properties(properties);
    }
    if let Some(properties) = to_property_set(selection.dir_props) {
        builder = builder.directory_properties(properties);
    }

    let mut reporter = ConsoleReporter::new().quiet_same(quiet);
    let stats = builder.build().run(&dir, &info_file, &mut reporter)?;

    match mode {
        Mode::List => {}
        _ if stats.is_clean() => {
            println!("{} Directory matches the info file", "✓".green().bold());
        }
        _ => {
            println!(
                "{} {} changed, {} missing, {} unknown",
                "!".yellow().bold(),
                stats.changed.total().to_string().yellow(),
                stats.missing.total().to_string().yellow(),
                stats.unknown.total().to_string().yellow()
            );
        }
    }
    Ok(())
}

/// Extract a subtree into its own info file
fn cmd_extract(base: PathBuf, relative_path: String, sub: PathBuf, overwrite: bool) -> Result<()> {
    println!("{}", "Extracting sub directory info...".blue().bold());
    print_edit_header(&base, &relative_path, Some(&sub), overwrite);

    let extracted = editor::extract_subtree(&base, &relative_path, &sub, overwrite)?;
    let (files, directories) = extracted.directory.count_descendants();

    println!(
        "{} Extracted {} into {}",
        "✓".green().bold(),
        extracted.directory.name.yellow(),
        sub.display().to_string().cyan()
    );
    print_counts(files, directories);
    Ok(())
}

/// Graft an info file into another
fn cmd_add(base: PathBuf, relative_path: String, sub: PathBuf, overwrite: bool) -> Result<()> {
    println!("{}", "Adding sub directory info...".blue().bold());
    print_edit_header(&base, &relative_path, Some(&sub), overwrite);

    let outcome = editor::add_subtree(&base, &relative_path, &sub, overwrite)?;
    if outcome.renamed() {
        println!(
            "  Added directory is renamed from {} to {}",
            outcome.original_name.yellow(),
            outcome.name.yellow()
        );
    }
    println!(
        "{} Added {} to {}",
        "✓".green().bold(),
        relative_path.yellow(),
        base.display().to_string().cyan()
    );
    Ok(())
}

/// Prune a subtree from an info file
fn cmd_remove(base: PathBuf, relative_path: String, overwrite: bool) -> Result<()> {
    println!("{}", "Removing sub directory info...".blue().bold());
    print_edit_header(&base, &relative_path, None, overwrite);

    let removed = editor::remove_subtree(&base, &relative_path, overwrite)?;
    let (files, directories) = removed.count_descendants();

    println!(
        "{} Removed {} from {}",
        "✓".green().bold(),
        relative_path.yellow(),
        base.display().to_string().cyan()
    );
    print_counts(files, directories);
    Ok(())
}

/// Print the size of a moved subtree, counting its top directory
fn print_counts(files: usize, directories: usize) {
    println!("  Files: {}", files.to_string().cyan());
    println!("  Directories: {}", (directories + 1).to_string().cyan());
}

fn print_edit_header(base: &Path, relative_path: &str, sub: Option<&Path>, overwrite: bool) {
    println!("  Base info file: {}", base.display().to_string().cyan());
    println!("  Relative path: {}", relative_path.cyan());
    if let Some(sub) = sub {
        println!("  Sub info file: {}", sub.display().to_string().cyan());
    }
    println!("  Overwrite: {}", overwrite.to_string().cyan());
    println!();
}
