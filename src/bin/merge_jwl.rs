// CLI front end (SPEC_FULL.md §12).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use merge_jwl::config::{Config, IncludeFlags};
use merge_jwl::{archive, db::Session, manifest::Manifest};

#[derive(Parser)]
#[command(name = "merge-jwl", about = "Merge reading-app backup archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge two or more archives into one.
    Merge(MergeArgs),
    /// Print an archive's manifest and per-table row counts without merging.
    Inspect { archive: PathBuf },
}

#[derive(Args)]
struct MergeArgs {
    #[arg(required = true, num_args = 2..)]
    source: Vec<PathBuf>,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    no_notes: bool,
    #[arg(long)]
    no_bookmarks: bool,
    #[arg(long)]
    no_highlights: bool,
    #[arg(long)]
    no_tags: bool,
    #[arg(long)]
    no_inputfields: bool,
    #[arg(long)]
    no_playlists: bool,

    #[arg(long)]
    size_limit_mb: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Inspect { archive } => run_inspect(&archive),
    }
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let mut sources = Vec::with_capacity(args.source.len());
    for path in &args.source {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        sources.push(bytes);
    }

    let mut config = Config::default();
    config.include = IncludeFlags {
        notes: !args.no_notes,
        bookmarks: !args.no_bookmarks,
        highlights: !args.no_highlights,
        tags: !args.no_tags,
        inputfields: !args.no_inputfields,
        playlists: !args.no_playlists,
    };
    if let Some(mb) = args.size_limit_mb {
        config.size_limit_bytes = mb * 1024 * 1024;
    }

    let output = merge_jwl::merge(&sources, config).with_context(|| "merge failed")?;

    let output_path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let dir = args.source[0].parent().unwrap_or_else(|| std::path::Path::new("."));
            dir.join(&output.filename)
        }
    };

    fs::write(&output_path, &output.archive)
        .with_context(|| format!("writing {}", output_path.display()))?;

    log::info!(
        "wrote {} ({} bytes); orphaned marks={}, orphaned notes={}, duplicate locations={}",
        output_path.display(),
        output.archive.len(),
        output.validation.orphaned_marks,
        output.validation.orphaned_notes,
        output.validation.duplicate_locations,
    );
    println!("merged archive written to {}", output_path.display());
    if output.validation.orphaned_marks > 0 || output.validation.orphaned_notes > 0 {
        println!(
            "warning: {} orphaned marks, {} orphaned notes",
            output.validation.orphaned_marks, output.validation.orphaned_notes
        );
    }
    Ok(())
}

fn run_inspect(path: &PathBuf) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let contents = archive::read_archive(&bytes)?;
    let manifest = Manifest::parse(&contents.manifest)?;

    println!("name: {}", manifest.name);
    println!("creationDate: {}", manifest.creation_date);
    println!("schemaVersion: {}", manifest.user_data_backup.schema_version);
    println!("hash: {}", manifest.user_data_backup.hash);
    println!("media entries: {}", contents.media.len());

    let session = Session::open(&contents.database)?;
    let Ok(tables) = session.tables() else {
        bail!("could not enumerate tables");
    };
    println!("tables:");
    for table in tables {
        let rows = session.query(&format!("SELECT COUNT(*) FROM \"{table}\""), &[], |row| {
            row.get::<_, i64>(0)
        })?;
        println!("  {table}: {} rows", rows.first().copied().unwrap_or(0));
    }
    Ok(())
}
