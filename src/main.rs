mod definitions;
mod graph;
mod parenthetical;
mod parser;
mod pipeline;
mod provider;
mod settings;
mod sources;
mod util;
mod writer;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use graph::{GraphStats, GraphStore, MemoryGraph, SqliteGraph};
use provider::{CachedJsonProvider, FieldProvider, InfoboxFlattener};
use settings::Settings;

#[derive(Parser)]
#[command(name = "stardew_graph", about = "Stardew Valley wiki pages → knowledge graph")]
struct Cli {
    /// Directory of saved page markup (*.txt)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// SQLite graph database
    #[arg(long = "db", global = true)]
    db_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the whole graph from the saved pages
    Build {
        /// Write into an in-memory graph and only report
        #[arg(long)]
        dry_run: bool,
        /// Empty the database first
        #[arg(long)]
        fresh: bool,
        /// Cached field maps (JSON object keyed by page name)
        #[arg(long)]
        fields: Option<PathBuf>,
        /// Bundle list (JSON)
        #[arg(long)]
        bundles: Option<PathBuf>,
    },
    /// Show what one page parses into
    Inspect {
        /// Page title, e.g. "Complete_Breakfast"
        title: String,
    },
    /// Write the calendar only
    Dates {
        #[arg(long)]
        dry_run: bool,
    },
    /// Node and relationship counts
    Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    if let Some(db) = cli.db_path {
        settings.db_path = db;
    }
    info!(settings = ?settings, "settings loaded");

    let result = match cli.command {
        Commands::Build { dry_run, fresh, fields, bundles } => {
            if let Some(f) = fields {
                settings.fields_path = Some(f);
            }
            if let Some(b) = bundles {
                settings.bundles_path = Some(b);
            }
            build(&settings, dry_run, fresh)
        }
        Commands::Inspect { title } => inspect(&settings, &title),
        Commands::Dates { dry_run } => {
            let mut store = open_store(&settings, dry_run)?;
            let report = writer::calendar::create_dates(store.as_mut());
            println!(
                "Wrote {} calendar relationships ({} failures).",
                report.relationships,
                report.failures.len()
            );
            print_stats(&store.stats()?);
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteGraph::open(&settings.db_path)?;
            print_stats(&store.stats()?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build(settings: &Settings, dry_run: bool, fresh: bool) -> anyhow::Result<()> {
    let t_load = Instant::now();
    let pages = sources::load_pages(&settings.data_dir)?;
    if pages.is_empty() {
        println!("No pages in {}.", settings.data_dir.display());
        return Ok(());
    }
    println!("Parsed {} pages in {:.1}s", pages.len(), t_load.elapsed().as_secs_f64());

    let bundles = match &settings.bundles_path {
        Some(path) => sources::load_bundles(path)?,
        None => Vec::new(),
    };
    let provider: Box<dyn FieldProvider> = match &settings.fields_path {
        Some(path) => Box::new(CachedJsonProvider::load(path)?),
        None => {
            info!("no field cache, flattening infobox markup");
            Box::new(InfoboxFlattener)
        }
    };

    let mut store: Box<dyn GraphStore> = if fresh && !dry_run {
        ensure_parent(&settings.db_path)?;
        let mut db = SqliteGraph::open(&settings.db_path)?;
        db.clear()?;
        info!(db = %settings.db_path.display(), "database cleared");
        Box::new(db)
    } else {
        open_store(settings, dry_run)?
    };

    let t_write = Instant::now();
    let report = pipeline::run(store.as_mut(), &pages, provider.as_ref(), &bundles)?;
    report.log();
    println!(
        "Wrote {} pages ({} skipped, {} relationships, {} failures) in {:.1}s",
        report.written,
        report.skipped,
        report.relationships,
        report.failures.len(),
        t_write.elapsed().as_secs_f64()
    );
    for f in report.failures.iter().take(20) {
        println!("  {} [{}] {:?}: {}", f.page, f.field, f.entry, f.error);
    }
    if report.failures.len() > 20 {
        println!("  ... and {} more", report.failures.len() - 20);
    }

    print_stats(&store.stats()?);
    Ok(())
}

fn open_store(settings: &Settings, dry_run: bool) -> anyhow::Result<Box<dyn GraphStore>> {
    if dry_run {
        return Ok(Box::new(MemoryGraph::new()));
    }
    ensure_parent(&settings.db_path)?;
    Ok(Box::new(SqliteGraph::open(&settings.db_path)?))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display())),
        _ => Ok(()),
    }
}

fn inspect(settings: &Settings, title: &str) -> anyhow::Result<()> {
    let wanted = title.replace(' ', "_");
    let file = sources::discover(&settings.data_dir)?
        .into_iter()
        .find(|f| f.title == wanted || f.title == title)
        .with_context(|| format!("no page {:?} in {}", title, settings.data_dir.display()))?;
    let source = std::fs::read_to_string(&file.path)
        .with_context(|| format!("reading {}", file.path.display()))?;
    let page = parser::Page::parse(&file.title, &source);

    let out = json!({
        "title": page.title,
        "name": page.name,
        "type": page.infobox_type(),
        "fields": page.infobox.as_ref().map(|i| i.fields_json()),
        "flattened": page.infobox.as_ref().and_then(|i| InfoboxFlattener::flatten(&i.raw)),
        "headings": page.headings(None),
        "categories": page.categories,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_stats(stats: &GraphStats) {
    println!("Nodes:         {}", stats.nodes);
    println!("Relationships: {}", stats.relationships);
    for (label, n) in &stats.by_label {
        println!("  :{:<20} {}", label, n);
    }
    for (ty, n) in &stats.by_type {
        println!("  -{:<20} {}", ty, n);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
