//! romshelf CLI
//!
//! Command-line frontend for the library reconciliation engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use romshelf_catalog::CatalogClient;
use romshelf_core::{Catalog, CatalogEntry, CatalogError, GameStore, ReconciliationResult};
use romshelf_db::SqliteStore;
use romshelf_engine::{CancelFlag, Reconciler, ScanEvent, ScanStage, Settings, settings_path};

mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "romshelf")]
#[command(about = "Reconcile a game library against its collection database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a library root and reconcile it against the collection
    Scan {
        /// Library root containing platform folders
        root: PathBuf,

        /// Metadata catalog base URL (offline when omitted: files without
        /// a known game are reported unresolved)
        #[arg(long)]
        catalog_url: Option<String>,

        /// Collection database path (default: data dir)
        #[arg(long)]
        db: Option<PathBuf>,

        /// File extensions to scan (e.g. nes,sfc,iso)
        #[arg(short, long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,

        /// Concurrent hashing workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Auto-accept confidence threshold (0.0 to 1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Also refresh metadata on files already linked to a game
        #[arg(long)]
        refresh: bool,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Manage engine settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective settings
    Show,

    /// Write the effective settings to the settings file (defaults on a
    /// fresh install)
    Init,

    /// Print the settings file path
    Path,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Scan {
            root,
            catalog_url,
            db,
            extensions,
            workers,
            threshold,
            refresh,
            json,
        } => run_scan(ScanArgs {
            root,
            catalog_url,
            db,
            extensions,
            workers,
            threshold,
            refresh,
            json,
        }),
        Commands::Config { action } => run_config(action),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct ScanArgs {
    root: PathBuf,
    catalog_url: Option<String>,
    db: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    workers: Option<usize>,
    threshold: Option<f32>,
    refresh: bool,
    json: bool,
}

/// Catalog used when no catalog URL is configured. Every lookup comes back
/// empty, so unmatched files land in the unresolved bucket.
struct NullCatalog;

impl Catalog for NullCatalog {
    async fn search(
        &self,
        _title: &str,
        _platform: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(Vec::new())
    }
}

fn run_scan(args: ScanArgs) -> Result<(), CliError> {
    let mut settings = Settings::load();
    if let Some(exts) = args.extensions {
        settings.extensions = exts;
    }
    if let Some(workers) = args.workers {
        settings.hash_workers = workers;
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CliError::other(format!(
                "threshold must be between 0.0 and 1.0, got {threshold}"
            )));
        }
        settings.confidence_threshold = threshold;
    }
    if args.refresh {
        settings.refresh_existing = true;
    }

    let db_path = match args.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(&db_path)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;

    rt.block_on(async {
        match &args.catalog_url {
            Some(url) => {
                let catalog = CatalogClient::new(url.clone(), settings.catalog_timeout())?;
                drive(store, catalog, settings, &args.root, args.json).await
            }
            None => {
                log::info!("no catalog URL configured, scanning offline");
                drive(store, NullCatalog, settings, &args.root, args.json).await
            }
        }
    })
}

/// Run one reconciliation with progress output and ctrl-c cancellation.
async fn drive<S: GameStore, C: Catalog>(
    store: S,
    catalog: C,
    settings: Settings,
    root: &std::path::Path,
    json: bool,
) -> Result<(), CliError> {
    let reconciler = Reconciler::new(store, catalog, settings);
    let cancel = CancelFlag::new();

    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling, finishing in-flight work...");
            watcher_cancel.cancel();
        }
    });

    // Progress goes to stdout in summary mode. In JSON mode stdout carries
    // only the result document.
    let (printer, events) = if json {
        (None, None)
    } else {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                print_event(&ev);
            }
        });
        (Some(handle), Some(tx))
    };

    let result = reconciler.run(root, &cancel, events).await?;

    if let Some(handle) = printer {
        let _ = handle.await;
    }
    watcher.abort();

    if json {
        let doc = serde_json::to_string_pretty(&result).map_err(|e| CliError::other(e.to_string()))?;
        println!("{doc}");
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_event(ev: &ScanEvent) {
    match ev {
        ScanEvent::StageChanged(stage) => match stage {
            ScanStage::Walking => println!("Walking library..."),
            ScanStage::Identifying => println!("Identifying files..."),
            ScanStage::Resolving => println!("Resolving against catalog..."),
            ScanStage::Committing => println!("Committing accepted matches..."),
            _ => {}
        },
        ScanEvent::WalkComplete { total } => println!("  {total} files found"),
        ScanEvent::FileHashed { path } => log::debug!("hashed {}", path.display()),
        ScanEvent::FileSkipped { path, error } => {
            println!("  skipped {}: {error}", path.display());
        }
        ScanEvent::DuplicateFound { path } => {
            println!("  duplicate {}", path.display());
        }
        ScanEvent::FileResolved { path, candidates } => {
            log::debug!("{} candidate(s) for {}", candidates, path.display());
        }
        ScanEvent::FileUnresolved { path, reason } => {
            println!("  unresolved {}: {reason}", path.display());
        }
        ScanEvent::UpdateApplied { path, game_id } => {
            println!("  applied {} -> game {game_id}", path.display());
        }
        ScanEvent::CommitFailed { path, error } => {
            println!("  commit failed {}: {error}", path.display());
        }
        ScanEvent::Cancelled => println!("Scan cancelled."),
        ScanEvent::Done => {}
    }
}

fn print_summary(result: &ReconciliationResult) {
    println!();
    println!("Scan {}", if result.cancelled { "cancelled" } else { "complete" });
    println!("  registered:       {}", result.new_files());
    println!("  duplicate groups: {}", result.duplicate_count());
    for group in &result.duplicates {
        println!("    {}", group.identity);
        for loc in &group.locations {
            match loc.game_id {
                Some(id) => println!("      {} (game {id})", loc.path.display()),
                None => println!("      {}", loc.path.display()),
            }
        }
    }
    println!("  applied:          {}", result.applied.len());
    println!("  pending review:   {}", result.needs_confirmation());
    for pending in &result.pending {
        println!("    {}", pending.path.display());
        for c in pending.candidates.iter().take(3) {
            println!("      {:.2}  {}", c.confidence, c.title);
        }
    }
    println!("  unresolved:       {}", result.unresolved.len());
    println!("  skipped:          {}", result.skipped.len());
    if !result.commit_failures.is_empty() {
        println!("  commit failures:  {}", result.commit_failures.len());
        for f in &result.commit_failures {
            println!("    {}: {}", f.path.display(), f.error);
        }
    }
    for w in &result.warnings {
        println!("  warning: {w}");
    }
}

fn run_config(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load();
            let doc = toml::to_string_pretty(&settings).map_err(|e| CliError::other(e.to_string()))?;
            print!("{doc}");
            Ok(())
        }
        ConfigAction::Init => {
            let settings = Settings::load();
            settings.save()?;
            println!("Wrote {}", settings_path().display());
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", settings_path().display());
            Ok(())
        }
    }
}

/// Default collection database location, e.g.
/// `~/.local/share/romshelf/collection.db`.
fn default_db_path() -> Result<PathBuf, CliError> {
    let data = dirs::data_dir().ok_or_else(|| CliError::other("could not determine data directory"))?;
    Ok(data.join("romshelf").join("collection.db"))
}
