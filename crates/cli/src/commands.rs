use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use narrivo_config::{Config, ConfigManager};
use narrivo_core::{format_clock, AppError, AssetKind, Book, BookId, Bookmark};
use narrivo_library::{
    process_import, BookRegistry, FileStore, ImportCandidate, ImportMatcher, ImportOutcome,
    KeyValueStore, LibraryError, MatchThresholds, StaticCatalog,
};
use narrivo_media_engine::{ChapterUnits, EngineError, SyncCursor};
use narrivo_network::{
    Client, ClientConfig, DownloadCoordinator, DownloadJob, DownloadStatus, HttpTransfer, JobId,
    NetworkError, StartOutcome,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Loaded configuration plus the persisted library
pub struct Library {
    pub config: Config,
    pub manager: ConfigManager,
    pub registry: BookRegistry,
}

impl Library {
    pub async fn open(config_dir: Option<&str>) -> Result<Self> {
        let manager = config_manager(config_dir)?;
        let config = manager.load_or_default();

        let data_dir = manager.resolve_data_path(&config.app.data_dir);
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(data_dir));
        let mut registry = BookRegistry::load(store)
            .await
            .context("Failed to load library")?;

        if config.app.seed_catalog {
            registry
                .seed(&StaticCatalog::public_domain())
                .await
                .context("Failed to seed catalog")?;
        }

        Ok(Self {
            config,
            manager,
            registry,
        })
    }

    pub fn download_dir(&self) -> PathBuf {
        self.manager
            .resolve_data_path(&self.config.downloads.download_dir)
    }

    pub fn book(&self, id: &BookId) -> Result<&Book> {
        Ok(self
            .registry
            .get(id)
            .ok_or_else(|| AppError::book_not_found(id.to_string()))?)
    }

    /// Retries a write that failed during the command
    async fn save(&mut self) -> Result<()> {
        if self.registry.is_dirty() {
            self.registry
                .flush()
                .await
                .context("Failed to save library")?;
        }
        Ok(())
    }
}

/// Outcome of importing a batch of files
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub created: Vec<BookId>,
    pub merged: Vec<BookId>,
    pub skipped: Vec<String>,
    pub rejected: Vec<String>,
}

/// Write the default config and create the data directory
pub fn init(config_dir: Option<&str>) -> Result<()> {
    let manager = config_manager(config_dir)?;
    let created = manager
        .initialize()
        .context("Failed to write config file")?;

    let config = manager.load_or_default();
    let data_dir = manager.resolve_data_path(&config.app.data_dir);
    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }
    println!("Library data: {}", data_dir.display());

    Ok(())
}

/// Add the built-in catalog
pub async fn seed(library: &mut Library) -> Result<()> {
    let catalog = StaticCatalog::public_domain();
    let added = library
        .registry
        .seed(&catalog)
        .await
        .context("Failed to seed catalog")?;
    library.save().await?;

    if added == 0 {
        println!("Catalog already present ({} books in library)", library.registry.len());
    } else {
        println!("{} Added {} catalog books", style("✓").green().bold(), added);
    }
    Ok(())
}

/// Import files given on the command line
pub async fn import(library: &mut Library, matches: &ArgMatches) -> Result<()> {
    let paths: Vec<PathBuf> = matches
        .get_many::<String>("files")
        .ok_or_else(|| anyhow::anyhow!("At least one file is required"))?
        .map(PathBuf::from)
        .collect();
    let assume_yes = matches.get_flag("yes");

    let summary = import_paths(library, &paths, |outcome, title| {
        if assume_yes {
            return Ok(true);
        }
        let similarity = match outcome {
            ImportOutcome::Merge { result, .. } => result.confidence * 100.0,
            ImportOutcome::Create { .. } => 100.0,
        };
        confirm(&format!(
            "Add this file to '{}' ({:.0}% similar)? (y/N)",
            title, similarity
        ))
    })
    .await?;

    for id in &summary.created {
        println!("{} Created {}", style("✓").green().bold(), id);
    }
    for id in &summary.merged {
        println!("{} Merged into {}", style("✓").green().bold(), id);
    }
    for name in &summary.skipped {
        println!("{} Skipped {}", style("-").yellow(), name);
    }
    for message in &summary.rejected {
        println!("{} {}", style("✗").red().bold(), message);
    }

    Ok(())
}

/// Matches and applies each file; `confirm` decides uncertain merges
pub async fn import_paths<F>(
    library: &mut Library,
    paths: &[PathBuf],
    mut confirm: F,
) -> Result<ImportSummary>
where
    F: FnMut(&ImportOutcome, &str) -> Result<bool>,
{
    let matcher = ImportMatcher::new(MatchThresholds::from(&library.config.library));
    let mut summary = ImportSummary::default();

    for path in paths {
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            summary
                .rejected
                .push(format!("Not a file: {}", path.display()));
            continue;
        };
        let handle = match std::fs::canonicalize(path) {
            Ok(absolute) => absolute.display().to_string(),
            Err(e) => {
                summary
                    .rejected
                    .push(format!("{}: {}", path.display(), e));
                continue;
            }
        };

        let candidate = ImportCandidate::from_file(filename.clone(), handle);
        let outcome = match process_import(&candidate, library.registry.books(), &matcher) {
            Ok(outcome) => outcome,
            Err(e) => {
                summary.rejected.push(e.to_string());
                continue;
            }
        };

        if outcome.needs_confirmation() {
            let title = library
                .registry
                .get(outcome.book_id())
                .map(|b| b.title.clone())
                .unwrap_or_default();
            if !confirm(&outcome, &title)? {
                summary.skipped.push(filename);
                continue;
            }
        }

        let merged = matches!(outcome, ImportOutcome::Merge { .. });
        let id = library
            .registry
            .apply_import(outcome)
            .await
            .with_context(|| format!("Failed to import {}", filename))?;
        if merged {
            summary.merged.push(id);
        } else {
            summary.created.push(id);
        }
    }

    library.save().await?;
    Ok(summary)
}

/// List all books in the library
pub fn list_books(library: &Library) -> Result<()> {
    let books = library.registry.books();
    if books.is_empty() {
        println!("No books in library. Use 'import' or 'seed' to add some.");
        return Ok(());
    }

    println!("\n{} Books in Library", style(books.len()).bold().cyan());
    println!("{}", "=".repeat(80));

    for book in books {
        print_book_summary(book);
    }

    Ok(())
}

/// Show detailed information about a book
pub fn show_book_info(library: &Library, matches: &ArgMatches) -> Result<()> {
    let book = library.book(&book_id_arg(matches)?)?;

    println!("\n{}", style("Book Information").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("ID: {}", book.id);
    println!("Title: {}", style(&book.title).bold());
    println!("Author: {}", book.author);
    println!("Source: {:?}", book.source);
    println!("Type: {}", book.derived_type());
    println!("State: {}", book.acquisition_state());
    if !book.cover_ref.is_empty() {
        println!("Cover: {}", book.cover_ref);
    }
    println!("Added: {}", book.added_at);

    println!("\nAssets:");
    for kind in AssetKind::ALL {
        if let Some(asset) = book.asset(kind) {
            println!("  {}: {} [{:?}]", kind, asset.uri, asset.state);
        }
    }

    println!("\nPlayback:");
    println!(
        "  Position: {} / {}",
        format_clock(book.last_position_seconds),
        format_clock(book.duration_seconds)
    );
    println!("  Progress: {:.0}%", book.progress() * 100.0);

    if !book.bookmarks().is_empty() {
        println!("\nBookmarks:");
        for bookmark in book.bookmarks() {
            print!("  {:?} {}", bookmark.kind, format_clock(bookmark.position));
            if let Some(note) = &bookmark.note {
                print!("  {}", note);
            }
            println!();
        }
    }

    Ok(())
}

/// Delete a book from the library
pub async fn delete_book(library: &mut Library, matches: &ArgMatches) -> Result<()> {
    let book_id = book_id_arg(matches)?;
    let force = matches.get_flag("force");
    let title = library.book(&book_id)?.title.clone();

    if !force && !confirm(&format!("Are you sure you want to delete '{}'? (y/N)", title))? {
        println!("Deletion cancelled.");
        return Ok(());
    }

    let removed = library
        .registry
        .delete(&book_id)
        .await
        .context("Failed to delete book")?;
    library.save().await?;

    let files = remove_downloaded_files(&removed, &library.download_dir());
    println!("{} Book deleted: {}", style("✓").green().bold(), removed.title);
    if files > 0 {
        println!("  Removed {} downloaded file(s)", files);
    }

    Ok(())
}

/// Download every remote asset of a book
pub async fn download_book(library: &mut Library, matches: &ArgMatches) -> Result<()> {
    let book_id = book_id_arg(matches)?;
    library.book(&book_id)?;

    let client = Client::with_config(ClientConfig::from(&library.config.downloads))
        .context("Failed to create HTTP client")?;
    let backend = Arc::new(HttpTransfer::new(client));
    let mut coordinator = DownloadCoordinator::new(backend, library.download_dir());

    let reported: Mutex<HashMap<JobId, u64>> = Mutex::new(HashMap::new());
    coordinator.subscribe(move |job: &DownloadJob| print_job(job, &reported));

    let outcomes = coordinator
        .acquire(&mut library.registry, &book_id)
        .await
        .context("Failed to start download")?;

    if outcomes.is_empty() {
        println!("Nothing to download: the book has no remote assets.");
        return Ok(());
    }
    if outcomes.iter().all(|o| *o == StartOutcome::AlreadyReady) {
        println!("All assets are already downloaded.");
        return Ok(());
    }

    coordinator.run_until_idle(&mut library.registry).await;
    library.save().await?;

    let book = library.book(&book_id)?;
    println!(
        "\n{} is now {} ({})",
        style(&book.title).bold(),
        book.acquisition_state(),
        book.derived_type()
    );

    Ok(())
}

/// Add an audio bookmark
pub async fn add_bookmark(library: &mut Library, matches: &ArgMatches) -> Result<()> {
    let book_id = book_id_arg(matches)?;
    let seconds = *matches
        .get_one::<f64>("seconds")
        .ok_or_else(|| anyhow::anyhow!("Position is required"))?;

    let mut bookmark = Bookmark::audio(seconds);
    if let Some(note) = matches.get_one::<String>("note") {
        bookmark = bookmark.with_note(note);
    }

    let book = library
        .registry
        .add_bookmark(&book_id, bookmark)
        .await
        .context("Failed to add bookmark")?;
    library.save().await?;

    println!(
        "{} Bookmark at {} in {} ({} total)",
        style("✓").green().bold(),
        format_clock(seconds),
        book.title,
        book.bookmarks().len()
    );
    Ok(())
}

/// Print a chapter with the paragraph for an audio position highlighted
pub fn read_along(matches: &ArgMatches) -> Result<()> {
    let file = matches
        .get_one::<String>("file")
        .ok_or_else(|| anyhow::anyhow!("Text file is required"))?;
    let position = matches.get_one::<f64>("position").copied().unwrap_or(0.0);
    let duration = matches.get_one::<f64>("duration").copied().unwrap_or(0.0);

    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let units = ChapterUnits::from_text(&text);
    if units.is_empty() {
        bail!("No paragraphs found in {}", file);
    }

    let cursor = SyncCursor::new(&units, 0);
    let state = cursor.state(position, duration);

    println!(
        "\n{} {} / {} ({:.0}%)",
        style("Read-along").bold().cyan(),
        format_clock(position),
        format_clock(duration),
        state.progress * 100.0
    );
    println!("{}", "=".repeat(80));

    for (index, unit) in units.iter().enumerate() {
        let line = truncate(unit, 76);
        if state.is_current(index) {
            println!("{} {}", style("▶").green().bold(), style(line).bold().yellow());
        } else if state.is_past(index) {
            println!("  {}", style(line).dim());
        } else {
            println!("  {}", line);
        }
    }

    if let Some(current) = state.unit_index {
        println!("\nParagraph {} of {}", current + 1, state.unit_count);
    }
    Ok(())
}

/// Prints a failed command's error chain and, for known failures, advice
pub fn report_error(err: anyhow::Error) {
    eprintln!("{} {:#}", style("Error:").red().bold(), err);

    let Some(app) = classify(err) else {
        return;
    };
    if app.is_critical() {
        log::error!("{} failure: {}", app.severity(), app);
    } else {
        log::debug!("{} failure: {}", app.severity(), app);
    }
    eprintln!("  {}", app.user_message());
    eprintln!("  {}", style(app.recovery_action()).dim());
}

/// Recovers the application error behind a command failure
pub fn classify(err: anyhow::Error) -> Option<AppError> {
    let err = match err.downcast::<AppError>() {
        Ok(app) => return Some(app),
        Err(err) => err,
    };
    let err = match err.downcast::<LibraryError>() {
        Ok(e) => return Some(e.into()),
        Err(err) => err,
    };
    let err = match err.downcast::<NetworkError>() {
        Ok(e) => return Some(e.into()),
        Err(err) => err,
    };
    err.downcast::<EngineError>().ok().map(AppError::from)
}

fn config_manager(config_dir: Option<&str>) -> Result<ConfigManager> {
    match config_dir {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    }
    .context("Failed to resolve config directory")
}

fn book_id_arg(matches: &ArgMatches) -> Result<BookId> {
    matches
        .get_one::<String>("id")
        .map(|s| BookId::new(s.as_str()))
        .ok_or_else(|| anyhow::anyhow!("Book ID is required"))
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{}", prompt);
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Prints job starts, every 10% of progress, and terminal states
fn print_job(job: &DownloadJob, reported: &Mutex<HashMap<JobId, u64>>) {
    let Ok(mut reported) = reported.lock() else {
        return;
    };

    match &job.status {
        DownloadStatus::Running => {
            let decile = job.fraction().map_or(0, |f| (f * 10.0).floor() as u64);
            match reported.insert(job.id, decile) {
                None => println!(
                    "{} {} {} -> {}",
                    style("↓").cyan().bold(),
                    job.asset_kind,
                    job.url,
                    job.destination.display()
                ),
                Some(previous) if previous < decile => println!(
                    "  {} {}% ({:.2} MB/s)",
                    job.asset_kind,
                    decile * 10,
                    job.progress.speed_mbps()
                ),
                Some(_) => {}
            }
        }
        DownloadStatus::Completed => {
            reported.remove(&job.id);
            println!(
                "{} {} downloaded ({} bytes)",
                style("✓").green().bold(),
                job.asset_kind,
                job.bytes_done()
            );
        }
        DownloadStatus::Error(e) => {
            reported.remove(&job.id);
            println!("{} {} failed: {}", style("✗").red().bold(), job.asset_kind, e);
        }
        DownloadStatus::Cancelled => {
            reported.remove(&job.id);
            println!("{} {} cancelled", style("-").yellow(), job.asset_kind);
        }
        DownloadStatus::Pending => {}
    }
}

/// Removes ready assets stored under `download_dir`; returns how many
fn remove_downloaded_files(book: &Book, download_dir: &Path) -> usize {
    let mut removed = 0;
    for kind in AssetKind::ALL {
        let Some(asset) = book.asset(kind).filter(|a| a.is_ready()) else {
            continue;
        };
        let path = Path::new(&asset.uri);
        if !path.starts_with(download_dir) {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

fn print_book_summary(book: &Book) {
    println!("\n{}", style(&book.title).bold());
    println!("  by {}", book.author);

    let mut line = format!(
        "  ID: {} | {} | {}",
        book.id,
        book.derived_type(),
        book.acquisition_state()
    );
    if book.duration_seconds > 0.0 {
        line.push_str(&format!(
            " | {} / {}",
            format_clock(book.last_position_seconds),
            format_clock(book.duration_seconds)
        ));
    }
    println!("{}", line);

    if !book.bookmarks().is_empty() {
        println!("  {} bookmark(s)", book.bookmarks().len());
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
