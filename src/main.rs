use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use inkcheck::checker::dictionary::DictionarySource;
use inkcheck::cli::output::{self, Choice, FileReport, OutputFormat};
use inkcheck::config::Overrides;
use inkcheck::dict::store::FileDictionaryStore;
use inkcheck::parser::FileType;
use inkcheck::{
    dict, ActionProvider, CodeAction, Config, DictionaryStore, DictionaryTarget, Marker,
    MemorySurface, Position, SpellSession, WordScope, WorkerPool,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "inkcheck")]
#[command(version, about = "Incremental, parallel spell and grammar checker", long_about = None)]
struct Cli {
    /// Files or directories to check
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Apply the preferred fix for every issue in place
    #[arg(short, long)]
    fix: bool,

    /// Pick a fix for each issue interactively
    #[arg(short, long, requires = "fix")]
    interactive: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Exit with code 0 even if errors are found
    #[arg(long)]
    no_fail: bool,

    /// Language/dictionary to use (e.g., en_US, en_GB)
    #[arg(short, long)]
    language: Option<String>,

    /// Output format (text, json)
    #[arg(short = 'o', long, default_value = "text")]
    format: OutputFormat,

    /// Base dictionary file (.dict FST or plain word list)
    #[arg(long, value_name = "PATH")]
    dictionary: Option<PathBuf>,

    /// Directory holding custom word lists
    #[arg(long, value_name = "DIR")]
    custom_dir: Option<PathBuf>,

    /// Pattern to ignore (regex)
    #[arg(long)]
    ignore_pattern: Vec<String>,

    /// Number of checker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// User whose custom words apply
    #[arg(long, env = "INKCHECK_USER", default_value = "default")]
    user: String,

    /// Folder scope for custom words (defaults to each file's directory)
    #[arg(long)]
    folder: Option<String>,

    /// Category scope for custom words
    #[arg(long)]
    category: Option<String>,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completion: Option<Shell>,

    /// Log scheduling details to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Dictionary management
    Dict {
        #[command(subcommand)]
        action: DictCommands,
    },
}

#[derive(Parser, Debug)]
enum DictCommands {
    /// List installed dictionaries
    List,
    /// Download a dictionary
    Download {
        /// Language code (e.g., en_US, en_GB)
        language: String,
    },
    /// Add a word to a custom dictionary
    Add {
        word: String,
        /// Add to this folder's list instead of the user list
        #[arg(long, conflicts_with = "category")]
        folder: Option<String>,
        /// Add to this category's list instead of the user list
        #[arg(long)]
        category: Option<String>,
    },
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(shell) = cli.completion {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "inkcheck", &mut io::stdout());
        return Ok(());
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(Overrides {
        language: cli.language.clone(),
        dictionary: cli.dictionary.clone(),
        ignore_patterns: cli.ignore_pattern.clone(),
        workers: cli.workers,
    })?;
    let store = match cli.custom_dir.clone().or_else(|| config.custom_dictionary_dir.clone()) {
        Some(dir) => FileDictionaryStore::new(dir),
        None => FileDictionaryStore::default_location()?,
    };

    if let Some(command) = cli.command.take() {
        return handle_command(command, &store, &cli.user);
    }

    if cli.files.is_empty() {
        anyhow::bail!("No files specified. Use --help for usage information.");
    }

    let files = collect_files(&cli.files);
    let colored = !cli.no_color && cli.format == OutputFormat::Text;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start async runtime")?;

    let source = DictionarySource::new(config.language.clone(), config.dictionary.clone());
    let pool = Arc::new(WorkerPool::new(config.workers, source, config.check_options()));
    let store: Arc<dyn DictionaryStore> = Arc::new(store);

    let mut reports = Vec::new();
    let mut total_fixed = 0;

    for file_path in &files {
        let mut text = match fs::read_to_string(file_path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error: {}: {}", file_path.display(), e);
                continue;
            }
        };

        let session = SpellSession::new(
            pool.clone(),
            Arc::new(MemorySurface::new()),
            store.clone(),
            scope_for(&cli, file_path),
            config.session_options(FileType::from_path(file_path)),
        );

        runtime.block_on(scan_with_progress(&session, &text, cli.format));

        if cli.fix {
            let fixed = if cli.interactive {
                fix_interactive(&runtime, &session, &mut text, colored)?
            } else {
                fix_auto(&runtime, &session, &mut text)
            };
            if fixed > 0 {
                fs::write(file_path, &text)
                    .with_context(|| format!("Failed to write {}", file_path.display()))?;
            }
            total_fixed += fixed;
        }

        let markers = session.diagnostics();
        if !cli.fix && cli.format == OutputFormat::Text {
            output::print_markers(file_path, &text, &markers, colored);
        }
        reports.push(FileReport {
            path: file_path.display().to_string(),
            markers,
        });
    }

    let total_issues: usize = reports.iter().map(|r| r.markers.len()).sum();
    let total_errors: usize = reports.iter().map(|r| output::error_count(&r.markers)).sum();

    match cli.format {
        OutputFormat::Json => output::print_json_report(&reports)?,
        OutputFormat::Text if cli.fix => {
            output::print_fix_summary(total_fixed, files.len(), colored)
        }
        OutputFormat::Text => {
            output::print_check_summary(total_errors, total_issues, files.len(), colored)
        }
    }

    if total_errors > 0 && !cli.no_fail && !cli.fix {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "inkcheck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_command(command: Commands, store: &FileDictionaryStore, user: &str) -> Result<()> {
    match command {
        Commands::Dict { action } => match action {
            DictCommands::List => dict::manager::list_dictionaries(store)?,
            DictCommands::Download { language } => dict::manager::download_dictionary(&language)?,
            DictCommands::Add {
                word,
                folder,
                category,
            } => {
                let target = match (folder, category) {
                    (Some(folder), _) => DictionaryTarget::Folder(folder_key(Path::new(&folder))),
                    (None, Some(category)) => DictionaryTarget::Category(category),
                    (None, None) => DictionaryTarget::User,
                };
                dict::manager::add_word(store, &word, user, &target)?;
            }
        },
    }
    Ok(())
}

/// Expand directories into the markdown and text files below them.
fn collect_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in ignore::WalkBuilder::new(input).build().flatten() {
            let path = entry.path();
            if path.is_file() && FileType::is_checkable(path) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn scope_for(cli: &Cli, file: &Path) -> WordScope {
    let folder = cli.folder.clone().or_else(|| {
        file.parent()
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .map(folder_key)
    });
    WordScope {
        user_id: cli.user.clone(),
        folder_path: folder,
        category_id: cli.category.clone(),
    }
}

fn folder_key(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}

async fn scan_with_progress(session: &SpellSession, text: &str, format: OutputFormat) {
    let pb = if format == OutputFormat::Text {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    let style =
        ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:30}] {pos}/{len} chunks");
    if let Ok(style) = style {
        pb.set_style(style);
    }

    session
        .full_scan_with_progress(text, |progress| {
            pb.set_length(progress.total_chunks as u64);
            pb.set_position(progress.current_chunk as u64);
        })
        .await;
    pb.finish_and_clear();
}

/// The preferred action for a single marker, if it has one.
fn preferred_fix(provider: &ActionProvider, marker: &Marker) -> Option<CodeAction> {
    let at: Position = marker.start().into();
    provider
        .actions(std::slice::from_ref(marker), at, at)
        .into_iter()
        .find(|a| a.preferred)
}

/// Markers still present, bottom-up so each fix leaves the ones above in place.
fn pending(session: &SpellSession) -> Vec<Marker> {
    let mut markers = session.diagnostics();
    markers.reverse();
    markers
}

fn current(session: &SpellSession, marker: &Marker) -> Option<Marker> {
    session
        .diagnostics()
        .into_iter()
        .find(|m| m.key() == marker.key() && m.data.word == marker.data.word)
}

fn fix_auto(runtime: &Runtime, session: &SpellSession, text: &mut String) -> usize {
    let provider = ActionProvider::new(session.scope().clone());
    let mut fixed = 0;

    for marker in pending(session) {
        let Some(marker) = current(session, &marker) else {
            continue;
        };
        if let Some(action) = preferred_fix(&provider, &marker) {
            if runtime.block_on(session.apply_action(&action, text)).is_some() {
                fixed += 1;
            }
        }
    }
    fixed
}

fn fix_interactive(
    runtime: &Runtime,
    session: &SpellSession,
    text: &mut String,
    colored: bool,
) -> Result<usize> {
    let provider = ActionProvider::new(session.scope().clone());
    let mut fixed = 0;

    for marker in pending(session) {
        let Some(marker) = current(session, &marker) else {
            continue;
        };
        let at: Position = marker.start().into();
        let actions: Vec<CodeAction> = provider
            .actions(std::slice::from_ref(&marker), at, at)
            .into_iter()
            .filter(|a| !a.diagnostics.is_empty())
            .collect();
        if actions.is_empty() {
            continue;
        }

        let titles: Vec<String> = actions.iter().map(|a| a.title.clone()).collect();
        match output::prompt_action(&marker, text, &titles, colored)? {
            Choice::Action(i) => {
                if runtime.block_on(session.apply_action(&actions[i], text)).is_some() {
                    fixed += 1;
                }
            }
            Choice::Skip => {}
            Choice::Quit => break,
        }
    }
    Ok(fixed)
}
