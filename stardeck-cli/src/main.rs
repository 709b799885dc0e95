use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stardeck::query::{sidebar_counts, SidebarCounts};
use stardeck::render::{ViewportEvent, WindowGeometry};
use stardeck::{
    App, AppEvent, Catalog, Edit, Filter, Host, ListKind, MutationOutcome, Preferences, Presenter,
    Record, RecordId, SortKey, SqliteRemote, TextBackend, WindowedRenderer,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

const DB_FILE: &str = "stardeck.db";
const PREFS_FILE: &str = "preferences.yaml";

/// Stardeck CLI: browse and annotate your starred repositories
#[derive(Parser)]
#[command(name = "stardeck", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Preferences file (default: <data-dir>/preferences.yaml)
    #[arg(long)]
    prefs: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListArg {
    Tags,
    Languages,
}

impl From<ListArg> for ListKind {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Tags => ListKind::Tags,
            ListArg::Languages => ListKind::Languages,
        }
    }
}

#[derive(Args)]
struct ViewArgs {
    /// Filter, e.g. system:untagged, tag:cli, language:Rust
    #[arg(long)]
    filter: Option<Filter>,
    /// Sort key: starred_at, pushed_at, name, stargazers_count
    #[arg(long)]
    sort: Option<SortKey>,
    /// Fuzzy search text (replaces sorting)
    #[arg(long)]
    search: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List repositories in view order
    List {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Print one screen of the windowed list
    Browse {
        #[command(flatten)]
        view: ViewArgs,
        /// Scroll offset, in lines
        #[arg(long, default_value_t = 0.0)]
        offset: f64,
        /// Viewport height, in lines
        #[arg(long, default_value_t = 20)]
        height: usize,
        /// Terminal width, in columns
        #[arg(long, default_value_t = 100)]
        width: usize,
    },

    /// Sidebar counts per system filter, tag and language
    Counts,

    /// Set or clear a repository's alias
    Alias { id: RecordId, value: Option<String> },

    /// Set or clear a repository's notes
    Notes { id: RecordId, value: Option<String> },

    /// Replace a repository's tags
    Tag { id: RecordId, tags: Vec<String> },

    /// Toggle a repository's favorite mark
    Favorite { id: RecordId },

    /// Set the order of the tag or language list
    Reorder { list: ListArg, names: Vec<String> },

    /// Delete an unused tag
    DeleteTag {
        name: String,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Reconcile stored repositories with an upstream JSON export
    Sync {
        #[arg(long)]
        upstream: PathBuf,
    },

    /// Replace all stored repositories with a JSON export
    Import { file: PathBuf },

    /// Show store statistics and sync state
    Status,
}

/// Writes notifications to stderr so stdout stays machine-readable.
struct CliPresenter {
    assume_yes: bool,
}

impl Presenter for CliPresenter {
    fn render_ordered_list(&self, ids: &[RecordId]) {
        log::debug!("View holds {} repositories", ids.len());
    }

    fn render_sidebar_counts(&self, counts: &SidebarCounts) {
        log::debug!("Sidebar: {} total, {} untagged", counts.all, counts.untagged);
    }

    fn render_detail(&self, record: Option<&Record>) {
        if let Some(record) = record {
            log::debug!("Detail panel shows {}", record.full_name);
        }
    }

    fn notify_error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn notify_info(&self, message: &str) {
        eprintln!("{message}");
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{prompt} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let prefs_path = cli
        .prefs
        .clone()
        .unwrap_or_else(|| cli.data_dir.join(PREFS_FILE));
    let prefs = Preferences::load(&prefs_path)?;

    std::fs::create_dir_all(&cli.data_dir)?;
    let mut remote = SqliteRemote::open(&cli.data_dir.join(DB_FILE))?;
    if let Command::Sync { upstream } = &cli.command {
        remote = remote.with_upstream(upstream.clone());
    }
    let remote = Arc::new(remote);

    let (width, height) = match &cli.command {
        Command::Browse { width, height, .. } => (*width, *height),
        _ => (100, 20),
    };
    let assume_yes = matches!(cli.command, Command::DeleteTag { yes: true, .. });
    let app = build_app(&prefs, remote.clone(), assume_yes, width, height);

    match cli.command {
        Command::List { view } => {
            app.load().await?;
            apply_view(&app, view).await?;
            let rows = app.with_renderer(|r| r.rows().to_vec());
            print_output(&serde_json::to_value(rows)?, &cli.format)?;
        }

        Command::Browse { view, offset, height, .. } => {
            app.load().await?;
            apply_view(&app, view).await?;
            app.dispatch(AppEvent::Viewport(ViewportEvent::LayoutChanged))
                .await?;
            app.dispatch(AppEvent::Viewport(ViewportEvent::Scroll(offset)))
                .await?;
            for line in app.with_renderer(|r| r.backend().frame(height)) {
                println!("{line}");
            }
        }

        Command::Counts => {
            app.load().await?;
            let counts = app.with_store(|s| sidebar_counts(s.records(), s.metadata()));
            print_output(&serde_json::to_value(counts)?, &cli.format)?;
        }

        Command::Alias { id, value } => {
            let record = edit(&app, id, Edit::Alias(value)).await?;
            print_output(&serde_json::to_value(record)?, &cli.format)?;
        }

        Command::Notes { id, value } => {
            let record = edit(&app, id, Edit::Notes(value)).await?;
            print_output(&serde_json::to_value(record)?, &cli.format)?;
        }

        Command::Tag { id, tags } => {
            let record = edit(&app, id, Edit::Tags(tags)).await?;
            print_output(&serde_json::to_value(record)?, &cli.format)?;
        }

        Command::Favorite { id } => {
            app.load().await?;
            let record = applied(id, app.toggle_favorite(id).await?)?;
            print_output(
                &serde_json::json!({ "id": id, "favorite": record.is_favorite() }),
                &cli.format,
            )?;
        }

        Command::Reorder { list, names } => {
            app.load().await?;
            let kind = ListKind::from(list);
            app.dispatch(AppEvent::Reorder { kind, order: names }).await?;
            let order = app.with_store(|s| s.ordered_list(kind).as_slice().to_vec());
            print_output(&serde_json::json!({ "list": kind, "order": order }), &cli.format)?;
        }

        Command::DeleteTag { name, .. } => {
            app.load().await?;
            let deleted = app.reorder().delete_tag(&app, &name).await?;
            print_output(&serde_json::json!({ "tag": name, "deleted": deleted }), &cli.format)?;
        }

        Command::Sync { .. } => {
            let stats = app.sync().await?;
            record_sync_time(&prefs, &prefs_path)?;
            print_output(&serde_json::to_value(stats)?, &cli.format)?;
        }

        Command::Import { file } => {
            let count = remote.import(&file)?;
            print_output(&serde_json::json!({ "ok": true, "imported": count }), &cli.format)?;
        }

        Command::Status => {
            app.load().await?;
            let (records, tags, languages) = app.with_store(|s| {
                (
                    s.len(),
                    s.ordered_list(ListKind::Tags).len(),
                    s.ordered_list(ListKind::Languages).len(),
                )
            });
            print_output(
                &serde_json::json!({
                    "data_dir": cli.data_dir.display().to_string(),
                    "records": records,
                    "tags": tags,
                    "languages": languages,
                    "last_successful_sync": remote.last_successful_sync()?,
                    "ui_language": prefs.ui_language,
                }),
                &cli.format,
            )?;
        }
    }

    Ok(())
}

fn build_app(
    prefs: &Preferences,
    remote: Arc<SqliteRemote>,
    assume_yes: bool,
    width: usize,
    height: usize,
) -> App<TextBackend> {
    let geometry: WindowGeometry = prefs.geometry(height as f64);
    let catalog = Catalog::new(prefs.ui_language);
    let renderer = WindowedRenderer::new(TextBackend::new(width, &catalog), geometry);
    App::new(
        stardeck::Store::new(prefs.view_state()),
        renderer,
        remote,
        Arc::new(CliPresenter { assume_yes }),
        Arc::new(catalog),
    )
}

async fn apply_view(app: &App<TextBackend>, view: ViewArgs) -> stardeck::Result<()> {
    if let Some(filter) = view.filter {
        app.dispatch(AppEvent::SetFilter(filter)).await?;
    }
    if let Some(sort) = view.sort {
        app.dispatch(AppEvent::SetSort(sort)).await?;
    }
    if let Some(query) = view.search {
        app.dispatch(AppEvent::Search(query)).await?;
    }
    Ok(())
}

async fn edit(
    app: &App<TextBackend>,
    id: RecordId,
    edit: Edit,
) -> Result<Record, Box<dyn std::error::Error>> {
    app.load().await?;
    let outcome = app.mutate(id, edit).await?;
    applied(id, outcome)
}

fn applied(id: RecordId, outcome: MutationOutcome) -> Result<Record, Box<dyn std::error::Error>> {
    match outcome {
        MutationOutcome::Applied(record) => Ok(record),
        MutationOutcome::Missing => Err(stardeck::Error::NotFound(id).into()),
    }
}

/// The core never writes preferences; the CLI records the sync time itself.
fn record_sync_time(prefs: &Preferences, path: &Path) -> stardeck::Result<()> {
    let updated = Preferences {
        last_sync_at: Some(Utc::now()),
        ..prefs.clone()
    };
    updated.save(path)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value)?);
        }
    }
    Ok(())
}
