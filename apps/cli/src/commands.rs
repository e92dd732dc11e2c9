//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use collection_index_core::assembler::write_index;
use collection_index_core::validate::validate_index_file;
use collection_index_core::{
    GenerateConfig, IndexOutcome, InputSelection, ProgressReporter, generate_index,
};
use collection_index_shared::{AppConfig, LabelSource, MalformedPolicy, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// collection-index: merge versioned collection bundles into one index.
#[derive(Parser)]
#[command(
    name = "collection-index",
    version,
    about = "Create a collection index from a set of collections.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which version names a collection.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LabelFrom {
    Oldest,
    Newest,
}

impl From<LabelFrom> for LabelSource {
    fn from(value: LabelFrom) -> Self {
        match value {
            LabelFrom::Oldest => LabelSource::Oldest,
            LabelFrom::Newest => LabelSource::Newest,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate an index from collection bundle files or folders.
    Generate {
        /// Name of the collection index.
        name: String,

        /// Description of the collection index.
        description: String,

        /// Root URL where the collections can be found. Collection paths are
        /// appended to it to form each version's URL. Falls back to the
        /// configured default.
        root_url: Option<String>,

        /// Collection bundle files to include in the index.
        #[arg(long, num_args = 1.., required_unless_present = "folders", conflicts_with = "folders")]
        files: Vec<PathBuf>,

        /// Folders of versioned collection files (e.g. `enterprise-attack-8.2.json`).
        #[arg(long, num_args = 1..)]
        folders: Vec<PathBuf>,

        /// Output file for the generated index.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Take collection names from the oldest or newest version.
        #[arg(long, value_enum)]
        label_from: Option<LabelFrom>,

        /// Skip unreadable or malformed collection files instead of failing.
        #[arg(long)]
        skip_malformed: bool,

        /// Process folder entries in filename order.
        #[arg(long)]
        sort: bool,
    },

    /// Check an existing index file for consistency.
    Validate {
        /// Path to the index file.
        path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "collection_index=info",
        1 => "collection_index=debug",
        _ => "collection_index=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            name,
            description,
            root_url,
            files,
            folders,
            output,
            label_from,
            skip_malformed,
            sort,
        } => {
            let args = GenerateArgs {
                name,
                description,
                root_url,
                files,
                folders,
                output,
                label_from,
                skip_malformed,
                sort,
            };
            cmd_generate(args).await
        }
        Command::Validate { path } => cmd_validate(&path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

struct GenerateArgs {
    name: String,
    description: String,
    root_url: Option<String>,
    files: Vec<PathBuf>,
    folders: Vec<PathBuf>,
    output: Option<PathBuf>,
    label_from: Option<LabelFrom>,
    skip_malformed: bool,
    sort: bool,
}

/// Merge CLI flags over the loaded config.
fn resolve_generate_config(args: &GenerateArgs, config: &AppConfig) -> Result<GenerateConfig> {
    let root_url = args
        .root_url
        .clone()
        .or_else(|| config.defaults.root_url.clone())
        .ok_or_else(|| eyre!("no root URL given and none configured in [defaults] root_url"))?;

    let on_malformed = if args.skip_malformed {
        MalformedPolicy::SkipAndWarn
    } else {
        config.policy.on_malformed
    };

    Ok(GenerateConfig {
        name: args.name.clone(),
        description: args.description.clone(),
        root_url,
        label_source: args
            .label_from
            .map(LabelSource::from)
            .unwrap_or(config.defaults.label_source),
        on_malformed,
        read_concurrency: config.defaults.read_concurrency,
        sort_directory_entries: args.sort,
    })
}

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config()?;
    let generate_config = resolve_generate_config(&args, &config)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output));

    let selection = InputSelection {
        files: Some(args.files),
        folders: Some(args.folders),
        bundles: None,
    };

    info!(
        name = %generate_config.name,
        root_url = %generate_config.root_url,
        output = %output.display(),
        "generating collection index"
    );

    let reporter = CliProgress::new();
    let outcome = generate_index(&generate_config, selection, &reporter).await;
    // Spinner must be gone before any error report.
    reporter.spinner.finish_and_clear();
    let outcome = outcome?;

    for diagnostic in &outcome.diagnostics {
        warn!(%diagnostic, "input skipped");
    }

    println!("writing {}", output.display());
    write_index(&output, &outcome.index)?;

    print_summary(&outcome, &output);
    Ok(())
}

fn print_summary(outcome: &IndexOutcome, output: &Path) {
    let index = &outcome.index;
    let versions: usize = index.collections.iter().map(|c| c.versions.len()).sum();

    println!();
    println!("  Collection index written!");
    println!("  ID:          {}", index.id);
    println!("  Collections: {}", index.collections.len());
    println!("  Versions:    {versions}");
    println!("  Sources:     {}", outcome.sources_read);
    println!("  Skipped:     {}", outcome.diagnostics.len());
    println!("  Created:     {}", index.created);
    println!("  Modified:    {}", index.modified);
    println!("  Path:        {}", output.display());
    println!("  Time:        {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_loaded(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Parsing collections [{current}/{total}] {name}"));
    }

    fn done(&self, _outcome: &IndexOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// validate / config
// ---------------------------------------------------------------------------

fn cmd_validate(path: &Path) -> Result<()> {
    let index = validate_index_file(path)?;
    println!(
        "{}: valid ({} collections, modified {})",
        path.display(),
        index.collections.len(),
        index.modified
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
