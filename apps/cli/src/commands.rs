//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use repodocs_core::{
    BuildOptions, BuildReport, ProgressReporter, RepoOutcome, RepoStatus, SubprocessCompiler,
    build_site,
};
use repodocs_shared::{CONFIG_FILE_NAME, SiteConfig, init_config, load_config, load_config_from};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// repodocs — build one documentation site from many repositories.
#[derive(Parser)]
#[command(
    name = "repodocs",
    version,
    about = "Aggregate documentation from many repositories into one site with a search index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the site config (defaults to ./repodocs.toml).
    #[arg(short, long, global = true, env = "REPODOCS_CONFIG")]
    pub config: Option<PathBuf>,

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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build pages and the search index for the configured repositories.
    Build {
        /// Only build this repository (repeatable).
        #[arg(long = "repo", value_name = "NAME")]
        repos: Vec<String>,

        /// Exit with an error if any repository fails.
        #[arg(long)]
        strict: bool,
    },

    /// Resolve every repository and print the result without building.
    Validate,

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
    /// Write a config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    // Prefix match covers the library crates (repodocs_core, ...).
    let filter = match cli.verbose {
        0 => "repodocs=info",
        1 => "repodocs=debug",
        _ => "repodocs=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    let config_path = cli.config;
    match cli.command {
        Command::Build { repos, strict } => {
            cmd_build(config_path.as_deref(), repos, strict).await
        }
        Command::Validate => cmd_validate(config_path.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// An explicit `--config` must exist; otherwise fall back to the default
/// file or built-in defaults.
fn load(path: Option<&Path>) -> Result<SiteConfig> {
    match path {
        Some(path) => Ok(load_config_from(path)?),
        None => Ok(load_config()?),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config_path: Option<&Path>, repos: Vec<String>, strict: bool) -> Result<()> {
    let config = load(config_path)?;
    if config.docs_repos.is_empty() {
        return Err(eyre!("no repositories configured; add [[docs_repos]] entries"));
    }

    info!(
        repos = config.docs_repos.len(),
        compiler = %config.compiler.program,
        "building documentation site"
    );

    let compiler = Arc::new(SubprocessCompiler::from(&config.compiler));
    let options = BuildOptions { only: repos };
    let reporter = Arc::new(CliProgress::new());

    let report = build_site(&config, compiler, &options, reporter).await?;
    print_report(&report, &config);

    if strict && report.has_failures() {
        let failed: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
        return Err(eyre!("{} repositories failed: {}", failed.len(), failed.join(", ")));
    }

    Ok(())
}

fn print_report(report: &BuildReport, config: &SiteConfig) {
    println!();
    for outcome in &report.repos {
        let line = match &outcome.status {
            RepoStatus::Published { pages, indexable } => {
                format!("ok       {pages} pages, {indexable} indexed")
            }
            RepoStatus::Skipped => "skipped  no documentation sources".to_string(),
            RepoStatus::Failed { error } => format!("FAILED   {error}"),
        };
        println!("  {:<24} {line}", outcome.name);
    }
    println!();

    match &report.search {
        Some(manifest) => println!(
            "  Search: {} documents in {} shard(s) at {}",
            manifest.total_documents,
            manifest.shards.len(),
            config.search_dir().display()
        ),
        None => println!("  Search: skipped"),
    }
    println!("  Output: {}", config.site.output_dir.display());
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let descriptors = repodocs_sources::resolve_all(&config)?;

    for descriptor in &descriptors {
        if !descriptor.checkout.is_dir() {
            warn!(
                repo = %descriptor.name,
                checkout = %descriptor.checkout.display(),
                "checkout not found"
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE_NAME));
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn repo_started(&self, name: &str) {
        self.spinner.set_message(format!("Building {name}"));
    }

    fn repo_finished(&self, outcome: &RepoOutcome) {
        if let RepoStatus::Failed { error } = &outcome.status {
            self.spinner.println(format!("  {} failed: {error}", outcome.name));
        }
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
