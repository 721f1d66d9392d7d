//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use apietl_core::pipeline::{ProgressReporter, RunResult, Step};
use apietl_shared::{AppConfig, OutputPaths, PipelineConfig, UserPostSummary};
use apietl_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Summary rows printed after a run.
const SUMMARY_PREVIEW_ROWS: usize = 10;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// apietl: extract users and posts from a JSON API into CSV and SQLite.
#[derive(Parser)]
#[command(
    name = "apietl",
    version,
    about = "Fetch users and posts from a JSON API, clean them, and load them into CSV files and SQLite.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.apietl/apietl.toml).
    #[arg(long, global = true)]
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
    /// Run the whole job: extract, transform, write CSVs, load the database, summarize.
    Run {
        /// Output directory for CSV files and the database.
        #[arg(short, long, env = "APIETL_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Base URL of the source API.
        #[arg(long, env = "APIETL_BASE_URL")]
        base_url: Option<String>,

        /// Verify the source API's TLS certificate.
        #[arg(long)]
        verify_tls: bool,

        /// Per-request timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Recompute the per-user summary from an existing database.
    Summary {
        /// Directory holding the database from a previous run.
        #[arg(short, long, env = "APIETL_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// List recorded pipeline runs, newest first.
    Runs {
        /// Directory holding the database.
        #[arg(short, long, env = "APIETL_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
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
        0 => "apietl=info",
        1 => "apietl=debug",
        _ => "apietl=trace",
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            data_dir,
            base_url,
            verify_tls,
            timeout,
        } => {
            let overrides = RunOverrides {
                data_dir,
                base_url,
                verify_tls,
                timeout,
            };
            cmd_run(config_path, overrides).await
        }
        Command::Summary { data_dir } => cmd_summary(config_path, data_dir).await,
        Command::Runs { data_dir, limit } => cmd_runs(config_path, data_dir, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config file named by `--config`, or the default one.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => {
            if !p.exists() {
                return Err(eyre!("config file '{}' does not exist", p.display()));
            }
            apietl_shared::load_config_from(p)?
        }
        None => apietl_shared::load_config()?,
    };
    Ok(config)
}

/// Flag values for `run` that take precedence over the config file.
#[derive(Debug, Default)]
struct RunOverrides {
    data_dir: Option<PathBuf>,
    base_url: Option<String>,
    verify_tls: bool,
    timeout: Option<u64>,
}

impl RunOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(dir) = self.data_dir {
            config.output.data_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(url) = self.base_url {
            config.source.base_url = url;
        }
        if self.verify_tls {
            config.source.verify_tls = true;
        }
        if let Some(secs) = self.timeout {
            config.source.timeout_secs = secs;
        }
    }
}

/// Output paths from config, with an optional `--data-dir` override.
fn resolve_outputs(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<OutputPaths> {
    let mut config = resolve_config(config_path)?;
    if let Some(dir) = data_dir {
        config.output.data_dir = dir.to_string_lossy().into_owned();
    }
    Ok(OutputPaths::from(&config.output))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, overrides: RunOverrides) -> Result<()> {
    let mut app_config = resolve_config(config_path)?;
    overrides.apply(&mut app_config);
    let config = PipelineConfig::try_from(&app_config)?;

    info!(
        base_url = %config.source.base_url,
        data_dir = %config.outputs.data_dir.display(),
        verify_tls = config.source.verify_tls,
        "running pipeline"
    );

    let reporter = CliProgress::new();
    let result = apietl_core::pipeline::run_pipeline(&config, &reporter).await?;

    println!();
    println!("  Pipeline run complete!");
    println!("  Run:      {}", result.run_id);
    println!(
        "  Users:    {} extracted, {} loaded",
        result.stats.users_extracted, result.stats.users_loaded
    );
    println!(
        "  Posts:    {} extracted, {} loaded",
        result.stats.posts_extracted, result.stats.posts_loaded
    );
    if result.stats.orphan_posts > 0 {
        println!("  Orphans:  {} posts without a known author", result.stats.orphan_posts);
    }
    println!("  Database: {}", result.outputs.database.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();
    print_summary(&result.summary, SUMMARY_PREVIEW_ROWS);

    Ok(())
}

async fn cmd_summary(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<()> {
    let outputs = resolve_outputs(config_path, data_dir)?;
    if !outputs.database.exists() {
        return Err(eyre!(
            "no database found at '{}'. Run `apietl run` first.",
            outputs.database.display()
        ));
    }

    info!(database = %outputs.database.display(), "recomputing summary");
    let summary = apietl_core::analytics::summarize_existing(&outputs).await?;

    println!();
    println!("  Summary written to {}", outputs.summary_csv.display());
    println!();
    print_summary(&summary, summary.len());
    Ok(())
}

async fn cmd_runs(config_path: Option<&Path>, data_dir: Option<PathBuf>, limit: u32) -> Result<()> {
    let outputs = resolve_outputs(config_path, data_dir)?;
    if !outputs.database.exists() {
        println!("No runs recorded yet ({} does not exist).", outputs.database.display());
        return Ok(());
    }

    let storage = Storage::open_readonly(&outputs.database).await?;
    let runs = storage.list_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<9}  {:>5}  {:>5}",
        "RUN", "STARTED", "STATUS", "USERS", "POSTS"
    );
    for run in runs {
        let (users, posts) = run
            .stats
            .as_ref()
            .map(|s| (s.users_loaded.to_string(), s.posts_loaded.to_string()))
            .unwrap_or_else(|| ("-".into(), "-".into()));
        println!(
            "{:<36}  {:<20}  {:<9}  {:>5}  {:>5}",
            run.id.to_string(),
            run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.status.as_str(),
            users,
            posts,
        );
        if let Some(error) = &run.error {
            println!("    error: {error}");
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = apietl_shared::init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(rows: &[UserPostSummary], limit: usize) {
    println!(
        "  {:<24} {:<16} {:<20} {:>5} {:>9}",
        "NAME", "CITY", "COMPANY", "POSTS", "AVG WORDS"
    );
    for row in rows.iter().take(limit) {
        let avg = row
            .avg_word_count
            .map(|a| format!("{a:.1}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<24} {:<16} {:<20} {:>5} {:>9}",
            row.name, row.city, row.company_name, row.total_posts, avg
        );
    }
    if rows.len() > limit {
        println!("  ... {} more", rows.len() - limit);
    }
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, step: Step) {
        self.spinner.set_message(step.label());
    }

    fn step_done(&self, step: Step, records: usize) {
        self.spinner
            .println(format!("  ✓ {:<20} {records} records", step.name()));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // A failed run never reaches `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "apietl",
            "-vv",
            "run",
            "--data-dir",
            "/tmp/out",
            "--base-url",
            "http://localhost:9000",
            "--verify-tls",
            "--timeout",
            "5",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                data_dir,
                base_url,
                verify_tls,
                timeout,
            } => {
                assert_eq!(data_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(base_url.as_deref(), Some("http://localhost:9000"));
                assert!(verify_tls);
                assert_eq!(timeout, Some(5));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = AppConfig::default();
        RunOverrides {
            data_dir: Some(PathBuf::from("out")),
            base_url: Some("http://127.0.0.1:8080".into()),
            verify_tls: true,
            timeout: Some(3),
        }
        .apply(&mut config);

        assert_eq!(config.output.data_dir, "out");
        assert_eq!(config.source.base_url, "http://127.0.0.1:8080");
        assert!(config.source.verify_tls);
        assert_eq!(config.source.timeout_secs, 3);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = AppConfig::default();
        RunOverrides::default().apply(&mut config);
        assert_eq!(config.output.data_dir, "data");
        assert!(!config.source.verify_tls);
    }
}
