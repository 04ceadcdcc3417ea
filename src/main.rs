use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use gitzoid_core::{GitzoidConfig, OutputFormat, RepositoryConfig};
use gitzoid_review::github::GitHubClient;
use gitzoid_review::llm::{LlmClient, LlmReviewer};
use gitzoid_review::pipeline::{run_pass, Reviewer};
use gitzoid_tracker::{ReviewTracker, TrackerEntry, TrackerMap, TrackerSettings};

const CONFIG_FILE: &str = ".gitzoid.toml";

#[derive(Parser)]
#[command(
    name = "gitzoid",
    version,
    about = "Automated pull request reviews that follow each PR across pushes",
    long_about = "Gitzoid watches open pull requests, reviews new ones in full and\n\
                   reviews only the new commits when a PR it already reviewed is updated.\n\n\
                   Examples:\n  \
                     gitzoid init                      Create a .gitzoid.toml config file\n  \
                     gitzoid run                       Review all configured repositories\n  \
                     gitzoid run --repo owner/name     Review a single repository\n  \
                     gitzoid run --dry-run             Show what would be reviewed\n  \
                     gitzoid status                    Show tracked pull requests\n  \
                     gitzoid doctor                    Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .gitzoid.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Run one review pass over the configured repositories
    #[command(long_about = "Run one review pass over the configured repositories.\n\n\
        New pull requests get a full review, updated ones a review of the new\n\
        commits only. The first pass over a repository reviews at most\n\
        [review].first_run_limit PRs and skips the rest for good.")]
    Run {
        /// Only process this repository (owner/name)
        #[arg(long)]
        repo: Option<String>,

        /// Build review payloads but do not generate, post, or save anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show tracked pull requests
    Status {
        /// Only show entries for this repository (owner/name)
        #[arg(long)]
        repo: Option<String>,
    },
    /// Create a default .gitzoid.toml configuration file
    #[command(long_about = "Create a default .gitzoid.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .gitzoid.toml already exists.")]
    Init,
    /// Check your Gitzoid setup and environment
    #[command(long_about = "Check your Gitzoid setup and environment.\n\n\
        Runs diagnostics for the config file, GitHub token, LLM API key,\n\
        configured repositories and the tracker file. Use --format json for\n\
        machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<GitzoidConfig> {
    let mut config = match path {
        Some(path) => GitzoidConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                GitzoidConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err(format!("loading {CONFIG_FILE}"))?
            } else {
                GitzoidConfig::default()
            }
        }
    };
    config.apply_env();
    Ok(config)
}

/// Repositories a `run` processes: all enabled ones, or just `only`.
fn select_repositories(config: &GitzoidConfig, only: Option<&str>) -> Vec<RepositoryConfig> {
    match only {
        Some(id) => vec![config
            .repositories
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap_or_else(|| RepositoryConfig::new(id))],
        None => config.enabled_repositories().cloned().collect(),
    }
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mgitzoid\x1b[0m v{version}: pull request reviews that keep up with every push\n");
        println!("Quick start:");
        println!("  \x1b[36mgitzoid init\x1b[0m            Create a .gitzoid.toml config file");
        println!("  \x1b[36mgitzoid run --dry-run\x1b[0m   See which PRs would be reviewed");
        println!("  \x1b[36mgitzoid run\x1b[0m             Review and comment on open PRs\n");
    } else {
        println!("gitzoid v{version}: pull request reviews that keep up with every push\n");
        println!("Quick start:");
        println!("  gitzoid init            Create a .gitzoid.toml config file");
        println!("  gitzoid run --dry-run   See which PRs would be reviewed");
        println!("  gitzoid run             Review and comment on open PRs\n");
    }

    println!("Run 'gitzoid <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> &'static str {
        match (self.status, use_color) {
            ("pass", true) => "\x1b[32m\u{2713}\x1b[0m",
            ("fail", true) => "\x1b[31m\u{2717}\x1b[0m",
            (_, true) => "\x1b[33m~\x1b[0m",
            ("pass", false) => "\u{2713}",
            ("fail", false) => "\u{2717}",
            (_, false) => "~",
        }
    }
}

fn run_doctor(config: &GitzoidConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    if Path::new(CONFIG_FILE).exists() {
        checks.push(CheckResult::pass("config_file", format!("{CONFIG_FILE} found")));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            format!("{CONFIG_FILE} not found"),
            "run 'gitzoid init' to create a default config",
        ));
    }

    if config.github.token.is_some() {
        checks.push(CheckResult::pass(
            "github_token",
            format!("configured ({})", config.github.api_url),
        ));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "no GitHub token",
            "set GITHUB_TOKEN or [github].token in .gitzoid.toml",
        ));
    }

    checks.push(CheckResult::pass(
        "llm_provider",
        format!(
            "{} (model: {}, endpoint: {})",
            config.llm.provider,
            config.llm.model,
            config.llm.api_root()
        ),
    ));
    if config.llm.api_key.is_some() {
        checks.push(CheckResult::pass("llm_api_key", "configured"));
    } else if config.llm.base_url.is_some() {
        checks.push(CheckResult::info(
            "llm_api_key",
            "not set (custom base_url, may not need one)",
        ));
    } else {
        checks.push(CheckResult::fail(
            "llm_api_key",
            "not set",
            format!(
                "set {} or [llm].api_key in .gitzoid.toml",
                config.llm.api_key_env()
            ),
        ));
    }
    checks.push(CheckResult::info(
        "diff_budget",
        format!("{} characters", config.diff_char_budget()),
    ));

    let enabled = config.enabled_repositories().count();
    if enabled > 0 {
        checks.push(CheckResult::pass(
            "repositories",
            format!("{enabled} enabled of {}", config.repositories.len()),
        ));
    } else {
        checks.push(CheckResult::fail(
            "repositories",
            "no enabled repositories",
            "add a [[repositories]] entry with id = \"owner/name\"",
        ));
    }

    let tracker_path = &config.tracker.path;
    if tracker_path.exists() {
        match TrackerMap::load(tracker_path) {
            Ok(map) => checks.push(CheckResult::pass(
                "tracker",
                format!("{} ({} entries)", tracker_path.display(), map.len()),
            )),
            Err(e) => checks.push(CheckResult::fail(
                "tracker",
                e.to_string(),
                "fix or delete the tracker file; it is rebuilt on the next run",
            )),
        }
    } else {
        checks.push(CheckResult::info(
            "tracker",
            format!("{} not created yet", tracker_path.display()),
        ));
    }

    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!("Gitzoid v{version}: Environment Check\n");
            for check in &checks {
                let label = check.name.replace('_', " ");
                println!("  {} {label:<16} {}", check.symbol(use_color), check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn print_status(map: &TrackerMap, repo: Option<&str>, format: OutputFormat) -> Result<()> {
    let prefix = repo.map(|r| format!("{r}#"));
    let entries: Vec<(&String, &TrackerEntry)> = map
        .iter()
        .filter(|(key, _)| prefix.as_deref().map_or(true, |p| key.starts_with(p)))
        .collect();

    match format {
        OutputFormat::Json => {
            let json: BTreeMap<&str, &TrackerEntry> =
                entries.iter().map(|(k, v)| (k.as_str(), *v)).collect();
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No tracked pull requests.");
                return Ok(());
            }
            for (key, entry) in entries {
                let when = entry
                    .last_transition()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                let sha = match entry {
                    TrackerEntry::Reviewed {
                        last_reviewed_sha: Some(sha),
                        ..
                    } => sha.chars().take(7).collect(),
                    _ => String::from("-"),
                };
                println!("{key:<40} {:<9} {sha:<8} {when}", entry.status());
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Gitzoid Configuration

[github]
# token = "ghp_..."               # or set GITHUB_TOKEN
# api_url = "https://api.github.com"

[llm]
# provider = "openai"            # or "anthropic", "openrouter", "ollama"
# model = "gpt-4o-mini"
# api_key = "sk-..."              # or set OPENAI_API_KEY
# base_url = "http://localhost:11434"  # any OpenAI-compatible endpoint
# max_input_tokens = 10000
# max_output_tokens = 1024

[review]
# first_run_limit = 2      # PRs reviewed the first time a repository is seen
# stale_pr_days = 60       # ignore PRs older than this
# retention_days = 90      # forget tracked PRs untouched for this long
# token_multiplier = 2.5   # characters per token for the diff budget
# max_diff_chars = 25000   # explicit diff budget, overrides the above
# skip_bots = true
# additional_context = "We prefer small, focused functions."

[tracker]
# path = ".gitzoid/tracker.json"

# [[repositories]]
# id = "owner/name"
# target_branch = "main"
# additional_context = "Payments code: be strict about rounding."
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Run { ref repo, dry_run }) => {
            let config = load_config(cli.config.as_deref())?;
            let repositories = select_repositories(&config, repo.as_deref());
            if repositories.is_empty() {
                miette::bail!(miette::miette!(
                    help = "add a [[repositories]] entry to {CONFIG_FILE} or pass --repo owner/name",
                    "No repositories to review"
                ));
            }

            let store = TrackerMap::load(&config.tracker.path).into_diagnostic()?;
            let mut tracker = ReviewTracker::new(store, TrackerSettings::from(&config.review));
            let github = GitHubClient::new(&config.github).into_diagnostic()?;

            let reviewer_llm = if dry_run {
                None
            } else {
                let client = LlmClient::new(&config.llm).into_diagnostic()?;
                Some(LlmReviewer::new(client, config.diff_char_budget()))
            };
            let reviewer = reviewer_llm.as_ref().map(|llm| Reviewer {
                generator: llm,
                publisher: &github,
            });

            let spinner = if std::io::stderr().is_terminal() {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .into_diagnostic()?,
                );
                pb.set_message(format!("Reviewing {} repositories...", repositories.len()));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let summary = run_pass(
                &mut tracker,
                &repositories,
                &github,
                reviewer,
                config.review.additional_context.as_deref(),
                Utc::now(),
            )
            .await;

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            if summary.tracker_changed && !dry_run {
                tracker
                    .store()
                    .save(&config.tracker.path)
                    .into_diagnostic()
                    .wrap_err("saving tracker")?;
                tracing::debug!(path = %config.tracker.path.display(), "tracker saved");
            }

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary).into_diagnostic()?
                    );
                }
                OutputFormat::Text => print!("{summary}"),
            }
        }
        Some(Command::Status { ref repo }) => {
            let config = load_config(cli.config.as_deref())?;
            let map = TrackerMap::load(&config.tracker.path).into_diagnostic()?;
            print_status(&map, repo.as_deref(), cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            let config = load_config(cli.config.as_deref())?;
            run_doctor(&config, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "gitzoid", &mut std::io::stdout());
        }
    }

    Ok(())
}
