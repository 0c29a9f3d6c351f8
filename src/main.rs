//! Indiana - bulk-import hierarchical work items into Azure DevOps.
//!
//! Reads a forest of work items from a JSON document and creates them on the
//! backend, linking each child to its parent.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use indiana::config::{
    ENV_API_URL, ENV_FILE, ENV_ORCHESTRATOR, ENV_ORGANIZATION, ENV_PROJECT, ENV_TOKEN,
};
use indiana::materialize::{format_report, MaterializeOptions};
use indiana::tracker::azure::work_items_url;
use indiana::tracker::format_work_item_summary;
use indiana::{
    parse_forest, AzureDevOpsClient, Materializer, MemoryTracker, OnParentFailure, Orchestrator,
    RawSettings, Requirements, Settings, WorkItemTracker,
};

/// Exit status when `--fail-on-error` is set and some items were not created.
const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Bulk-import hierarchical work items into Azure DevOps Boards
#[derive(Parser)]
#[command(name = "indiana")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run (imports the work item file when omitted)
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    import: ImportArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Backend connection options shared by every command.
#[derive(Args)]
struct ConnectionArgs {
    /// Personal access token
    #[arg(long, env = ENV_TOKEN, global = true, hide_env_values = true)]
    token: Option<String>,

    /// Work item backend (azdo)
    #[arg(long, env = ENV_ORCHESTRATOR, global = true)]
    orchestrator: Option<String>,

    /// Name of the organization
    #[arg(long, env = ENV_ORGANIZATION, global = true)]
    organization: Option<String>,

    /// Name of the project
    #[arg(long, env = ENV_PROJECT, global = true)]
    project: Option<String>,

    /// Service root, for Azure DevOps Server collections
    #[arg(long, env = ENV_API_URL, global = true)]
    api_url: Option<String>,
}

/// Options for creating work items.
#[derive(Args)]
struct ImportArgs {
    /// JSON file containing the work items to be created
    #[arg(long, env = ENV_FILE)]
    file: Option<PathBuf>,

    /// What to do with the children of an item that could not be created
    #[arg(long, value_enum, default_value_t = OnParentFailure::OrphanChildren)]
    on_parent_failure: OnParentFailure,

    /// Maximum number of creation requests in flight (1 keeps document order)
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=64)
    )]
    concurrency: usize,

    /// Show what would be created without calling the backend
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Exit with status 2 when any work item was not created
    #[arg(long)]
    fail_on_error: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the work items that already exist in the project
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl ConnectionArgs {
    fn raw(&self, file: Option<PathBuf>) -> RawSettings {
        RawSettings {
            token: self.token.clone(),
            orchestrator: self.orchestrator.clone(),
            organization: self.organization.clone(),
            project: self.project.clone(),
            file,
            api_url: self.api_url.clone(),
        }
    }
}

fn main() -> Result<ExitCode> {
    // Variables from .env feed the clap `env` fallbacks, so load them first.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("Failed to load .env"),
    }

    match cli.command {
        None => cmd_import(&cli.connection, &cli.import),
        Some(Commands::List { format }) => {
            cmd_list(&cli.connection, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the backend client for validated settings.
fn connect(settings: &Settings) -> Result<AzureDevOpsClient> {
    match settings.orchestrator() {
        Orchestrator::AzureDevOps => {
            let client = AzureDevOpsClient::new(
                settings.token()?,
                settings.organization(),
                settings.project(),
            )
            .context("Failed to build the Azure DevOps client")?;
            Ok(client.with_api_url(settings.api_url()))
        }
    }
}

/// Create every work item in the input file.
fn cmd_import(connection: &ConnectionArgs, args: &ImportArgs) -> Result<ExitCode> {
    let requirements = if args.dry_run { Requirements::DRY_RUN } else { Requirements::IMPORT };
    let settings = Settings::resolve_from_env(connection.raw(args.file.clone()), requirements)?;
    tracing::debug!(?settings, "Resolved configuration");

    let file = settings.file()?;
    let forest = parse_forest(file)
        .with_context(|| format!("Failed to load work items from {}", file.display()))?;

    if forest.is_empty() {
        println!("No work items to create.");
        return Ok(ExitCode::SUCCESS);
    }

    let tracker: Box<dyn WorkItemTracker> = if args.dry_run {
        let base = work_items_url(settings.api_url(), settings.organization(), settings.project());
        Box::new(MemoryTracker::new(base))
    } else {
        Box::new(connect(&settings)?)
    };

    let options = MaterializeOptions {
        on_parent_failure: args.on_parent_failure,
        concurrency: args.concurrency,
    };

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(
        Materializer::new(tracker.as_ref(), settings.project())
            .with_options(options)
            .materialize(&forest),
    );

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "dry_run": args.dry_run,
                "summary": report.summary(),
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            if args.dry_run {
                println!("[DRY RUN] Would create in {}:\n", settings.project());
            } else {
                println!("Work items in {}:\n", settings.project());
            }
            println!("{}", format_report(&report));
        }
    }

    if args.fail_on_error && report.has_failures() {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }

    Ok(ExitCode::SUCCESS)
}

/// List existing work items.
fn cmd_list(connection: &ConnectionArgs, format: OutputFormat) -> Result<()> {
    let settings = Settings::resolve_from_env(connection.raw(None), Requirements::LIST)?;
    let client = connect(&settings)?;

    let rt = tokio::runtime::Runtime::new()?;
    let items = rt
        .block_on(client.query_work_items(settings.project()))
        .with_context(|| format!("Failed to list work items in {}", settings.project()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No work items found.");
            } else {
                for item in &items {
                    println!("{}", format_work_item_summary(item));
                }
            }
        }
    }

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "indiana", &mut io::stdout());
}
