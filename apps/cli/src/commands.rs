//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use copyforge_core::CancelFlag;
use copyforge_shared::{
    AppConfig, BatchEvent, LogLevel, RefinementFeedback, RowOutcome, init_config, load_config,
    normalize_key, validate_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::tables;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// copyforge — audited marketing copy for product tables.
#[derive(Parser)]
#[command(
    name = "copyforge",
    version,
    about = "Generate and quality-audit marketing copy for every product in a table.",
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a batch over a product table and write the assembled result.
    Run {
        /// Product table (JSON) to process.
        input: PathBuf,

        /// Optional catalog table merged onto the input by key.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Where to write the assembled table.
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the below-target rows to this path for review.
        #[arg(long)]
        disapproved: Option<PathBuf>,

        /// Override the configured concurrency cap.
        #[arg(long)]
        max_concurrent: Option<usize>,
    },

    /// Re-run rows a reviewer sent back, with their feedback.
    Reprocess {
        /// Previously assembled table holding the stored content.
        input: PathBuf,

        /// Reprocess request file: [{"sku": ..., "feedback": ...}].
        #[arg(long)]
        items: PathBuf,

        /// Where to write the updated table.
        #[arg(short, long)]
        output: PathBuf,
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
        0 => "copyforge=info",
        1 => "copyforge=debug",
        _ => "copyforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            catalog,
            output,
            disapproved,
            max_concurrent,
        } => cmd_run(&input, catalog.as_deref(), &output, disapproved.as_deref(), max_concurrent).await,
        Command::Reprocess {
            input,
            items,
            output,
        } => cmd_reprocess(&input, &items, &output).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Batch run
// ---------------------------------------------------------------------------

async fn cmd_run(
    input: &std::path::Path,
    catalog: Option<&std::path::Path>,
    output: &std::path::Path,
    disapproved: Option<&std::path::Path>,
    max_concurrent: Option<usize>,
) -> Result<()> {
    let mut config = load_config()?;
    validate_api_key(&config)?;
    if let Some(cap) = max_concurrent {
        config.pipeline.max_concurrent_rows = cap;
    }

    let mut table = tables::read_table(input)?;
    if let Some(catalog_path) = catalog {
        let catalog_table = tables::read_table(catalog_path)?;
        let unmatched = tables::merge_catalog(&mut table, &catalog_table, &config.columns.key)?;
        for key in unmatched {
            warn!(key, "catalog row has no matching product");
        }
    }
    let rows = tables::rows_from_table(&table, &config.columns.key)?;
    if rows.is_empty() {
        return Err(eyre!("input table has no processable rows"));
    }

    info!(rows = rows.len(), input = %input.display(), "batch run starting");

    let scheduler = copyforge_core::build_scheduler(&config)?;
    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());

    let total = rows.len();
    let (mut events, handle) = scheduler.run(rows, cancel);

    let bar = batch_progress_bar(total as u64);
    let mut outcomes = Vec::with_capacity(total);
    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Log { message, level, .. } => match level {
                LogLevel::Info => bar.set_message(message),
                LogLevel::Warning | LogLevel::Error => bar.println(message),
            },
            BatchEvent::Progress { current, sku, .. } => {
                bar.set_position(current as u64);
                bar.set_message(sku);
            }
            BatchEvent::Result { outcome, .. } => {
                if let RowOutcome::Error { sku, reason } = &outcome {
                    bar.println(format!("  error [{sku}]: {reason}"));
                }
                outcomes.push(outcome);
            }
            BatchEvent::BatchDone { .. } => {}
        }
    }
    bar.finish_and_clear();

    let summary = handle.await.map_err(|e| eyre!("batch driver failed: {e}"))?;

    let assembled = copyforge_core::assemble(&table, &outcomes, &config.columns)?;
    tables::write_table(output, &assembled)?;

    if let Some(path) = disapproved {
        let review = copyforge_core::disapproved_rows(&table, &outcomes, &config.columns.key)?;
        tables::write_table(path, &review)?;
        info!(rows = review.rows.len(), path = %path.display(), "review table written");
    }

    println!();
    println!("  Batch finished.");
    println!("  Total:   {}", summary.total);
    println!("  Success: {}", summary.success);
    println!("  Skipped: {}", summary.skipped);
    println!("  Errors:  {}", summary.errors);
    println!("  Output:  {}", output.display());
    println!();

    Ok(())
}

/// Cancel the batch on the first Ctrl-C; a second one kills the process the
/// usual way.
fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight rows");
            cancel.cancel();
        }
    });
}

fn batch_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/dim} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    bar
}

// ---------------------------------------------------------------------------
// Reprocess
// ---------------------------------------------------------------------------

async fn cmd_reprocess(
    input: &std::path::Path,
    items: &std::path::Path,
    output: &std::path::Path,
) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let table = tables::read_table(input)?;
    let requests = tables::read_reprocess_items(items)?;
    if requests.is_empty() {
        return Err(eyre!("reprocess file names no rows"));
    }

    let rows = tables::rows_from_table(&table, &config.columns.key)?;
    let key_idx = table
        .column_index(&config.columns.key)
        .ok_or_else(|| eyre!("input table has no '{}' column", config.columns.key))?;
    let worker = copyforge_core::build_worker(&config)?;

    let bar = batch_progress_bar(requests.len() as u64);
    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let wanted = normalize_key(&request.sku);
        let table_index = table
            .rows
            .iter()
            .position(|cells| normalize_key(&cells[key_idx]) == wanted);
        let row = rows.iter().find(|r| normalize_key(&r.sku) == wanted);
        let (Some(table_index), Some(row)) = (table_index, row) else {
            bar.println(format!("  skipping unknown sku {}", request.sku));
            bar.inc(1);
            continue;
        };

        bar.set_message(row.sku.clone());
        let prior = tables::prior_bundle(&table, &config.columns, table_index)?;
        let feedback = RefinementFeedback::User {
            text: request.feedback,
        };
        outcomes.push(worker.process_reprocess(row, prior, feedback).await);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let assembled = copyforge_core::assemble(&table, &outcomes, &config.columns)?;
    tables::write_table(output, &assembled)?;

    println!();
    println!("  Reprocess finished.");
    println!("  Rows:   {}", outcomes.len());
    println!("  Output: {}", output.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
