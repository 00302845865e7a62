//! missive CLI
//!
//! - `send`: recipient テーブルを順に送信（resume 可能、Ctrl-C で recipient の間に停止）
//! - `status`: 状態ファイルの集計と直近 30 件（`--watch` で定期表示）
//! - `preview`: recipient テーブルと最初の数件のメッセージ variation
//! - `clean`: 状態ファイルを削除

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use missive_core::app::{
    Campaign, CampaignSources, DispatchOrchestrator, DispatchWorker, RunOptions, RunReport,
    RunState, StatusView,
};
use missive_core::config::MissiveConfig;
use missive_core::domain::MessageTemplate;
use missive_core::impls::{
    InMemoryStateStore, JsonFileStateStore, NoDelay, ScriptStats, ScriptedChannel,
};
use missive_core::ports::{Clock, Credentials, DeliveryStateStore, SystemClock};
use missive_core::recipients::load_recipients;

/// Recipient dispatch with resumable delivery state.
#[derive(Parser, Debug)]
#[command(name = "missive")]
#[command(about = "Send a message to every recipient in a table, resumably")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (default: ./missive.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Delivery state file (overrides [paths] status)
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch the message to the recipient window
    Send(SendArgs),

    /// Show delivery progress
    Status {
        /// Re-read every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the loaded recipients and the first message variations
    Preview {
        /// Number of variations to print
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        #[arg(long)]
        recipients: Option<PathBuf>,

        #[arg(long)]
        message: Option<PathBuf>,
    },

    /// Delete the delivery state file
    Clean,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Recipient table (overrides [paths] recipients)
    #[arg(long)]
    recipients: Option<PathBuf>,

    /// Message template (overrides [paths] message)
    #[arg(long)]
    message: Option<PathBuf>,

    /// First recipient index to consider
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Window width; 0 means to the end
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Discard saved progress and start from scratch
    #[arg(long)]
    reset: bool,

    /// Ask the channel helper to run without a visible UI
    #[arg(long)]
    headless: bool,

    /// Use a stub channel and an in-memory copy of the state; nothing is sent or saved
    #[arg(long)]
    dry_run: bool,

    #[arg(long, env = "MISSIVE_ACCOUNT", default_value = "")]
    account: String,

    #[arg(long, env = "MISSIVE_SECRET", default_value = "", hide_env_values = true)]
    secret: String,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config =
        MissiveConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let status_path = cli
        .status_file
        .clone()
        .unwrap_or_else(|| config.paths.status.clone());

    match cli.command {
        Commands::Send(args) => cmd_send(&config, status_path, args).await,
        Commands::Status { watch, json } => cmd_status(&status_path, watch, json).await,
        Commands::Preview {
            count,
            recipients,
            message,
        } => cmd_preview(&config, count, recipients, message),
        Commands::Clean => cmd_clean(&status_path),
    }
}

fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_send(
    config: &MissiveConfig,
    status_path: PathBuf,
    args: SendArgs,
) -> Result<ExitCode> {
    let sources = CampaignSources {
        recipients: args
            .recipients
            .unwrap_or_else(|| config.paths.recipients.clone()),
        message: args.message.unwrap_or_else(|| config.paths.message.clone()),
    };
    let mut credentials = Credentials::new(args.account, args.secret);
    if args.dry_run && !credentials.is_complete() {
        credentials = Credentials::new("dry-run", "dry-run");
    }
    let campaign =
        Campaign::prepare(&sources, credentials, &SystemClock).context("Cannot start the run")?;

    let options = RunOptions {
        start: args.start,
        limit: args.limit,
        reset: args.reset,
        headless: args.headless,
    };

    let file_store = JsonFileStateStore::new(&status_path);
    let builder = DispatchOrchestrator::builder()
        .phrases(config.phrases.phrase_book())
        .variation(config.variation.clone());
    let (builder, dry_stats) = if args.dry_run {
        let channel = ScriptedChannel::always_success();
        let stats = channel.stats();
        let store = match file_store.load()? {
            Some(state) => InMemoryStateStore::with_state(state),
            None => InMemoryStateStore::new(),
        };
        let builder = builder
            .channel(Arc::new(channel))
            .store(Arc::new(store))
            .rate_limiter(Arc::new(NoDelay));
        (builder, Some(stats))
    } else {
        let channel = config
            .channel
            .command_channel()
            .context("No channel helper configured (set [channel] command in missive.toml)")?;
        let builder = builder
            .channel(Arc::new(channel))
            .store(Arc::new(file_store))
            .rate_limiter(Arc::new(config.pacing.rate_limiter()));
        (builder, None)
    };
    let orchestrator = builder.build()?;

    info!(
        recipients = campaign.recipients.len(),
        state = %status_path.display(),
        dry_run = args.dry_run,
        "starting dispatch"
    );
    let handle = DispatchWorker::spawn(Arc::new(orchestrator), campaign, options);
    let stop = handle.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current recipient");
            stop.request_stop();
        }
    });

    let report = handle.join().await.context("Dispatch run failed")?;

    if let Some(stats) = dry_stats {
        print_dry_run(&stats);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(match report.state {
        RunState::Aborted => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    })
}

fn print_report(report: &RunReport) {
    println!(
        "{}: {:?}  window {}..{}",
        report.run_id, report.state, report.window.0, report.window.1
    );
    println!(
        "  attempted {}  success {}  fail {}  skipped {}",
        report.attempted, report.succeeded, report.failed, report.skipped
    );
    for (reason, count) in &report.by_reason {
        println!("  {reason:<14} {count}");
    }
    if let Some(reason) = &report.abort_reason {
        println!("  aborted: {reason}");
    }
}

fn print_dry_run(stats: &ScriptStats) {
    for sent in stats.sent() {
        println!("-> {}", sent.recipient_id);
        for line in sent.message.lines() {
            println!("   | {line}");
        }
    }
}

async fn cmd_status(path: &Path, watch: Option<u64>, json: bool) -> Result<ExitCode> {
    let view = StatusView::new(Arc::new(JsonFileStateStore::new(path)));
    loop {
        let snapshot = view
            .read()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            print!("{snapshot}");
        }

        let Some(secs) = watch else {
            break;
        };
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs.max(1))) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        if !json {
            println!();
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_preview(
    config: &MissiveConfig,
    count: usize,
    recipients: Option<PathBuf>,
    message: Option<PathBuf>,
) -> Result<ExitCode> {
    let recipients_path = recipients.unwrap_or_else(|| config.paths.recipients.clone());
    let message_path = message.unwrap_or_else(|| config.paths.message.clone());

    let loaded = load_recipients(&recipients_path, SystemClock.now())
        .with_context(|| format!("Failed to load {}", recipients_path.display()))?;
    let blank = loaded.iter().filter(|r| r.has_blank_id()).count();
    println!(
        "{} recipients ({} with blank id) from {}",
        loaded.len(),
        blank,
        recipients_path.display()
    );
    for r in loaded.iter().take(10) {
        println!(
            "{:>5}  {:<24}  {:<16}  {}",
            r.index,
            r.id,
            r.nickname.as_deref().unwrap_or(""),
            r.hearts
        );
    }

    let text = std::fs::read_to_string(&message_path)
        .with_context(|| format!("Failed to read {}", message_path.display()))?;
    let template = MessageTemplate::new(text);
    for (n, variant) in template.preview(count, &config.variation).iter().enumerate() {
        println!("--- #{n} ({} chars)", variant.chars().count());
        println!("{variant}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_clean(path: &Path) -> Result<ExitCode> {
    JsonFileStateStore::new(path)
        .clear()
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    println!("removed {}", path.display());
    Ok(ExitCode::SUCCESS)
}
