mod paths;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bookhaul_client::{BrowserSession, SessionOptions, interactive_login};
use bookhaul_core::config::{
    DEFAULT_LISTING_URL, DEFAULT_PAGE_SIZE, Patterns, Phrases, ScrapeConfig, Timings,
};
use bookhaul_core::models::{Position, RunSummary};
use bookhaul_core::orchestrator::{ScrapeOrchestrator, TracingRunReporter};
use bookhaul_core::progress::ProgressTracker;
use bookhaul_core::throttle::{ActionGate, ThrottledPage};

#[derive(Parser)]
#[command(
    name = "bookhaul",
    version,
    about = "Download every e-book in your online library for USB transfer"
)]
struct Cli {
    /// Verbose logging
    #[arg(long, global = true, env = "BOOKHAUL_DEBUG")]
    debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true, env = "BOOKHAUL_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the library from the checkpoint and download every item
    Download(DownloadArgs),

    /// Open a browser window with the bookhaul profile to sign in
    Login(BrowserArgs),
}

#[derive(Args)]
struct BrowserArgs {
    /// Library listing URL, without query string
    #[arg(long, env = "BOOKHAUL_LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    listing_url: String,

    /// Browser profile directory (defaults to <config dir>/bookhaul/browser)
    #[arg(long, env = "BOOKHAUL_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    browser: BrowserArgs,

    /// Name of the device to transfer to, as shown in the device list
    #[arg(short, long, env = "BOOKHAUL_DEVICE")]
    device: String,

    /// Items per listing page
    #[arg(long, env = "BOOKHAUL_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Start at this item (1-based) instead of the checkpoint
    #[arg(short, long, env = "BOOKHAUL_START", value_parser = clap::value_parser!(u32).range(1..))]
    start: Option<u32>,

    /// File recording the next item to download
    #[arg(short, long, env = "BOOKHAUL_CHECKPOINT", default_value = "bookhaul-checkpoint.txt")]
    checkpoint: PathBuf,

    /// Directory the browser saves books into
    #[arg(short, long, env = "BOOKHAUL_OUTPUT", default_value = "Books")]
    output: PathBuf,

    /// Show the browser window
    #[arg(long, env = "BOOKHAUL_SHOW")]
    show: bool,

    #[command(flatten)]
    phrases: PhraseArgs,

    #[command(flatten)]
    timing: TimingArgs,
}

/// Storefront wording; override when the site is not in English.
#[derive(Args)]
struct PhraseArgs {
    /// Text of the per-item actions button
    #[arg(long, env = "BOOKHAUL_MSG_MORE_ACTIONS", default_value = "More actions")]
    msg_more_actions: String,

    /// Text of the transfer entry in the actions menu
    #[arg(
        long,
        env = "BOOKHAUL_MSG_DOWNLOAD_USB",
        default_value = "Download & transfer via USB"
    )]
    msg_download_usb: String,

    /// Text present only in the item actions menu
    #[arg(
        long,
        env = "BOOKHAUL_MSG_CONFIRM_MARKER",
        default_value = "Clear Furthest Page Read"
    )]
    msg_confirm_marker: String,

    /// Text of the dialog's confirm button
    #[arg(long, env = "BOOKHAUL_MSG_DOWNLOAD_BUTTON", default_value = "Download")]
    msg_download_button: String,

    /// Title of the success notification
    #[arg(long, env = "BOOKHAUL_MSG_SUCCESS", default_value = "Success")]
    msg_success: String,

    /// Pattern for the listing status text, with start, end and total groups
    #[arg(
        long,
        env = "BOOKHAUL_MSG_SHOWING",
        default_value = r"Showing.*\s+(\d+)\s+to\s+(\d+)\s+of\s+(\d+)\s+items"
    )]
    msg_showing: String,
}

impl From<&PhraseArgs> for Phrases {
    fn from(args: &PhraseArgs) -> Self {
        Phrases {
            more_actions: args.msg_more_actions.clone(),
            download_usb: args.msg_download_usb.clone(),
            confirm_marker: args.msg_confirm_marker.clone(),
            download_button: args.msg_download_button.clone(),
            success: args.msg_success.clone(),
            showing: args.msg_showing.clone(),
        }
    }
}

#[derive(Args)]
struct TimingArgs {
    /// Minimum pause between browser actions
    #[arg(long, env = "BOOKHAUL_ACTION_INTERVAL_MS", default_value_t = 1000)]
    action_interval_ms: u64,

    /// Random extra pause added to the action interval
    #[arg(long, env = "BOOKHAUL_ACTION_JITTER_MS", default_value_t = 0)]
    action_jitter_ms: u64,

    /// Pause between attempts to find an element
    #[arg(long, env = "BOOKHAUL_RETRY_SLEEP_MS", default_value_t = 1000)]
    retry_sleep_ms: u64,

    /// Pause after scrolling an item into view
    #[arg(long, env = "BOOKHAUL_SCROLL_PAUSE_MS", default_value_t = 500)]
    scroll_pause_ms: u64,

    /// Horizontal distance left of the menu where a click dismisses it
    #[arg(long, env = "BOOKHAUL_DISMISS_OFFSET", default_value_t = 50.0)]
    dismiss_offset: f64,
}

impl From<&TimingArgs> for Timings {
    fn from(args: &TimingArgs) -> Self {
        Timings {
            action_interval: Duration::from_millis(args.action_interval_ms),
            action_jitter: Duration::from_millis(args.action_jitter_ms),
            retry_sleep: Duration::from_millis(args.retry_sleep_ms),
            scroll_pause: Duration::from_millis(args.scroll_pause_ms),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.debug, cli.json) {
        eprintln!("Failed to set up logging: {e:#}");
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Commands::Download(args) => cmd_download(args).await,
        Commands::Login(args) => cmd_login(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "bookhaul failed");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(debug: bool, json: bool) -> Result<()> {
    let level = if debug { "bookhaul=debug" } else { "bookhaul=info" };
    let filter = EnvFilter::from_default_env().add_directive(level.parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_config(args: &DownloadArgs) -> Result<ScrapeConfig> {
    let phrases = Phrases::from(&args.phrases);
    let patterns = Patterns::compile(&phrases, &args.device).context("Invalid text patterns")?;
    let config = ScrapeConfig::new(
        args.browser.listing_url.clone(),
        args.page_size,
        patterns,
        args.checkpoint.clone(),
    )?
    .with_start(args.start.and_then(Position::new))
    .with_timings(Timings::from(&args.timing))
    .with_dismiss_offset(args.timing.dismiss_offset);
    Ok(config)
}

async fn cmd_download(args: DownloadArgs) -> Result<()> {
    let config = Arc::new(build_config(&args)?);

    let options = SessionOptions {
        profile_dir: paths::profile_dir(args.browser.profile_dir)?,
        download_dir: paths::download_dir(&args.output)?,
        show: args.show,
    };
    let session = BrowserSession::launch(&options)
        .await
        .context("Failed to start the browser")?;

    let timings = config.timings;
    let gate = ActionGate::new(timings.action_interval).with_jitter(timings.action_jitter);
    let page = ThrottledPage::new(session.page(), gate);
    let store = ProgressTracker::new(&config.checkpoint_path);
    tracing::info!(
        checkpoint = %store.path().display(),
        device = %args.device,
        "Starting download run"
    );
    let orchestrator = ScrapeOrchestrator::new(page, store, config.clone());

    let outcome = orchestrator.run(&TracingRunReporter).await;

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Browser did not shut down cleanly");
    }

    let summary: RunSummary = outcome.with_context(|| {
        format!(
            "Run aborted; rerun to resume from {}",
            config.checkpoint_path.display()
        )
    })?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_login(args: BrowserArgs) -> Result<()> {
    let profile_dir = paths::profile_dir(args.profile_dir)?;
    interactive_login(&profile_dir, &args.listing_url).await?;
    Ok(())
}
