/// Probe for `BrowserSession` against the real storefront.
///
/// Launches Chromium with the saved bookhaul profile, opens the first listing
/// page and prints what its status text says. Nothing is downloaded.
///
/// Run with:
///   cargo run -p bookhaul-client --example listing_probe -- <profile-dir> [listing-url]
use std::sync::Arc;

use bookhaul_client::{BrowserSession, SessionOptions};
use bookhaul_core::config::{
    DEFAULT_LISTING_URL, DEFAULT_PAGE_SIZE, Patterns, Phrases, ScrapeConfig,
};
use bookhaul_core::locator::ElementLocator;
use bookhaul_core::models::PageOutcome;
use bookhaul_core::navigator::PageNavigator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,bookhaul_core=debug")
        .init();

    let mut args = std::env::args().skip(1);
    let profile_dir = args
        .next()
        .map(std::path::PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: listing_probe <profile-dir> [listing-url]"))?;
    let listing_url = args.next().unwrap_or_else(|| DEFAULT_LISTING_URL.to_string());

    // The device is never used: the probe stops before any item.
    let patterns = Patterns::compile(&Phrases::default(), "unused")?;
    let config = Arc::new(ScrapeConfig::new(
        listing_url,
        DEFAULT_PAGE_SIZE,
        patterns,
        "unused-checkpoint.txt",
    )?);

    let download_dir = std::env::temp_dir().join("bookhaul-probe");
    std::fs::create_dir_all(&download_dir)?;
    let session = BrowserSession::launch(&SessionOptions {
        profile_dir,
        download_dir,
        show: false,
    })
    .await?;

    let locator = ElementLocator::new(session.page(), config.timings.retry_sleep);
    let navigator = PageNavigator::new(locator, config.clone());

    match navigator.open_listing_page(1).await? {
        PageOutcome::Opened(summary) => println!(
            "OK: showing {} to {} of {} items",
            summary.start_index, summary.end_index, summary.total_count
        ),
        PageOutcome::EndOfCollection => println!("OK: library is empty"),
    }

    session.close().await?;
    Ok(())
}
