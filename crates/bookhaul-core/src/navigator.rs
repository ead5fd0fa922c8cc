use std::sync::Arc;

use crate::config::ScrapeConfig;
use crate::error::AppError;
use crate::locator::ElementLocator;
use crate::models::{PageOutcome, PageSummary};
use crate::traits::{BrowserPage, PageElement};

/// URL checks made after navigating before declaring the session signed out.
pub const AUTH_POLL_ATTEMPTS: u32 = 60;

/// Where the browser ended up after asking for a listing page.
#[derive(Debug, PartialEq, Eq)]
enum Landing {
    Requested,
    /// Another listing page: the requested one lies beyond the data.
    OtherListing(String),
}

/// Opens listing pages and reads their pagination status.
pub struct PageNavigator<P> {
    locator: ElementLocator<P>,
    config: Arc<ScrapeConfig>,
}

impl<P: BrowserPage> PageNavigator<P> {
    pub fn new(locator: ElementLocator<P>, config: Arc<ScrapeConfig>) -> Self {
        Self { locator, config }
    }

    /// Open listing page `page_number` and read its status text.
    ///
    /// Being redirected to a different listing page is reported as
    /// [`PageOutcome::EndOfCollection`]; landing anywhere else for the whole
    /// polling window is [`AppError::NotAuthenticated`].
    pub async fn open_listing_page(&self, page_number: u32) -> Result<PageOutcome, AppError> {
        let url = self.config.page_url(page_number);
        let page = self.locator.page();

        page.navigate(&url).await?;
        page.wait_for_load().await?;

        if let Landing::OtherListing(landed) = self.await_listing(&url).await? {
            tracing::info!(page = page_number, %landed, "Redirected past the last listing page");
            return Ok(PageOutcome::EndOfCollection);
        }

        let showing = &self.config.patterns.showing;
        let status = self
            .locator
            .find_one(&self.config.selectors.text, showing)
            .await?;
        let summary = PageSummary::parse(&status.text().await?, showing)?;

        tracing::info!(
            page = page_number,
            start = summary.start_index,
            end = summary.end_index,
            total = summary.total_count,
            "Opened listing page"
        );
        Ok(PageOutcome::Opened(summary))
    }

    /// Poll the current URL until it settles on a listing page.
    ///
    /// When signed out the storefront redirects away from the listing; when
    /// asked for a page beyond the data it redirects to an earlier page.
    async fn await_listing(&self, requested: &str) -> Result<Landing, AppError> {
        let page = self.locator.page();

        for attempt in 1..=AUTH_POLL_ATTEMPTS {
            tokio::time::sleep(self.config.timings.retry_sleep).await;

            let current = page.current_url().await?;
            tracing::debug!(url = %current, attempt, "Checking landing URL");

            if current == requested {
                tracing::debug!("Authenticated");
                return Ok(Landing::Requested);
            }
            if current.starts_with(&self.config.listing_url) {
                return Ok(Landing::OtherListing(current));
            }
            if attempt == 1 {
                tracing::warn!(
                    url = %current,
                    "Not on the library listing; sign in, or rerun with the `login` command"
                );
            }
        }

        Err(AppError::NotAuthenticated)
    }
}
