use std::sync::Arc;

use crate::config::ScrapeConfig;
use crate::error::AppError;
use crate::locator::ElementLocator;
use crate::models::{ItemOutcome, Point, Position};
use crate::traits::{BrowserPage, PageElement};

/// Drives one item from its "more actions" trigger to an accepted download.
///
/// The steps run strictly in order:
///
/// 1. Scroll the trigger into view and let the page settle
/// 2. Open the actions menu and check it is the expected one
/// 3. Pick the transfer entry, or dismiss the menu and skip the item
/// 4. Choose the configured device
/// 5. Confirm the download
/// 6. Check and close the success notification
///
/// Any unexpected UI state aborts with an error; only the locator retries.
pub struct ItemDownloadWorkflow<P> {
    locator: ElementLocator<P>,
    config: Arc<ScrapeConfig>,
}

impl<P: BrowserPage> ItemDownloadWorkflow<P> {
    pub fn new(locator: ElementLocator<P>, config: Arc<ScrapeConfig>) -> Self {
        Self { locator, config }
    }

    pub async fn download_one(
        &self,
        trigger: &P::Element,
        position: Position,
    ) -> Result<ItemOutcome, AppError> {
        let patterns = &self.config.patterns;
        let selectors = &self.config.selectors;

        // 1. Rendering after a scroll is asynchronous, so pause before clicking.
        trigger.scroll_into_view().await?;
        tokio::time::sleep(self.config.timings.scroll_pause).await;

        // 2. Open the menu and make sure it is the item actions menu.
        tracing::debug!(%position, "Opening actions menu");
        trigger.click().await?;
        let marker = self
            .locator
            .find_one(&selectors.text, &patterns.confirm_marker)
            .await?;

        // 3. Samples and previews have no transfer entry.
        let transfer = match self
            .locator
            .find_one(&selectors.text, &patterns.download_usb)
            .await
        {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                tracing::warn!(%position, "Item has no transfer entry, skipping");
                self.dismiss_menu(&marker).await?;
                return Ok(ItemOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(%position, "Opening device list");
        transfer.click().await?;

        // 4. Choose the device through its row's choice control.
        let label = self
            .locator
            .find_one(&selectors.device_label, &patterns.device_name)
            .await?;
        let row = label.closest(&selectors.device_row).await?;
        let choice = row.find(&selectors.device_choice).await?;
        tracing::debug!(%position, device = %patterns.device_name.phrase(), "Selecting device");
        choice.click().await?;

        // 5. Confirm.
        let button = self
            .locator
            .find_one(&selectors.text, &patterns.download_button)
            .await?;
        tracing::debug!(%position, "Requesting download");
        button.click().await?;

        // 6. The notification proves the request registered.
        let title = self
            .locator
            .find_one(&selectors.text, &patterns.success)
            .await?;
        let notification = title.closest(&selectors.notification).await?;
        let close = notification.find(&selectors.notification_close).await?;
        close.click().await?;

        tracing::info!(%position, "Downloaded item");
        Ok(ItemOutcome::Completed)
    }

    /// Click beside the open menu so it closes without touching the listing.
    async fn dismiss_menu(&self, marker: &P::Element) -> Result<(), AppError> {
        let anchor = marker.bounding_box().await?;
        let point = Point::new(anchor.x - self.config.dismiss_offset, anchor.y);

        let page = self.locator.page();
        page.move_pointer(point).await?;
        page.click_at(point).await
    }
}
