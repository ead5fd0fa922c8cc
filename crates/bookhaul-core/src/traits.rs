use std::future::Future;

use crate::error::AppError;
use crate::models::{Point, Position, Rect};

/// One element of the live page.
///
/// Handles may go stale when the page re-renders; operations on a stale
/// handle return [`AppError::Browser`].
pub trait PageElement: Send + Sync + Sized {
    /// Rendered text of the element and its descendants.
    fn text(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn click(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn scroll_into_view(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn bounding_box(&self) -> impl Future<Output = Result<Rect, AppError>> + Send;

    /// Nearest ancestor (or the element itself) matching `selector`.
    fn closest(&self, selector: &str) -> impl Future<Output = Result<Self, AppError>> + Send;

    /// First descendant matching `selector`.
    fn find(&self, selector: &str) -> impl Future<Output = Result<Self, AppError>> + Send;
}

/// The single browser tab the scrape runs in.
pub trait BrowserPage: Send + Sync + Clone {
    type Element: PageElement;

    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Wait for the current document's load event.
    fn wait_for_load(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn current_url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Every element currently matching the CSS `selector`, in document order.
    fn query_all(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<Self::Element>, AppError>> + Send;

    fn move_pointer(&self, point: Point) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Press and release the primary button at `point`.
    fn click_at(&self, point: Point) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Durable record of the next item to process.
pub trait CheckpointStore: Send + Sync {
    /// Stored position, or [`Position::FIRST`] when nothing was stored yet.
    fn load(&self) -> impl Future<Output = Result<Position, AppError>> + Send;

    /// Replace the stored position.
    fn save(&self, position: Position) -> impl Future<Output = Result<(), AppError>> + Send;
}
