use std::time::Duration;

use crate::config::MatchPattern;
use crate::error::AppError;
use crate::traits::{BrowserPage, PageElement};

/// Attempts made by [`ElementLocator::find_all`] before giving up.
pub const FIND_ATTEMPTS: u32 = 5;

/// Finds elements by their rendered text, tolerating slow rendering.
///
/// The storefront renders asynchronously, so a single query can race the
/// page. Queries are repeated a bounded number of times and the first
/// non-empty result wins.
#[derive(Clone)]
pub struct ElementLocator<P> {
    page: P,
    retry_sleep: Duration,
}

impl<P: BrowserPage> ElementLocator<P> {
    pub fn new(page: P, retry_sleep: Duration) -> Self {
        Self { page, retry_sleep }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// All elements matching `selector` whose text satisfies `pattern`.
    ///
    /// Returns [`AppError::NotFound`] when no attempt matched anything.
    pub async fn find_all(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<Vec<P::Element>, AppError> {
        for attempt in 1..=FIND_ATTEMPTS {
            tracing::debug!(%selector, %pattern, attempt, "Looking for element with text");

            let mut found = Vec::new();
            for element in self.page.query_all(selector).await? {
                let text = element.text().await?;
                if pattern.is_match(&text) {
                    found.push(element);
                }
            }

            if !found.is_empty() {
                return Ok(found);
            }
            if attempt < FIND_ATTEMPTS {
                tokio::time::sleep(self.retry_sleep).await;
            }
        }

        Err(AppError::NotFound {
            selector: selector.to_string(),
            pattern: pattern.to_string(),
        })
    }

    /// The single element matching `selector` and `pattern`.
    ///
    /// Zero matches is [`AppError::NotFound`]; more than one is
    /// [`AppError::Ambiguous`].
    pub async fn find_one(
        &self,
        selector: &str,
        pattern: &MatchPattern,
    ) -> Result<P::Element, AppError> {
        let mut found = self.find_all(selector, pattern).await?;
        if found.len() > 1 {
            return Err(AppError::Ambiguous {
                selector: selector.to_string(),
                pattern: pattern.to_string(),
                count: found.len(),
            });
        }
        found.pop().ok_or_else(|| AppError::NotFound {
            selector: selector.to_string(),
            pattern: pattern.to_string(),
        })
    }
}
