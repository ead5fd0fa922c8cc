use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error types for bookhaul.
///
/// Reaching the end of the collection is deliberately absent: it is a normal
/// outcome carried by [`crate::models::PageOutcome::EndOfCollection`].
#[derive(Error, Debug)]
pub enum AppError {
    /// No element matched after every locator attempt.
    #[error("no `{selector}` matching {pattern} found")]
    NotFound { selector: String, pattern: String },

    /// More than one element matched where exactly one was expected.
    #[error("expected one `{selector}` matching {pattern} but found {count}")]
    Ambiguous {
        selector: String,
        pattern: String,
        count: usize,
    },

    /// The storefront never showed the requested listing page.
    #[error("browser is not logged in: run `bookhaul login` and sign in, then retry")]
    NotAuthenticated,

    /// The listing page status text could not be parsed.
    #[error("could not parse listing status text {text:?} with {pattern}")]
    StatusText { text: String, pattern: String },

    /// A listing page rendered but contained no action triggers.
    #[error("no items found on listing page {page}")]
    NoItemsOnPage { page: u32 },

    /// Reading or writing the checkpoint failed.
    #[error("checkpoint {}: {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    /// The browser control surface reported a failure.
    #[error("browser error: {0}")]
    Browser(String),

    /// Configuration values are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppError {
    /// Returns true for the "element absent after retries" condition.
    ///
    /// Callers branch on this to treat an absent element as an alternate
    /// path rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AppError::Checkpoint {
            path: path.into(),
            message: message.into(),
        }
    }
}
