//! Immutable run configuration.
//!
//! Everything site specific (text phrases, CSS selectors, timings) lives
//! here so that markup drift on the storefront is fixed by configuration
//! rather than code. A [`ScrapeConfig`] is built once at startup and shared
//! read-only by every component.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::error::AppError;
use crate::models::Position;

/// Default listing of purchased books, oldest first.
pub const DEFAULT_LISTING_URL: &str =
    "https://www.amazon.co.uk/hz/mycd/digital-console/contentlist/booksPurchases/dateAsc/";

pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Case-insensitive, whitespace-trimmed, fully anchored text predicate.
///
/// The phrase is a regular expression fragment, so literal phrases work
/// as-is and the status-text pattern can carry capture groups.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    role: &'static str,
    phrase: String,
    regex: Regex,
}

impl MatchPattern {
    pub fn new(role: &'static str, phrase: &str) -> Result<Self, AppError> {
        let regex = Regex::new(&format!(r"(?i)^\s*(?:{phrase})\s*$")).map_err(|e| {
            AppError::InvalidConfig(format!(
                "{role} phrase {phrase:?} is not a valid pattern: {e}"
            ))
        })?;
        Ok(Self {
            role,
            phrase: phrase.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.role, self.phrase)
    }
}

/// One compiled pattern per semantic role on the storefront UI.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// Opens an item's actions menu; one per item on a listing page.
    pub more_actions: MatchPattern,
    /// Menu entry that starts a transfer to a device.
    pub download_usb: MatchPattern,
    /// Menu entry always present in the actions menu, used to check the
    /// right menu opened and as an anchor for dismissing it.
    pub confirm_marker: MatchPattern,
    pub download_button: MatchPattern,
    /// Title of the notification shown once a download is accepted.
    pub success: MatchPattern,
    pub device_name: MatchPattern,
    /// Listing status text with three capture groups: start, end, total.
    pub showing: MatchPattern,
}

/// Phrases [`Patterns`] are compiled from.
#[derive(Debug, Clone)]
pub struct Phrases {
    pub more_actions: String,
    pub download_usb: String,
    pub confirm_marker: String,
    pub download_button: String,
    pub success: String,
    pub showing: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            more_actions: "More actions".into(),
            download_usb: "Download & transfer via USB".into(),
            confirm_marker: "Clear Furthest Page Read".into(),
            download_button: "Download".into(),
            success: "Success".into(),
            showing: r"Showing.*\s+(\d+)\s+to\s+(\d+)\s+of\s+(\d+)\s+items".into(),
        }
    }
}

impl Patterns {
    /// Compile every phrase. The device name is a phrase like the others,
    /// so operators may use a pattern when their device label varies.
    pub fn compile(phrases: &Phrases, device_name: &str) -> Result<Self, AppError> {
        if device_name.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "device name is required, e.g. --device \"My Kindle\"".into(),
            ));
        }

        let showing = MatchPattern::new("showing", &phrases.showing)?;
        let groups = showing.regex().captures_len() - 1;
        if groups != 3 {
            return Err(AppError::InvalidConfig(format!(
                "showing phrase {:?} must have exactly 3 capture groups, found {groups}",
                phrases.showing
            )));
        }

        Ok(Self {
            more_actions: MatchPattern::new("more_actions", &phrases.more_actions)?,
            download_usb: MatchPattern::new("download_usb", &phrases.download_usb)?,
            confirm_marker: MatchPattern::new("confirm_marker", &phrases.confirm_marker)?,
            download_button: MatchPattern::new("download_button", &phrases.download_button)?,
            success: MatchPattern::new("success", &phrases.success)?,
            device_name: MatchPattern::new("device_name", device_name)?,
            showing,
        })
    }
}

/// CSS selectors naming the element kinds each role is searched among.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Text-bearing elements: action triggers, menu entries, buttons,
    /// status text and the notification title.
    pub text: String,
    /// Device labels in the device list.
    pub device_label: String,
    /// Row enclosing a device label.
    pub device_row: String,
    /// Choice control inside a device row.
    pub device_choice: String,
    /// Container enclosing the success notification.
    pub notification: String,
    /// Close control inside the notification container.
    pub notification_close: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            text: "span".into(),
            device_label: "li div".into(),
            device_row: "li".into(),
            device_choice: "input[type='radio']".into(),
            notification: "div[id^='notification']".into(),
            notification_close: "span".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Minimum time between interactive browser actions.
    pub action_interval: Duration,
    /// Random extra delay added on top of `action_interval`.
    pub action_jitter: Duration,
    /// Wait between locator attempts and URL polls.
    pub retry_sleep: Duration,
    /// Wait after scrolling an item into view.
    pub scroll_pause: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            action_interval: Duration::from_secs(1),
            action_jitter: Duration::ZERO,
            retry_sleep: Duration::from_secs(1),
            scroll_pause: Duration::from_millis(500),
        }
    }
}

/// Everything the scrape engine needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub listing_url: String,
    pub page_size: u32,
    /// Explicit starting item; takes precedence over the checkpoint.
    pub start: Option<Position>,
    pub patterns: Patterns,
    pub selectors: Selectors,
    pub timings: Timings,
    /// Horizontal distance, in CSS pixels, left of the menu's confirm marker
    /// where a click dismisses the actions menu.
    pub dismiss_offset: f64,
    pub checkpoint_path: PathBuf,
}

impl ScrapeConfig {
    pub fn new(
        listing_url: impl Into<String>,
        page_size: u32,
        patterns: Patterns,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        let config = Self {
            listing_url: listing_url.into(),
            page_size,
            start: None,
            patterns,
            selectors: Selectors::default(),
            timings: Timings::default(),
            dismiss_offset: 50.0,
            checkpoint_path: checkpoint_path.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_start(mut self, start: Option<Position>) -> Self {
        self.start = start;
        self
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_dismiss_offset(mut self, offset: f64) -> Self {
        self.dismiss_offset = offset;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig("page size must be at least 1".into()));
        }

        let url = Url::parse(&self.listing_url).map_err(|e| {
            AppError::InvalidConfig(format!("listing URL {:?}: {e}", self.listing_url))
        })?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::InvalidConfig(format!(
                    "listing URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }
        if url.query().is_some() {
            return Err(AppError::InvalidConfig(format!(
                "listing URL {:?} must not carry a query string",
                self.listing_url
            )));
        }

        Ok(())
    }

    /// URL of the given 1-based listing page.
    pub fn page_url(&self, page_number: u32) -> String {
        format!("{}?pageNumber={page_number}", self.listing_url)
    }
}
