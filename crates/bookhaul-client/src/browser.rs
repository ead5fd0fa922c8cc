use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bookhaul_core::error::AppError;
use bookhaul_core::models::{Point, Rect};
use bookhaul_core::traits::{BrowserPage, PageElement};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::layout;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::binary::find_chrome_binary;

/// Attribute used to hand an element found by script back to CDP.
const ANCHOR_ATTR: &str = "data-bookhaul-anchor";

fn cdp_error(action: &str) -> impl FnOnce(CdpError) -> AppError + '_ {
    move |e| AppError::Browser(format!("{action}: {e}"))
}

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Persistent profile holding the storefront login.
    pub profile_dir: PathBuf,
    /// Where the browser saves downloaded files. Must be absolute.
    pub download_dir: PathBuf,
    /// Show a browser window instead of running headless.
    pub show: bool,
}

/// A running Chromium with a single tab open.
///
/// The CDP handler is pumped on a background task for as long as the session
/// lives; [`BrowserSession::close`] shuts the browser down and waits for it.
pub struct BrowserSession {
    browser: Browser,
    page: ChromePage,
    handler: JoinHandle<()>,
    lifecycle: JoinHandle<()>,
}

impl BrowserSession {
    /// Launches Chromium with the profile from `options` and opens a blank tab.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$CHROME_BIN`, a
    /// well-known install path, or the default locations checked by
    /// `chromiumoxide`.
    pub async fn launch(options: &SessionOptions) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .user_data_dir(&options.profile_dir);

        if let Some(bin) = find_chrome_binary() {
            tracing::info!(path = %bin.display(), "Using Chrome binary");
            builder = builder.chrome_executable(bin);
        }

        if options.show {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless=new");
        }

        let config = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::Browser(format!("browser config error: {e}")))?;

        tracing::info!(
            profile = %options.profile_dir.display(),
            headless = !options.show,
            "Launching browser"
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(cdp_error("failed to launch browser"))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "Browser CDP handler error");
                    break;
                }
            }
        });

        let download = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(options.download_dir.to_string_lossy())
            .build()
            .map_err(AppError::Browser)?;
        browser
            .execute(download)
            .await
            .map_err(cdp_error("failed to set download directory"))?;
        tracing::info!(dir = %options.download_dir.display(), "Downloads enabled");

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(cdp_error("failed to open tab"))?;

        // Chrome only emits lifecycle events once asked to.
        page.execute(lifecycle_events_on())
            .await
            .map_err(cdp_error("failed to enable lifecycle events"))?;
        let mut events = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(cdp_error("failed to subscribe to lifecycle events"))?;
        let lifecycle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                tracing::debug!(name = %event.name, "Page lifecycle event");
            }
        });

        Ok(Self {
            browser,
            page: ChromePage::new(page),
            handler,
            lifecycle,
        })
    }

    /// The tab the scrape runs in.
    pub fn page(&self) -> ChromePage {
        self.page.clone()
    }

    pub async fn close(mut self) -> Result<(), AppError> {
        self.lifecycle.abort();
        self.browser
            .close()
            .await
            .map_err(cdp_error("failed to close browser"))?;
        self.browser
            .wait()
            .await
            .map_err(|e| AppError::Browser(format!("browser did not exit: {e}")))?;
        self.handler.abort();
        tracing::debug!("Browser closed");
        Ok(())
    }
}

/// [`BrowserPage`] over a chromiumoxide tab.
#[derive(Clone)]
pub struct ChromePage {
    page: Page,
    anchors: Arc<AtomicU64>,
}

impl ChromePage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            anchors: Arc::new(AtomicU64::new(0)),
        }
    }

    fn wrap(&self, element: Element) -> ChromeElement {
        ChromeElement {
            element,
            page: self.clone(),
        }
    }
}

impl BrowserPage for ChromePage {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        tracing::debug!(%url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(cdp_error("navigation failed"))?;
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), AppError> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(cdp_error("page did not finish loading"))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        let url = self
            .page
            .url()
            .await
            .map_err(cdp_error("failed to read page URL"))?;
        Ok(url.unwrap_or_default())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ChromeElement>, AppError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(cdp_error("element query failed"))?;
        Ok(elements.into_iter().map(|e| self.wrap(e)).collect())
    }

    async fn move_pointer(&self, point: Point) -> Result<(), AppError> {
        self.page
            .move_mouse(layout::Point::new(point.x, point.y))
            .await
            .map_err(cdp_error("pointer move failed"))?;
        Ok(())
    }

    async fn click_at(&self, point: Point) -> Result<(), AppError> {
        self.page
            .click(layout::Point::new(point.x, point.y))
            .await
            .map_err(cdp_error("click failed"))?;
        Ok(())
    }
}

/// Element handle tied to the [`ChromePage`] it was found on.
pub struct ChromeElement {
    element: Element,
    page: ChromePage,
}

impl PageElement for ChromeElement {
    async fn text(&self) -> Result<String, AppError> {
        let text = self
            .element
            .inner_text()
            .await
            .map_err(cdp_error("failed to read element text"))?;
        Ok(text.unwrap_or_default())
    }

    async fn click(&self) -> Result<(), AppError> {
        self.element
            .click()
            .await
            .map_err(cdp_error("element click failed"))?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<(), AppError> {
        self.element
            .scroll_into_view()
            .await
            .map_err(cdp_error("scroll failed"))?;
        Ok(())
    }

    async fn bounding_box(&self) -> Result<Rect, AppError> {
        let bounds = self
            .element
            .bounding_box()
            .await
            .map_err(cdp_error("failed to read element bounds"))?;
        Ok(Rect {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        })
    }

    /// CDP has no ancestor lookup, so the ancestor is tagged from script and
    /// then found again by that tag.
    async fn closest(&self, selector: &str) -> Result<Self, AppError> {
        let anchor = self.page.anchors.fetch_add(1, Ordering::Relaxed).to_string();

        let tagged = self
            .element
            .call_js_fn(closest_script(selector, &anchor), false)
            .await
            .map_err(cdp_error("ancestor lookup failed"))?;
        if tagged.result.value != Some(serde_json::Value::Bool(true)) {
            return Err(AppError::Browser(format!(
                "no ancestor matches `{selector}`"
            )));
        }

        let element = self
            .page
            .page
            .find_element(anchor_selector(&anchor))
            .await
            .map_err(cdp_error("tagged ancestor vanished"))?;
        element
            .call_js_fn(
                format!("function() {{ this.removeAttribute('{ANCHOR_ATTR}'); }}"),
                false,
            )
            .await
            .map_err(cdp_error("failed to clear ancestor tag"))?;

        Ok(self.page.wrap(element))
    }

    async fn find(&self, selector: &str) -> Result<Self, AppError> {
        let element = self
            .element
            .find_element(selector)
            .await
            .map_err(|e| AppError::Browser(format!("no descendant matches `{selector}`: {e}")))?;
        Ok(self.page.wrap(element))
    }
}

fn closest_script(selector: &str, anchor: &str) -> String {
    // JSON string literals are valid JS string literals.
    let selector = serde_json::Value::from(selector).to_string();
    let anchor = serde_json::Value::from(anchor).to_string();
    format!(
        "function() {{ \
            const target = this.closest({selector}); \
            if (!target) {{ return false; }} \
            target.setAttribute('{ANCHOR_ATTR}', {anchor}); \
            return true; \
        }}"
    )
}

fn lifecycle_events_on() -> SetLifecycleEventsEnabledParams {
    SetLifecycleEventsEnabledParams::new(true)
}

fn anchor_selector(anchor: &str) -> String {
    format!("[{ANCHOR_ATTR}=\"{anchor}\"]")
}
