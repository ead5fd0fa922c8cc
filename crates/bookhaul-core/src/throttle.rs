//! Global pacing of interactive browser actions.
//!
//! Wraps any [`BrowserPage`] so that navigation, clicks, pointer moves and
//! scrolls are spaced at least a configured interval apart, whichever
//! element or page method issues them. Queries are never delayed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use bookhaul_core::throttle::{ActionGate, ThrottledPage};
//! # use bookhaul_core::traits::BrowserPage;
//!
//! # fn wrap<P: BrowserPage>(page: P) {
//! let gate = ActionGate::new(Duration::from_secs(1)).with_jitter(Duration::from_millis(250));
//! let page = ThrottledPage::new(page, gate);
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::models::{Point, Rect};
use crate::traits::{BrowserPage, PageElement};

/// Shared clock spacing out interactive actions.
#[derive(Debug, Clone)]
pub struct ActionGate {
    interval: Duration,
    jitter: Duration,
    last_action: Arc<Mutex<Option<Instant>>>,
}

impl ActionGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
            last_action: Arc::new(Mutex::new(None)),
        }
    }

    /// Add random jitter (uniform [0, jitter)) on top of the interval.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn effective_interval(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        self.interval + Duration::from_millis(rand_jitter_ms(self.jitter.as_millis() as u64))
    }

    /// Sleep until the interval since the previous action has elapsed, then
    /// record now as the latest action.
    pub async fn wait(&self) {
        let mut last = self.last_action.lock().await;
        if let Some(previous) = *last {
            let required = self.effective_interval();
            let elapsed = previous.elapsed();
            if elapsed < required {
                let pause = required - elapsed;
                tracing::trace!(pause_ms = %pause.as_millis(), "Pacing browser action");
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// A [`BrowserPage`] whose interactive actions pass through an [`ActionGate`].
#[derive(Clone)]
pub struct ThrottledPage<P> {
    inner: P,
    gate: ActionGate,
}

impl<P: BrowserPage> ThrottledPage<P> {
    pub fn new(inner: P, gate: ActionGate) -> Self {
        Self { inner, gate }
    }

    fn wrap(&self, element: P::Element) -> ThrottledElement<P::Element> {
        ThrottledElement {
            inner: element,
            gate: self.gate.clone(),
        }
    }
}

impl<P: BrowserPage> BrowserPage for ThrottledPage<P> {
    type Element = ThrottledElement<P::Element>;

    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        self.gate.wait().await;
        self.inner.navigate(url).await
    }

    async fn wait_for_load(&self) -> Result<(), AppError> {
        self.inner.wait_for_load().await
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.inner.current_url().await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, AppError> {
        let elements = self.inner.query_all(selector).await?;
        Ok(elements.into_iter().map(|e| self.wrap(e)).collect())
    }

    async fn move_pointer(&self, point: Point) -> Result<(), AppError> {
        self.gate.wait().await;
        self.inner.move_pointer(point).await
    }

    async fn click_at(&self, point: Point) -> Result<(), AppError> {
        self.gate.wait().await;
        self.inner.click_at(point).await
    }
}

/// Element handed out by [`ThrottledPage`]; shares the page's gate.
pub struct ThrottledElement<E> {
    inner: E,
    gate: ActionGate,
}

impl<E: PageElement> PageElement for ThrottledElement<E> {
    async fn text(&self) -> Result<String, AppError> {
        self.inner.text().await
    }

    async fn click(&self) -> Result<(), AppError> {
        self.gate.wait().await;
        self.inner.click().await
    }

    async fn scroll_into_view(&self) -> Result<(), AppError> {
        self.gate.wait().await;
        self.inner.scroll_into_view().await
    }

    async fn bounding_box(&self) -> Result<Rect, AppError> {
        self.inner.bounding_box().await
    }

    async fn closest(&self, selector: &str) -> Result<Self, AppError> {
        Ok(Self {
            inner: self.inner.closest(selector).await?,
            gate: self.gate.clone(),
        })
    }

    async fn find(&self, selector: &str) -> Result<Self, AppError> {
        Ok(Self {
            inner: self.inner.find(selector).await?,
            gate: self.gate.clone(),
        })
    }
}

// Xorshift seeded from the clock; enough to make timing look less regular.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
