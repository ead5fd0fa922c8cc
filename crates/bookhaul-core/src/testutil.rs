//! Test utilities: an in-memory storefront and mock collaborators.
//!
//! [`FakePage`] models just enough of the library UI for the engine to run
//! against it: paginated listing pages, the per-item actions menu, the
//! device dialog, the success notification and the sign-in redirect. All
//! state sits behind `Arc<Mutex<_>>` so tests can assert on what the engine
//! did after it ran.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::{Patterns, Phrases, ScrapeConfig, Timings};
use crate::error::AppError;
use crate::models::{Point, Position, Rect};
use crate::orchestrator::{RunEvent, RunReporter};
use crate::traits::{BrowserPage, CheckpointStore, PageElement};

pub const FAKE_LISTING_URL: &str = "https://books.example/contentlist/booksPurchases/dateAsc/";
pub const FAKE_SIGNIN_URL: &str = "https://books.example/ap/signin";
pub const FAKE_DEVICE: &str = "Reader's Paperwhite";

/// Config pointing at [`FakePage`] with near-zero timings.
pub fn test_config(page_size: u32) -> ScrapeConfig {
    let patterns = Patterns::compile(&Phrases::default(), FAKE_DEVICE).unwrap();
    ScrapeConfig::new(FAKE_LISTING_URL, page_size, patterns, "unused-checkpoint.txt")
        .unwrap()
        .with_timings(Timings {
            action_interval: Duration::ZERO,
            action_jitter: Duration::ZERO,
            retry_sleep: Duration::from_millis(1),
            scroll_pause: Duration::ZERO,
        })
}

// ---------------------------------------------------------------------------
// FakePage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Listing,
    Menu,
    Dialog,
    Notification,
}

#[derive(Debug, Clone, PartialEq)]
enum Role {
    Static,
    Trigger(u32),
    TransferEntry,
    DeviceChoice(String),
    DownloadButton,
    NotificationClose,
}

#[derive(Debug, Clone)]
struct FakeNode {
    /// Selectors this node answers to.
    kinds: Vec<&'static str>,
    text: String,
    parent: Option<usize>,
    rect: Rect,
    layer: Layer,
    attached: bool,
    role: Role,
}

impl FakeNode {
    fn answers(&self, selector: &str) -> bool {
        self.kinds.iter().any(|k| *k == selector)
    }
}

struct FakeState {
    total: u32,
    page_size: u32,
    samples: HashSet<u32>,
    devices: Vec<String>,
    logged_in: bool,
    status_text: bool,
    items: bool,
    fail_download_at: Option<u32>,
    duplicate_transfer_entry: bool,
    queries_fail: bool,

    url: String,
    nodes: Vec<FakeNode>,
    menu_for: Option<u32>,
    dialog_for: Option<u32>,
    selected_device: Option<String>,
    pointer: Option<Point>,
    query_lag: u32,
    queries: u32,
    navigations: Vec<String>,
    downloads: Vec<(u32, String)>,
}

impl FakeState {
    fn last_page(&self) -> u32 {
        self.total.div_ceil(self.page_size)
    }

    fn push(
        &mut self,
        layer: Layer,
        kinds: &[&'static str],
        text: &str,
        parent: Option<usize>,
        rect: Rect,
        role: Role,
    ) -> usize {
        self.nodes.push(FakeNode {
            kinds: kinds.to_vec(),
            text: text.to_string(),
            parent,
            rect,
            layer,
            attached: true,
            role,
        });
        self.nodes.len() - 1
    }

    fn detach(&mut self, layer: Layer) {
        for node in self.nodes.iter_mut().filter(|n| n.layer == layer) {
            node.attached = false;
        }
    }

    fn node(&self, id: usize) -> Result<&FakeNode, AppError> {
        match self.nodes.get(id) {
            Some(node) if node.attached => Ok(node),
            _ => Err(AppError::Browser(format!("node {id} is detached from the document"))),
        }
    }

    fn is_descendant(&self, id: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[id].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p].parent;
        }
        false
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_string());
        self.nodes.clear();
        self.menu_for = None;
        self.dialog_for = None;
        self.selected_device = None;

        if !self.logged_in {
            self.url = FAKE_SIGNIN_URL.to_string();
            return;
        }

        let requested = url
            .strip_prefix(FAKE_LISTING_URL)
            .and_then(|q| q.strip_prefix("?pageNumber="))
            .and_then(|n| n.parse::<u32>().ok());

        match requested {
            Some(n) if n >= 1 && n <= self.last_page() => {
                self.url = url.to_string();
                self.render_listing(n);
            }
            Some(_) if self.total == 0 => {
                self.url = FAKE_LISTING_URL.to_string();
            }
            Some(_) => {
                // Beyond the data: the site falls back to its last page.
                let last = self.last_page();
                self.url = format!("{FAKE_LISTING_URL}?pageNumber={last}");
                self.render_listing(last);
            }
            None => self.url = url.to_string(),
        }
    }

    fn render_listing(&mut self, page: u32) {
        let first = (page - 1) * self.page_size + 1;
        let last = (page * self.page_size).min(self.total);

        if self.status_text {
            let text = format!("Showing {first} to {last} of {} items", self.total);
            self.push(
                Layer::Listing,
                &["span"],
                &text,
                None,
                rect(40.0, 20.0, 300.0, 20.0),
                Role::Static,
            );
        }
        if !self.items {
            return;
        }
        for (row, position) in (first..=last).enumerate() {
            let y = 80.0 + 60.0 * row as f64;
            let title = format!("Book number {position}");
            self.push(
                Layer::Listing,
                &["span"],
                &title,
                None,
                rect(40.0, y, 400.0, 20.0),
                Role::Static,
            );
            self.push(
                Layer::Listing,
                &["span"],
                "More actions",
                None,
                rect(900.0, y, 120.0, 30.0),
                Role::Trigger(position),
            );
        }
    }

    fn open_menu(&mut self, position: u32, anchor: Rect) {
        self.detach(Layer::Menu);
        let top = anchor.y + anchor.height;
        let menu = self.push(
            Layer::Menu,
            &["div"],
            "",
            None,
            rect(700.0, top, 260.0, 120.0),
            Role::Static,
        );
        self.push(
            Layer::Menu,
            &["span"],
            "Clear Furthest Page Read",
            Some(menu),
            rect(710.0, top + 10.0, 240.0, 20.0),
            Role::Static,
        );
        if !self.samples.contains(&position) {
            self.push(
                Layer::Menu,
                &["span"],
                "Download & transfer via USB",
                Some(menu),
                rect(710.0, top + 40.0, 240.0, 20.0),
                Role::TransferEntry,
            );
            if self.duplicate_transfer_entry {
                self.push(
                    Layer::Menu,
                    &["span"],
                    "Download & transfer via USB",
                    Some(menu),
                    rect(710.0, top + 55.0, 240.0, 20.0),
                    Role::TransferEntry,
                );
            }
        }
        self.push(
            Layer::Menu,
            &["span"],
            "Return for Refund",
            Some(menu),
            rect(710.0, top + 70.0, 240.0, 20.0),
            Role::Static,
        );
        self.menu_for = Some(position);
    }

    fn open_dialog(&mut self) {
        self.detach(Layer::Menu);
        self.dialog_for = self.menu_for.take();
        self.selected_device = None;

        let dialog = self.push(
            Layer::Dialog,
            &["div"],
            "",
            None,
            rect(300.0, 200.0, 500.0, 400.0),
            Role::Static,
        );
        let devices = self.devices.clone();
        for (i, name) in devices.iter().enumerate() {
            let y = 240.0 + 40.0 * i as f64;
            let row = self.push(
                Layer::Dialog,
                &["li"],
                name,
                Some(dialog),
                rect(310.0, y, 480.0, 30.0),
                Role::Static,
            );
            let holder = self.push(
                Layer::Dialog,
                &["li div"],
                "",
                Some(row),
                rect(310.0, y, 20.0, 30.0),
                Role::Static,
            );
            self.push(
                Layer::Dialog,
                &["input[type='radio']"],
                "",
                Some(holder),
                rect(312.0, y + 5.0, 16.0, 16.0),
                Role::DeviceChoice(name.clone()),
            );
            self.push(
                Layer::Dialog,
                &["li div"],
                name,
                Some(row),
                rect(340.0, y, 440.0, 30.0),
                Role::Static,
            );
        }
        self.push(
            Layer::Dialog,
            &["span"],
            "Cancel",
            Some(dialog),
            rect(560.0, 560.0, 80.0, 30.0),
            Role::Static,
        );
        self.push(
            Layer::Dialog,
            &["span"],
            "Download",
            Some(dialog),
            rect(660.0, 560.0, 100.0, 30.0),
            Role::DownloadButton,
        );
    }

    fn confirm_download(&mut self) {
        let Some(position) = self.dialog_for else {
            return;
        };
        let Some(device) = self.selected_device.clone() else {
            return;
        };
        self.detach(Layer::Dialog);
        self.dialog_for = None;
        if self.fail_download_at == Some(position) {
            return;
        }
        self.downloads.push((position, device));

        let outer = self.push(
            Layer::Notification,
            &["div[id^='notification']", "div"],
            "",
            None,
            rect(600.0, 10.0, 400.0, 90.0),
            Role::Static,
        );
        let wrapper = self.push(
            Layer::Notification,
            &["div"],
            "",
            Some(outer),
            rect(600.0, 10.0, 400.0, 90.0),
            Role::Static,
        );
        self.push(
            Layer::Notification,
            &["span"],
            "",
            Some(wrapper),
            rect(980.0, 12.0, 14.0, 14.0),
            Role::NotificationClose,
        );
        let heading = self.push(
            Layer::Notification,
            &["div"],
            "",
            Some(wrapper),
            rect(610.0, 20.0, 300.0, 24.0),
            Role::Static,
        );
        let title = self.push(
            Layer::Notification,
            &["div"],
            "",
            Some(heading),
            rect(630.0, 20.0, 200.0, 24.0),
            Role::Static,
        );
        self.push(
            Layer::Notification,
            &["span"],
            "Success",
            Some(title),
            rect(630.0, 20.0, 80.0, 24.0),
            Role::Static,
        );
        self.push(
            Layer::Notification,
            &["span"],
            "Download your content to your computer via Your Media Library.",
            Some(wrapper),
            rect(610.0, 50.0, 380.0, 40.0),
            Role::Static,
        );
    }

    fn click(&mut self, id: usize) -> Result<(), AppError> {
        let node = self.node(id)?.clone();
        match node.role {
            Role::Trigger(position) => self.open_menu(position, node.rect),
            Role::TransferEntry => self.open_dialog(),
            Role::DeviceChoice(name) => self.selected_device = Some(name),
            Role::DownloadButton => self.confirm_download(),
            Role::NotificationClose => self.detach(Layer::Notification),
            Role::Static => {}
        }
        Ok(())
    }

    fn click_at(&mut self, point: Point) {
        self.pointer = Some(point);
        if self.menu_for.is_none() {
            return;
        }
        let inside_menu = self.nodes.iter().any(|n| {
            n.attached && n.layer == Layer::Menu && n.parent.is_none() && n.rect.contains(point)
        });
        if !inside_menu {
            self.detach(Layer::Menu);
            self.menu_for = None;
        }
    }
}

fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// In-memory storefront tab.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    /// A signed-in library of `total` items shown `page_size` per page, with
    /// two devices registered.
    pub fn library(total: u32, page_size: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                total,
                page_size,
                samples: HashSet::new(),
                devices: vec![FAKE_DEVICE.to_string(), "Kitchen Tablet".to_string()],
                logged_in: true,
                status_text: true,
                items: true,
                fail_download_at: None,
                duplicate_transfer_entry: false,
                queries_fail: false,
                url: "about:blank".to_string(),
                nodes: Vec::new(),
                menu_for: None,
                dialog_for: None,
                selected_device: None,
                pointer: None,
                query_lag: 0,
                queries: 0,
                navigations: Vec::new(),
                downloads: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Positions whose actions menu has no transfer entry.
    pub fn with_samples(self, positions: &[u32]) -> Self {
        self.state().samples.extend(positions.iter().copied());
        self
    }

    pub fn with_devices(self, devices: &[&str]) -> Self {
        self.state().devices = devices.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Every navigation lands on the sign-in page.
    pub fn logged_out(self) -> Self {
        self.state().logged_in = false;
        self
    }

    pub fn without_status_text(self) -> Self {
        self.state().status_text = false;
        self
    }

    /// Listing pages render their status text but no items.
    pub fn without_items(self) -> Self {
        self.state().items = false;
        self
    }

    /// The download request for `position` never produces a notification.
    pub fn fail_download_at(self, position: u32) -> Self {
        self.state().fail_download_at = Some(position);
        self
    }

    /// Actions menus list the transfer entry twice.
    pub fn with_duplicate_transfer_entry(self) -> Self {
        self.state().duplicate_transfer_entry = true;
        self
    }

    /// Every element query fails as if the CDP connection dropped.
    pub fn failing_queries(self) -> Self {
        self.state().queries_fail = true;
        self
    }

    /// The next `n` element queries see an empty document.
    pub fn set_query_lag(&self, n: u32) {
        self.state().query_lag = n;
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{FAKE_LISTING_URL}?pageNumber={page}")
    }

    pub fn queries(&self) -> u32 {
        self.state().queries
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    /// `(position, device)` for every accepted download, in order.
    pub fn downloads(&self) -> Vec<(u32, String)> {
        self.state().downloads.clone()
    }

    pub fn downloaded_positions(&self) -> Vec<u32> {
        self.state().downloads.iter().map(|(p, _)| *p).collect()
    }

    pub fn menu_open(&self) -> bool {
        self.state().menu_for.is_some()
    }

    pub fn notification_open(&self) -> bool {
        self.state()
            .nodes
            .iter()
            .any(|n| n.attached && n.layer == Layer::Notification)
    }

    pub fn pointer(&self) -> Option<Point> {
        self.state().pointer
    }

    /// Element handle for the `index`-th attached node answering to `selector`.
    pub fn element(&self, selector: &str, index: usize) -> FakeElement {
        let state = self.state();
        let id = state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.attached && n.answers(selector))
            .map(|(id, _)| id)
            .nth(index)
            .unwrap();
        FakeElement {
            page: self.clone(),
            id,
        }
    }
}

impl BrowserPage for FakePage {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), AppError> {
        self.state().navigate(url);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        Ok(self.state().url.clone())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>, AppError> {
        let mut state = self.state();
        state.queries += 1;
        if state.queries_fail {
            return Err(AppError::Browser("element query failed: connection closed".into()));
        }
        if state.query_lag > 0 {
            state.query_lag -= 1;
            return Ok(Vec::new());
        }
        let ids: Vec<usize> = state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.attached && n.answers(selector))
            .map(|(id, _)| id)
            .collect();
        drop(state);

        Ok(ids
            .into_iter()
            .map(|id| FakeElement {
                page: self.clone(),
                id,
            })
            .collect())
    }

    async fn move_pointer(&self, point: Point) -> Result<(), AppError> {
        self.state().pointer = Some(point);
        Ok(())
    }

    async fn click_at(&self, point: Point) -> Result<(), AppError> {
        self.state().click_at(point);
        Ok(())
    }
}

pub struct FakeElement {
    page: FakePage,
    id: usize,
}

impl fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeElement").field("id", &self.id).finish()
    }
}

impl PageElement for FakeElement {
    async fn text(&self) -> Result<String, AppError> {
        Ok(self.page.state().node(self.id)?.text.clone())
    }

    async fn click(&self) -> Result<(), AppError> {
        self.page.state().click(self.id)
    }

    async fn scroll_into_view(&self) -> Result<(), AppError> {
        self.page.state().node(self.id).map(|_| ())
    }

    async fn bounding_box(&self) -> Result<Rect, AppError> {
        Ok(self.page.state().node(self.id)?.rect)
    }

    async fn closest(&self, selector: &str) -> Result<Self, AppError> {
        let state = self.page.state();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let node = state.node(id)?;
            if node.answers(selector) {
                return Ok(Self {
                    page: self.page.clone(),
                    id,
                });
            }
            current = node.parent;
        }
        Err(AppError::Browser(format!("no ancestor matches `{selector}`")))
    }

    async fn find(&self, selector: &str) -> Result<Self, AppError> {
        let state = self.page.state();
        state.node(self.id)?;
        let id = (0..state.nodes.len())
            .find(|&id| {
                let node = &state.nodes[id];
                node.attached && node.answers(selector) && state.is_descendant(id, self.id)
            })
            .ok_or_else(|| AppError::Browser(format!("no descendant matches `{selector}`")))?;
        Ok(Self {
            page: self.page.clone(),
            id,
        })
    }
}

// ---------------------------------------------------------------------------
// MockCheckpoint
// ---------------------------------------------------------------------------

/// In-memory checkpoint recording every save.
#[derive(Clone, Default)]
pub struct MockCheckpoint {
    stored: Arc<Mutex<Option<Position>>>,
    pub saves: Arc<Mutex<Vec<Position>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockCheckpoint {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn at(position: u32) -> Self {
        let store = Self::default();
        *store.stored.lock().unwrap() = Position::new(position);
        store
    }

    /// The first save fails with `error`.
    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::default();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }

    pub fn saved(&self) -> Vec<u32> {
        self.saves.lock().unwrap().iter().map(|p| p.get()).collect()
    }

    pub fn stored(&self) -> Option<u32> {
        self.stored.lock().unwrap().map(Position::get)
    }
}

impl CheckpointStore for MockCheckpoint {
    async fn load(&self) -> Result<Position, AppError> {
        Ok(self.stored.lock().unwrap().unwrap_or(Position::FIRST))
    }

    async fn save(&self, position: Position) -> Result<(), AppError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        *self.stored.lock().unwrap() = Some(position);
        self.saves.lock().unwrap().push(position);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter keeping a one-line description of every event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for RecordingReporter {
    fn report(&self, event: RunEvent<'_>) {
        let line = match event {
            RunEvent::Started {
                position,
                page,
                offset,
            } => format!("started {position} page {page} offset {offset}"),
            RunEvent::PageOpened { page, summary } => format!(
                "page {page} {}-{} of {}",
                summary.start_index, summary.end_index, summary.total_count
            ),
            RunEvent::ItemFinished { position, outcome } => format!("{outcome} {position}"),
            RunEvent::Finished { summary } => format!("finished {:?}", summary.reason),
        };
        self.events.lock().unwrap().push(line);
    }
}
