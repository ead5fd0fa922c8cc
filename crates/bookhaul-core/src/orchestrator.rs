use std::sync::Arc;

use chrono::Utc;

use crate::config::ScrapeConfig;
use crate::error::AppError;
use crate::locator::ElementLocator;
use crate::models::{FinishReason, ItemOutcome, PageOutcome, PageSummary, Position, RunSummary};
use crate::navigator::PageNavigator;
use crate::traits::{BrowserPage, CheckpointStore};
use crate::workflow::ItemDownloadWorkflow;

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Started {
        position: Position,
        page: u32,
        offset: usize,
    },
    PageOpened {
        page: u32,
        summary: &'a PageSummary,
    },
    ItemFinished {
        position: Position,
        outcome: ItemOutcome,
    },
    Finished {
        summary: &'a RunSummary,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Started {
                position,
                page,
                offset,
            } => {
                tracing::info!(%position, page, offset, "Starting run");
            }
            RunEvent::PageOpened { page, summary } => {
                tracing::info!(
                    page,
                    start = summary.start_index,
                    end = summary.end_index,
                    total = summary.total_count,
                    "Processing listing page"
                );
            }
            RunEvent::ItemFinished {
                position,
                outcome: ItemOutcome::Completed,
            } => {
                tracing::info!(%position, "Item completed");
            }
            RunEvent::ItemFinished {
                position,
                outcome: ItemOutcome::Skipped,
            } => {
                tracing::warn!(%position, "Item skipped");
            }
            RunEvent::Finished { summary } => {
                tracing::info!(
                    reason = ?summary.reason,
                    next = %summary.next_position,
                    completed = summary.completed,
                    skipped = summary.skipped,
                    "Run finished"
                );
            }
        }
    }
}

/// Counters carried across pages while a run is in progress.
struct RunState {
    position: Position,
    completed: u32,
    skipped: u32,
    pages_opened: u32,
    total_count: Option<u32>,
}

impl RunState {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Completed => self.completed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
        self.position = self.position.next();
    }
}

/// Walks the library page by page from the resume point, downloading every
/// item and checkpointing after each one.
pub struct ScrapeOrchestrator<P, S>
where
    P: BrowserPage,
    S: CheckpointStore,
{
    locator: ElementLocator<P>,
    navigator: PageNavigator<P>,
    workflow: ItemDownloadWorkflow<P>,
    store: S,
    config: Arc<ScrapeConfig>,
}

impl<P, S> ScrapeOrchestrator<P, S>
where
    P: BrowserPage,
    S: CheckpointStore,
{
    pub fn new(page: P, store: S, config: Arc<ScrapeConfig>) -> Self {
        let locator = ElementLocator::new(page, config.timings.retry_sleep);
        Self {
            navigator: PageNavigator::new(locator.clone(), config.clone()),
            workflow: ItemDownloadWorkflow::new(locator.clone(), config.clone()),
            locator,
            store,
            config,
        }
    }

    /// Run until the library is exhausted or a fatal error occurs.
    ///
    /// On error the checkpoint already points at the item that failed, so a
    /// rerun resumes there.
    pub async fn run<R: RunReporter>(&self, reporter: &R) -> Result<RunSummary, AppError> {
        let started_at = Utc::now();
        let page_size = self.config.page_size;

        let start = match self.config.start {
            Some(position) => position,
            None => self.store.load().await?,
        };
        let mut page = start.page_number(page_size);
        let mut offset = start.offset(page_size);

        reporter.report(RunEvent::Started {
            position: start,
            page,
            offset,
        });

        let mut state = RunState {
            position: start,
            completed: 0,
            skipped: 0,
            pages_opened: 0,
            total_count: None,
        };

        let reason = loop {
            let summary = match self.navigator.open_listing_page(page).await? {
                PageOutcome::Opened(summary) => summary,
                PageOutcome::EndOfCollection => break FinishReason::EndOfCollection,
            };
            state.pages_opened += 1;
            state.total_count = Some(summary.total_count);
            reporter.report(RunEvent::PageOpened {
                page,
                summary: &summary,
            });

            self.process_page(page, offset, &mut state, reporter).await?;

            offset = 0;
            page += 1;
            if state.position.get() > summary.total_count {
                break FinishReason::Exhausted;
            }
        };

        let summary = RunSummary {
            start_position: start,
            next_position: state.position,
            completed: state.completed,
            skipped: state.skipped,
            pages_opened: state.pages_opened,
            total_count: state.total_count,
            reason,
            started_at,
            finished_at: Utc::now(),
        };
        reporter.report(RunEvent::Finished { summary: &summary });
        Ok(summary)
    }

    async fn process_page<R: RunReporter>(
        &self,
        page: u32,
        offset: usize,
        state: &mut RunState,
        reporter: &R,
    ) -> Result<(), AppError> {
        let triggers = self
            .locator
            .find_all(
                &self.config.selectors.text,
                &self.config.patterns.more_actions,
            )
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::NoItemsOnPage { page }
                } else {
                    e
                }
            })?;

        if offset >= triggers.len() {
            tracing::warn!(
                page,
                offset,
                found = triggers.len(),
                "Resume offset lies beyond the items on this page"
            );
        }

        for trigger in triggers.iter().skip(offset) {
            let position = state.position;
            let outcome = self.workflow.download_one(trigger, position).await?;
            state.record(outcome);
            self.store.save(state.position).await?;
            reporter.report(RunEvent::ItemFinished { position, outcome });
        }
        Ok(())
    }
}
