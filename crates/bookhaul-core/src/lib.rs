pub mod config;
pub mod error;
pub mod locator;
pub mod models;
pub mod navigator;
pub mod orchestrator;
pub mod progress;
pub mod throttle;
pub mod traits;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{MatchPattern, Patterns, Phrases, ScrapeConfig, Selectors, Timings};
pub use error::AppError;
pub use models::{FinishReason, ItemOutcome, PageOutcome, PageSummary, Position, RunSummary};
pub use orchestrator::{RunEvent, RunReporter, ScrapeOrchestrator, TracingRunReporter};
pub use progress::ProgressTracker;
pub use traits::{BrowserPage, CheckpointStore, PageElement};
