use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MatchPattern;
use crate::error::AppError;

/// 1-based absolute rank of an item across the whole library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Position(u32);

impl Position {
    pub const FIRST: Position = Position(1);

    /// Returns `None` for zero, which is not a valid rank.
    pub fn new(value: u32) -> Option<Self> {
        (value >= 1).then_some(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// 1-based listing page holding this item.
    pub fn page_number(self, page_size: u32) -> u32 {
        (self.0 - 1) / page_size + 1
    }

    /// 0-based index of this item within its listing page.
    pub fn offset(self, page_size: u32) -> usize {
        ((self.0 - 1) % page_size) as usize
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a listing page reports about the slice of the library it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub start_index: u32,
    pub end_index: u32,
    pub total_count: u32,
}

impl PageSummary {
    /// Parse the "Showing X to Y of Z items" status text.
    ///
    /// The pattern must carry exactly three capture groups, in order
    /// start, end and total.
    pub fn parse(text: &str, pattern: &MatchPattern) -> Result<Self, AppError> {
        let unparseable = || AppError::StatusText {
            text: text.to_string(),
            pattern: pattern.to_string(),
        };

        let caps = pattern.regex().captures(text).ok_or_else(unparseable)?;
        if caps.len() != 4 {
            return Err(unparseable());
        }

        let number = |i: usize| -> Result<u32, AppError> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(unparseable)
        };

        Ok(Self {
            start_index: number(1)?,
            end_index: number(2)?,
            total_count: number(3)?,
        })
    }
}

/// Result of opening a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Opened(PageSummary),
    /// The site redirected to another listing page: there is nothing
    /// beyond the requested page.
    EndOfCollection,
}

/// Result of running the download workflow for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Completed,
    /// The item offered no transfer entry (samples, previews) and its menu
    /// was dismissed.
    Skipped,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Completed => "completed",
            ItemOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A point in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An element's bounding box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Why a run stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The position moved past the total the listing reported.
    Exhausted,
    /// The site redirected away from a page beyond the data.
    EndOfCollection,
}

/// Report of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub start_position: Position,
    pub next_position: Position,
    pub completed: u32,
    pub skipped: u32,
    pub pages_opened: u32,
    pub total_count: Option<u32>,
    pub reason: FinishReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
